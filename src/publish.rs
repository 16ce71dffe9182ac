use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    batch::BatchReport,
    config::PublishConfig,
    error::PublishError,
    format::render_article,
    model::{PublishReceipt, SummaryRecord, Visibility},
    process::ToolCommand,
    storage::LocalSaver
};

static POST_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+/items/([0-9A-Za-z]+)").unwrap());

// creates a post from a document on disk and returns the tool's output.
#[async_trait]
pub trait PublishTool {
    async fn publish(&self, document: &Path, visibility: Visibility) -> Result<String, PublishError>;
}

// Qiita CLI: `npx qiita publish <basename>` run from the project root, the
// parent of the `public/` content directory holding the article.
pub struct QiitaCli {
    command: ToolCommand,
    private_flag: Option<String>,
    check: Option<ToolCommand>,
    token_env: Option<String>
}

impl QiitaCli {
    pub fn new(command: ToolCommand, private_flag: Option<String>) -> Self {
        QiitaCli {
            command,
            private_flag,
            check: None,
            token_env: None
        }
    }

    pub fn with_preflight(mut self, check: Option<ToolCommand>, token_env: Option<String>) -> Self {
        self.check = check;
        self.token_env = token_env;
        self
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        let check = (!config.check_args.is_empty())
            .then(|| ToolCommand::new(&config.program, &config.check_args, config.timeout));
        Self::new(
            ToolCommand::new(&config.program, &config.args, config.timeout),
            config.private_flag.clone()
        )
        .with_preflight(check, config.token_env.clone())
    }

    // the CLI answers its version probe and the access token is set.
    pub async fn preflight<F>(&self, lookup: F) -> Result<(), PublishError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(check) = &self.check {
            let version = check.run(&[], None).await?;
            info!(program = %check.program, %version, "publishing tool found");
        }
        if let Some(var) = &self.token_env {
            if lookup(var).filter(|token| !token.trim().is_empty()).is_none() {
                return Err(PublishError::NotReady(format!("{} is not set", var)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PublishTool for QiitaCli {
    async fn publish(&self, document: &Path, visibility: Visibility) -> Result<String, PublishError> {
        let stem = document.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut extra = vec![stem.as_str()];
        if let (Visibility::Private, Some(flag)) = (visibility, self.private_flag.as_deref()) {
            extra.push(flag);
        }
        let output = self.command.run(&extra, project_root(document)).await?;
        Ok(output)
    }
}

// `None` for a relative content directory such as `public`, meaning the
// current directory.
fn project_root(document: &Path) -> Option<&Path> {
    document.parent()
        .and_then(Path::parent)
        .filter(|root| !root.as_os_str().is_empty())
}

pub fn extract_post_id(output: &str) -> Option<String> {
    POST_URL.captures(output).map(|caps| caps[1].to_string())
}

pub struct Publisher<T> {
    tool: T,
    saver: LocalSaver,
    tags: Vec<String>
}

impl<T: PublishTool> Publisher<T> {
    pub fn new(tool: T, saver: LocalSaver, tags: Vec<String>) -> Self {
        Publisher {
            tool,
            saver,
            tags
        }
    }

    pub fn saver(&self) -> &LocalSaver {
        &self.saver
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    // render and save only; the publishing tool is not invoked.
    pub fn write(&self, data: &SummaryRecord, visibility: Visibility) -> Result<PathBuf, PublishError> {
        let document = render_article(data, visibility, &self.tags);
        let path = self.saver.document_path(data);
        self.saver.save_document(data, &document).map_err(|source| PublishError::Io {
            path: path.display().to_string(),
            source
        })
    }

    #[instrument(skip_all, fields(paper_id = %data.paper_id, visibility = %visibility))]
    pub async fn publish(&self, data: &SummaryRecord, visibility: Visibility) -> Result<PublishReceipt, PublishError> {
        let document = self.write(data, visibility)?;
        let output = self.tool.publish(&document, visibility).await?;
        let post_id = extract_post_id(&output);
        info!(document = %document.display(), post_id = ?post_id, "article published");
        Ok(PublishReceipt {
            paper_id: data.paper_id.clone(),
            document,
            post_id
        })
    }

    pub fn write_all(&self, data: &[SummaryRecord], visibility: Visibility) -> BatchReport<PathBuf, PublishError> {
        let mut report = BatchReport::new("write");
        for summary in data {
            let result = self.write(summary, visibility);
            if let Err(e) = &result {
                warn!(paper_id = %summary.paper_id, error = %e, "failed to write document");
            }
            report.push(summary.paper_id.as_str(), result);
        }
        info!("{}", report);
        report
    }

    // no retry: a failed record is reported and left to the operator.
    pub async fn publish_all(&self, data: &[SummaryRecord], visibility: Visibility) -> BatchReport<PublishReceipt, PublishError> {
        let mut report = BatchReport::new("publish");
        for summary in data {
            let result = self.publish(summary, visibility).await;
            if let Err(e) = &result {
                warn!(paper_id = %summary.paper_id, error = %e, "publish failed, continuing");
            }
            report.push(summary.paper_id.as_str(), result);
        }
        info!("{}", report);
        report
    }
}
