use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::{
    batch::BatchReport,
    config::GeneratorConfig,
    error::{GenerateError, ToolError},
    model::{PaperRecord, SummaryRecord},
    process::ToolCommand,
    prompt::build_prompt,
    sections::split_sections
};

#[async_trait]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

// `claude -p <prompt>`, or any tool taking the prompt as last argument.
pub struct ClaudeCli {
    command: ToolCommand
}

impl ClaudeCli {
    pub fn new(command: ToolCommand) -> Self {
        ClaudeCli { command }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(ToolCommand::new(&config.program, &config.args, config.timeout))
    }
}

#[async_trait]
impl TextGenerator for ClaudeCli {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let output = self.command.run(&[prompt], None).await?;
        if output.is_empty() {
            return Err(ToolError::EmptyOutput(self.command.program.clone()).into());
        }
        Ok(output)
    }
}

pub struct Summarizer<G> {
    generator: G,
    language: String
}

impl<G: TextGenerator> Summarizer<G> {
    pub fn new(generator: G, language: &str) -> Self {
        Summarizer {
            generator,
            language: language.to_string()
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    #[instrument(skip_all, fields(paper_id = %paper.id))]
    pub async fn summarize(&self, paper: &PaperRecord) -> Result<SummaryRecord, GenerateError> {
        let prompt = build_prompt(paper, &self.language);
        let response = self.generator.generate(&prompt).await?;
        debug!(chars = response.len(), "generation finished");
        Ok(shape_response(paper, &response))
    }

    // one record at a time. a failure is recorded and the batch goes on.
    pub async fn summarize_all(&self, papers: &[PaperRecord]) -> BatchReport<SummaryRecord, GenerateError> {
        let mut report = BatchReport::new("summarize");
        for (i, paper) in papers.iter().enumerate() {
            info!(paper_id = %paper.id, "summarizing {}/{}: {}", i + 1, papers.len(), paper.title);
            let result = self.summarize(paper).await;
            if let Err(e) = &result {
                warn!(paper_id = %paper.id, error = %e, "summarization failed, skipping paper");
            }
            report.push(paper.id.as_str(), result);
        }
        info!("{}", report);
        report
    }
}

// turn free text into a summary record. a response without recognizable
// sections, or without a summary section, is kept whole as the summary.
pub fn shape_response(paper: &PaperRecord, response: &str) -> SummaryRecord {
    let response = response.trim();
    match split_sections(response) {
        Ok(sections) => {
            let summary = if sections.summary.is_empty() {
                response.to_string()
            } else {
                sections.summary
            };
            SummaryRecord::new(paper, summary, sections.key_points, sections.implications)
        }
        Err(e) => {
            warn!(paper_id = %paper.id, error = %e, "unstructured response, using it as the summary");
            SummaryRecord::new(paper, response.to_string(), Vec::new(), String::new())
        }
    }
}
