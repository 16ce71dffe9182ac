use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf}
};

use serde::Serialize;
use uuid::Uuid;

use crate::model::SummaryRecord;

pub const SUMMARIES_FILE: &str = "summaries.jsonl";
const MAX_TITLE_CHARS: usize = 50;

#[derive(Serialize)]
struct SummaryLine<'a> {
    run_id: Uuid,
    #[serde(flatten)]
    summary: &'a SummaryRecord
}

// Utils to store generated documents on local device.
#[derive(Debug, Clone)]
pub struct LocalSaver {
    dir: PathBuf
}

impl LocalSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        LocalSaver { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, data: &SummaryRecord) -> PathBuf {
        self.dir.join(format!("{}_{}.md", safe_file_stem(&data.title), safe_file_stem(&data.paper_id)))
    }

    pub fn save_document(&self, data: &SummaryRecord, document: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.document_path(data);
        fs::write(&path, document)?;
        Ok(path)
    }

    // a document for this paper exists from an earlier run.
    pub fn is_processed(&self, paper_id: &str) -> bool {
        let suffix = format!("_{}.md", safe_file_stem(paper_id));
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return false;
        };
        entries.filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().ends_with(&suffix))
    }

    pub fn append_summary_jsonl(&self, run_id: Uuid, data: &SummaryRecord) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let line = serde_json::to_string(&SummaryLine { run_id, summary: data })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(SUMMARIES_FILE))?;
        writeln!(file, "{}", line)?;
        file.flush()
    }
}

// keeps ascii alphanumerics, `-` and `.`; everything else collapses to `_`.
pub fn safe_file_stem(text: &str) -> String {
    let mut stem = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            stem.push(c);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
        if stem.len() >= MAX_TITLE_CHARS {
            break;
        }
    }
    let stem = stem.trim_matches(|c| c == '_' || c == '.').to_string();
    if stem.is_empty() { String::from("untitled") } else { stem }
}
