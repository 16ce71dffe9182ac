use std::{collections::BTreeSet, fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// metadata of one arXiv paper, as returned by the search API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaperRecord {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub published: DateTime<Utc>,
    pub categories: BTreeSet<String>,
    pub pdf_url: String,
    pub abstract_url: String
}

// generated summary of one paper. paper metadata is copied so that
// rendering does not need the original record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SummaryRecord {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: DateTime<Utc>,
    pub categories: BTreeSet<String>,
    pub pdf_url: String,
    pub abstract_url: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub implications: String
}

impl SummaryRecord {
    pub fn new(
        paper: &PaperRecord,
        summary: String,
        key_points: Vec<String>,
        implications: String
    ) -> Self {
        SummaryRecord {
            paper_id: paper.id.clone(),
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            published: paper.published,
            categories: paper.categories.clone(),
            pdf_url: paper.pdf_url.clone(),
            abstract_url: paper.abstract_url.clone(),
            summary,
            key_points,
            implications
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private
}

impl Visibility {
    pub fn from_private(private: bool) -> Self {
        if private { Visibility::Private } else { Visibility::Public }
    }

    pub fn is_private(self) -> bool {
        self == Visibility::Private
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Private => f.write_str("private")
        }
    }
}

// outcome of a successful publish. `post_id` is only known when the
// publishing tool prints the created post's URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReceipt {
    pub paper_id: String,
    pub document: PathBuf,
    pub post_id: Option<String>
}
