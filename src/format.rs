use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::ParseError,
    model::{SummaryRecord, Visibility},
    prompt::{IMPLICATIONS_HEADING, KEY_POINTS_HEADING, SUMMARY_HEADING},
    sections::split_sections
};

pub const TITLE_PREFIX: &str = "[arXiv] ";
const FOOTER: &str = "This article was generated automatically. \
    Please refer to the original paper for details.";

static ARXIV_ID_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^- \*\*arXiv ID\*\*: \[([^\]]+)\]").unwrap());
static FRONT_PRIVATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^private: (true|false)\s*$").unwrap());
static FRONT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+- (.+?)\s*$").unwrap());

// document re-read from disk. only what rendering puts in a fixed place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    pub paper_id: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub implications: String,
    pub private: bool,
    pub tags: Vec<String>
}

pub struct Formatter;

impl Formatter {
    // Qiita CLI markdown: front matter followed by the article body.
    pub fn to_article(data: &SummaryRecord, visibility: Visibility, tags: &[String]) -> String {
        format!("{}\n{}", Self::front_matter(data, visibility, tags), Self::body(data))
    }

    fn front_matter(data: &SummaryRecord, visibility: Visibility, tags: &[String]) -> String {
        // a JSON string is also a valid YAML scalar.
        let title = serde_json::Value::String(format!("{}{}", TITLE_PREFIX, data.title));
        let tags = tags.iter()
            .map(|tag| format!("  - {}\n", tag))
            .collect::<String>();
        format!(
            concat!(
                "---\n",
                "title: {}\n",
                "tags:\n{}",
                "private: {}\n",
                "updated_at: ''\n",
                "id: null\n",
                "organization_url_name: null\n",
                "slide: false\n",
                "ignorePublish: false\n",
                "---\n"
            ),
            title,
            tags,
            visibility.is_private()
        )
    }

    fn body(data: &SummaryRecord) -> String {
        let key_points = data.key_points.iter()
            .enumerate()
            .map(|(i, point)| format!("{}. {}\n", i + 1, point))
            .collect::<String>();
        let categories = data.categories.iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
"# {title}

## Paper Information

- **Authors**: {authors}
- **arXiv ID**: [{id}]({abs})
- **Published**: {published}
- **Categories**: {categories}
- **PDF**: [Link]({pdf})

## {SUMMARY_HEADING}

{summary}

## {KEY_POINTS_HEADING}

{key_points}
## {IMPLICATIONS_HEADING}

{implications}

## References

- [arXiv]({abs})
- [PDF]({pdf})

---

{FOOTER}
",
            title = data.title,
            authors = data.authors.join(", "),
            id = data.paper_id,
            abs = data.abstract_url,
            published = data.published.format("%Y-%m-%d"),
            categories = categories,
            pdf = data.pdf_url,
            summary = data.summary,
            key_points = key_points,
            implications = data.implications
        )
    }
}

pub fn render_article(data: &SummaryRecord, visibility: Visibility, tags: &[String]) -> String {
    Formatter::to_article(data, visibility, tags)
}

pub fn parse_article(text: &str) -> Result<ParsedArticle, ParseError> {
    let (front, body) = split_front_matter(text);

    let title = body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or(ParseError::MissingTitle)?;
    let paper_id = ARXIV_ID_LINE.captures(body)
        .map(|caps| caps[1].to_string())
        .ok_or(ParseError::MissingIdentifier)?;
    let sections = split_sections(body)?;

    let private = FRONT_PRIVATE.captures(front)
        .is_some_and(|caps| &caps[1] == "true");
    let tags = front.lines()
        .skip_while(|line| line.trim_end() != "tags:")
        .skip(1)
        .map_while(|line| FRONT_TAG.captures(line).map(|caps| caps[1].to_string()))
        .collect();

    Ok(ParsedArticle {
        title,
        paper_id,
        summary: sections.summary,
        key_points: sections.key_points,
        implications: sections.implications,
        private,
        tags
    })
}

fn split_front_matter(text: &str) -> (&str, &str) {
    if let Some(rest) = text.strip_prefix("---\n") {
        if let Some(end) = rest.find("\n---\n") {
            return (&rest[..end], &rest[end + 5..]);
        }
    }
    ("", text)
}
