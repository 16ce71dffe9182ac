use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;

pub const KEY_POINT_LIMIT: usize = 3;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").unwrap());
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*+•])\s+(.+?)\s*$").unwrap());
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Summary,
    KeyPoints,
    Implications
}

impl SectionKind {
    fn classify(heading: &str) -> Option<Self> {
        let name = heading.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());
        let name = LEADING_NUMBER.replace(name, "");
        let name = name
            .trim_end_matches([':', '：'])
            .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
            .to_lowercase();
        match name.as_str() {
            "summary" | "overview" | "要約" => Some(SectionKind::Summary),
            "key points" | "key findings" | "highlights" | "主要なポイント" => Some(SectionKind::KeyPoints),
            "implications" | "significance" | "impact" | "意義・影響" => Some(SectionKind::Implications),
            _ => None
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sections {
    pub summary: String,
    pub key_points: Vec<String>,
    pub implications: String
}

// split Markdown into the recognized sections. any other heading closes the
// current section, so surrounding document structure is ignored.
pub fn split_sections(text: &str) -> Result<Sections, ParseError> {
    let mut sections = Sections::default();
    let mut found = false;
    let mut current: Option<(SectionKind, Vec<&str>)> = None;
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if let Some(caps) = HEADING.captures(line).filter(|_| !in_fence) {
            if let Some((kind, lines)) = current.take() {
                sections.fill(kind, &lines);
            }
            current = SectionKind::classify(&caps[1]).map(|kind| (kind, Vec::new()));
            found |= current.is_some();
            continue;
        }
        if let Some((_, lines)) = current.as_mut() {
            lines.push(line.trim_end());
        }
    }
    if let Some((kind, lines)) = current.take() {
        sections.fill(kind, &lines);
    }

    if found { Ok(sections) } else { Err(ParseError::NoSections) }
}

impl Sections {
    fn fill(&mut self, kind: SectionKind, lines: &[&str]) {
        match kind {
            SectionKind::Summary if self.summary.is_empty() => {
                self.summary = paragraph(lines);
            }
            SectionKind::KeyPoints if self.key_points.is_empty() => {
                self.key_points = list_items(lines);
            }
            SectionKind::Implications if self.implications.is_empty() => {
                self.implications = paragraph(lines);
            }
            // first non-empty occurrence wins.
            _ => {}
        }
    }
}

fn is_rule(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '-' || c == '*' || c == '_')
}

fn paragraph(lines: &[&str]) -> String {
    let end = lines.iter()
        .rposition(|line| !line.trim().is_empty() && !is_rule(line))
        .map_or(0, |i| i + 1);
    lines[..end].iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn list_items(lines: &[&str]) -> Vec<String> {
    let items = lines.iter()
        .filter_map(|line| LIST_ITEM.captures(line))
        .map(|caps| caps[1].to_string())
        .collect::<Vec<_>>();
    let items = if items.is_empty() {
        lines.iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !is_rule(line))
            .map(String::from)
            .collect()
    } else {
        items
    };
    items.into_iter().take(KEY_POINT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const WELL_FORMED: &str = "\
## Summary
The paper proposes a sparse attention scheme.
It scales to long inputs.

## Key Points
1. Linear memory in sequence length.
2) Matches dense attention on benchmarks.
- Open-source implementation.

## Implications
Long-context models become cheaper to train.

---
";

    #[test]
    fn test_well_formed_response() {
        let sections = split_sections(WELL_FORMED).unwrap();
        assert_eq!(sections, Sections {
            summary: String::from("The paper proposes a sparse attention scheme.\nIt scales to long inputs."),
            key_points: vec![
                String::from("Linear memory in sequence length."),
                String::from("Matches dense attention on benchmarks."),
                String::from("Open-source implementation.")
            ],
            implications: String::from("Long-context models become cheaper to train.")
        });
    }

    #[test]
    fn test_heading_variants() {
        let text = "# **Overview:**\nshort\n### 2. Key Findings\n* one\n* two\n#### Significance：\nbig";
        let sections = split_sections(text).unwrap();
        assert_eq!(sections.summary, "short");
        assert_eq!(sections.key_points, vec!["one", "two"]);
        assert_eq!(sections.implications, "big");
    }

    #[test]
    fn test_japanese_headings() {
        let text = "## 要約\n論文の概要。\n## 主要なポイント\n1. 一つ目\n2. 二つ目\n3. 三つ目\n## 意義・影響\n大きな影響。";
        let sections = split_sections(text).unwrap();
        assert_eq!(sections.summary, "論文の概要。");
        assert_eq!(sections.key_points.len(), 3);
        assert_eq!(sections.implications, "大きな影響。");
    }

    #[test]
    fn test_key_points_are_capped() {
        let text = "## Key Points\n1. a\n2. b\n3. c\n4. d\n5. e";
        let sections = split_sections(text).unwrap();
        assert_eq!(sections.key_points, vec!["a", "b", "c"]);
        assert!(sections.summary.is_empty());
    }

    #[test]
    fn test_key_points_without_markers() {
        let text = "## Key Points\nfirst line\n\nsecond line\n";
        let sections = split_sections(text).unwrap();
        assert_eq!(sections.key_points, vec!["first line", "second line"]);
    }

    #[test]
    fn test_unknown_heading_closes_section() {
        let text = "## Summary\nkept\n## References\n- [arXiv](http://arxiv.org)";
        let sections = split_sections(text).unwrap();
        assert_eq!(sections.summary, "kept");
        assert!(sections.key_points.is_empty());
    }

    #[test]
    fn test_fenced_code_is_not_a_heading() {
        let text = "## Summary\nRun it with:\n```sh\n# install first\npip install tool\n```\nDone.\n\n## Implications\nMore tools.";
        let sections = split_sections(text).unwrap();
        assert_eq!(
            sections.summary,
            "Run it with:\n```sh\n# install first\npip install tool\n```\nDone."
        );
        assert_eq!(sections.implications, "More tools.");
    }

    #[test]
    fn test_no_sections() {
        assert_eq!(split_sections("Just a plain answer.\n\nWith two paragraphs."), Err(ParseError::NoSections));
        assert_eq!(split_sections("## Introduction\ntext"), Err(ParseError::NoSections));
        assert_eq!(split_sections(""), Err(ParseError::NoSections));
    }
}
