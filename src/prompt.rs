use crate::model::PaperRecord;

// section headings the generation tool is asked to emit. `sections` parses
// exactly these (plus a few aliases).
pub const SUMMARY_HEADING: &str = "Summary";
pub const KEY_POINTS_HEADING: &str = "Key Points";
pub const IMPLICATIONS_HEADING: &str = "Implications";

pub fn build_prompt(paper: &PaperRecord, language: &str) -> String {
    let categories = paper.categories.iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
"Summarize the following AI research paper in {language}.

Title: {title}
Authors: {authors}
Categories: {categories}
arXiv ID: {id}

Abstract:
{abstract_text}

Answer in exactly this Markdown format:

## {SUMMARY_HEADING}
(3-4 sentences describing what the paper does)

## {KEY_POINTS_HEADING}
1. (key point 1)
2. (key point 2)
3. (key point 3)

## {IMPLICATIONS_HEADING}
(2-3 sentences on the significance and likely impact of this work)

---

# Rules
- Keep the three headings exactly as written above, in English, even when answering in another language.
- Explain technical content clearly.
- Do not add any other headings or text before the first heading.
",
        language = language,
        title = paper.title,
        authors = paper.authors.join(", "),
        categories = categories,
        id = paper.id,
        abstract_text = paper.abstract_text
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn paper() -> PaperRecord {
        PaperRecord {
            id: String::from("2401.00001v1"),
            title: String::from("Attention Is Still All You Need"),
            authors: vec![String::from("A. Author"), String::from("B. Author")],
            abstract_text: String::from("We revisit attention."),
            published: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            categories: ["cs.CL", "cs.AI"].into_iter().map(String::from).collect(),
            pdf_url: String::from("https://arxiv.org/pdf/2401.00001v1"),
            abstract_url: String::from("https://arxiv.org/abs/2401.00001v1")
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt(&paper(), "English"), build_prompt(&paper(), "English"));
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = build_prompt(&paper(), "Japanese");
        assert!(prompt.starts_with("Summarize the following AI research paper in Japanese."));
        assert!(prompt.contains("Title: Attention Is Still All You Need"));
        assert!(prompt.contains("Authors: A. Author, B. Author"));
        assert!(prompt.contains("Categories: cs.AI, cs.CL"));
        assert!(prompt.contains("arXiv ID: 2401.00001v1"));
        assert!(prompt.contains("Abstract:\nWe revisit attention."));
        for heading in [SUMMARY_HEADING, KEY_POINTS_HEADING, IMPLICATIONS_HEADING] {
            assert!(prompt.contains(&format!("\n## {}\n", heading)));
        }
    }
}
