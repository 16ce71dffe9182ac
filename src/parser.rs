use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::{PageError, RetrievalError},
    model::PaperRecord
};

macro_rules! arxiv_url {
    () => { concat!(
        "{}?search_query={}",
        "&sortBy=submittedDate&sortOrder=descending&start={}&max_results={}"
    ) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    // newest submissions, regardless of date.
    Latest { max_results: usize },
    // submissions of the trailing `days` days.
    Window { days: u32, max_results: Option<usize> }
}

impl FetchScope {
    pub fn limit(&self) -> Option<usize> {
        match *self {
            FetchScope::Latest { max_results } => Some(max_results),
            FetchScope::Window { max_results, .. } => max_results
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub scope: FetchScope
}

impl FetchQuery {
    pub fn latest(categories: Vec<String>, max_results: usize) -> Self {
        FetchQuery {
            categories,
            keywords: Vec::new(),
            scope: FetchScope::Latest { max_results }
        }
    }

    pub fn window(categories: Vec<String>, days: u32, max_results: Option<usize>) -> Self {
        FetchQuery {
            categories,
            keywords: Vec::new(),
            scope: FetchScope::Window { days, max_results }
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.categories.iter().all(|cat| cat.trim().is_empty()) {
            return Err(RetrievalError::InvalidQuery(String::from("no category given")));
        }
        if self.scope.limit() == Some(0) {
            return Err(RetrievalError::InvalidQuery(String::from("max results must be positive")));
        }
        Ok(())
    }

    // the `search_query` value, already escaped for the URL.
    fn search_terms(&self, now: DateTime<Utc>) -> String {
        let categories = self.categories.iter()
            .map(|cat| cat.trim())
            .filter(|cat| !cat.is_empty())
            .map(|cat| format!("cat:{}", cat))
            .collect::<Vec<_>>()
            .join("+OR+");
        let mut terms = vec![format!("%28{}%29", categories)];

        terms.extend(self.keywords.iter()
            .map(|kw| kw.trim())
            .filter(|kw| !kw.is_empty())
            .map(|kw| format!("all:%22{}%22", urlencoding::encode(kw))));

        if let FetchScope::Window { days, .. } = self.scope {
            let d0 = (now - Duration::days(days as i64)).format("%Y%m%d%H%M");
            let d1 = now.format("%Y%m%d%H%M");
            terms.push(format!("submittedDate:[{}+TO+{}]", d0, d1));
        }
        terms.join("+AND+")
    }
}

pub fn build_query_url(
    base_url: &str,
    query: &FetchQuery,
    now: DateTime<Utc>,
    start: usize,
    page_size: usize
) -> String {
    format!(arxiv_url!(), base_url, query.search_terms(now), start, page_size)
}

// one parsed feed page. `entries` counts every entry the API sent, including
// the ones dropped while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub papers: Vec<PaperRecord>,
    pub entries: usize
}

// parse one page of the arXiv Atom feed. entries lacking an id or a valid
// publication date are dropped; a feed that cannot be read at all, or that
// carries an API error entry, is a page error.
pub fn parse_feed(xml: &str) -> Result<FeedPage, PageError> {
    let document: ArxivDocument = from_str(xml)?;
    if let Some(error) = document.entries.iter().find(|entry| entry.is_api_error()) {
        return Err(PageError::Api(normalize_whitespace(&error.summary)));
    }
    let entries = document.entries.len();
    let papers = document.entries.into_iter()
        .filter_map(|entry| {
            let id = entry.id.clone();
            entry.into_record().or_else(|| {
                warn!(entry = %id, "dropping feed entry without id or publication date");
                None
            })
        })
        .collect();
    Ok(FeedPage { papers, entries })
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Arxiv Raw XML Model

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct ArxivDocument {
    #[serde(rename = "entry")]
    entries: Vec<ArxivEntry>
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct ArxivEntry {
    id: String,
    title: String,
    summary: String,
    published: String,
    #[serde(rename = "author")]
    authors: Vec<AuthorField>,
    #[serde(rename = "link")]
    links: Vec<LinkField>,
    #[serde(rename = "category")]
    categories: Vec<CategoryField>
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct AuthorField {
    name: String
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct LinkField {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct CategoryField {
    #[serde(rename = "@term")]
    term: String
}

impl ArxivEntry {
    fn is_api_error(&self) -> bool {
        self.id.contains("/api/errors")
    }

    fn into_record(self) -> Option<PaperRecord> {
        let abs_url = self.id.trim().to_string();
        let id = abs_url.rsplit('/').next()
            .filter(|id| !id.is_empty())?
            .to_string();
        let published = DateTime::parse_from_rfc3339(self.published.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()?;

        let pdf_url = self.links.iter()
            .find(|link| link.title.as_deref() == Some("pdf"))
            .map(|link| link.href.clone())
            .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}.pdf", id));
        let abstract_url = self.links.iter()
            .find(|link| link.rel.as_deref() == Some("alternate"))
            .map(|link| link.href.clone())
            .unwrap_or(abs_url);

        Some(PaperRecord {
            id,
            title: normalize_whitespace(&self.title),
            authors: self.authors.into_iter()
                .map(|a| normalize_whitespace(&a.name))
                .filter(|name| !name.is_empty())
                .collect(),
            abstract_text: normalize_whitespace(&self.summary),
            published,
            categories: self.categories.into_iter()
                .map(|c| c.term)
                .filter(|term| !term.is_empty())
                .collect::<BTreeSet<_>>(),
            pdf_url,
            abstract_url
        })
    }
}

// end Arxiv Raw XML Model

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::DEFAULT_BASE_URL;

    pub(crate) fn entry_xml(id: &str, published: &str) -> String {
        format!(r#"<entry>
    <id>http://arxiv.org/abs/{id}</id>
    <updated>{published}</updated>
    <published>{published}</published>
    <title>Paper {id}:
      A Study</title>
    <summary>  Abstract of
      paper {id}.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:comment xmlns:arxiv="http://arxiv.org/schemas/atom">12 pages</arxiv:comment>
    <link href="http://arxiv.org/abs/{id}" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/{id}" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#)
    }

    pub(crate) fn feed_xml(entries: &[String]) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<feed xmlns=\"http://www.w3.org/2005/Atom\">\n",
                "  <title type=\"html\">ArXiv Query</title>\n",
                "  <opensearch:totalResults xmlns:opensearch=\"http://a9.com/-/spec/opensearch/1.1/\">{}</opensearch:totalResults>\n",
                "  {}\n",
                "</feed>\n"
            ),
            entries.len(),
            entries.join("\n  ")
        )
    }

    fn categories() -> Vec<String> {
        vec![String::from("cs.CL"), String::from("cs.AI")]
    }

    #[test]
    fn test_latest_url_generation() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();
        let query = FetchQuery::latest(categories(), 10);
        let url = build_query_url(DEFAULT_BASE_URL, &query, now, 0, 10);
        assert_eq!(url, concat!(
            "http://export.arxiv.org/api/query",
            "?search_query=%28cat:cs.CL+OR+cat:cs.AI%29",
            "&sortBy=submittedDate&sortOrder=descending&start=0&max_results=10"
        ));
    }

    #[test]
    fn test_window_url_generation() {
        let now = Utc.with_ymd_and_hms(2025, 1, 8, 12, 30, 0).unwrap();
        let query = FetchQuery::window(categories(), 7, None)
            .with_keywords(vec![String::from("large language model")]);
        let url = build_query_url(DEFAULT_BASE_URL, &query, now, 50, 25);
        assert_eq!(url, concat!(
            "http://export.arxiv.org/api/query",
            "?search_query=%28cat:cs.CL+OR+cat:cs.AI%29",
            "+AND+all:%22large%20language%20model%22",
            "+AND+submittedDate:[202501011230+TO+202501081230]",
            "&sortBy=submittedDate&sortOrder=descending&start=50&max_results=25"
        ));
    }

    #[test]
    fn test_query_validation() {
        assert!(FetchQuery::latest(categories(), 3).validate().is_ok());
        assert!(FetchQuery::latest(vec![String::from(" ")], 3).validate().is_err());
        assert!(FetchQuery::latest(categories(), 0).validate().is_err());
        assert!(FetchQuery::window(categories(), 7, None).validate().is_ok());
    }

    #[test]
    fn test_parse_feed_entry() {
        let xml = feed_xml(&[entry_xml("2401.00001v2", "2024-01-02T18:59:59Z")]);
        let papers = parse_feed(&xml).unwrap().papers;
        assert_eq!(papers.len(), 1);

        let paper = &papers[0];
        assert_eq!(paper.id, "2401.00001v2");
        assert_eq!(paper.title, "Paper 2401.00001v2: A Study");
        assert_eq!(paper.abstract_text, "Abstract of paper 2401.00001v2.");
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(paper.published, Utc.with_ymd_and_hms(2024, 1, 2, 18, 59, 59).unwrap());
        assert_eq!(paper.categories.iter().collect::<Vec<_>>(), vec!["cs.AI", "cs.LG"]);
        assert_eq!(paper.pdf_url, "http://arxiv.org/pdf/2401.00001v2");
        assert_eq!(paper.abstract_url, "http://arxiv.org/abs/2401.00001v2");
    }

    #[test]
    fn test_parse_feed_drops_entry_with_bad_date() {
        let xml = feed_xml(&[
            entry_xml("2401.00001v1", "yesterday"),
            entry_xml("2401.00002v1", "2024-01-02T10:00:00Z")
        ]);
        let page = parse_feed(&xml).unwrap();
        assert_eq!(page.entries, 2);
        assert_eq!(page.papers.len(), 1);
        assert_eq!(page.papers[0].id, "2401.00002v1");
    }

    #[test]
    fn test_parse_empty_feed() {
        let page = parse_feed(&feed_xml(&[])).unwrap();
        assert!(page.papers.is_empty());
        assert_eq!(page.entries, 0);
    }

    #[test]
    fn test_parse_api_error_feed() {
        let xml = feed_xml(&[String::from(concat!(
            "<entry><id>http://arxiv.org/api/errors#incorrect_id_format</id>",
            "<title>Error</title><summary>incorrect id format</summary></entry>"
        ))]);
        match parse_feed(&xml) {
            Err(PageError::Api(message)) => assert_eq!(message, "incorrect id format"),
            other => panic!("expected api error, got {:?}", other)
        }
    }

    #[test]
    fn test_parse_truncated_feed() {
        let xml = feed_xml(&[entry_xml("2401.00001v1", "2024-01-02T10:00:00Z")]);
        let truncated = &xml[..xml.len() / 2];
        assert!(parse_feed(truncated).is_err());
    }
}
