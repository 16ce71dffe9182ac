use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
    time::Duration
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::time::{self, Instant};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::FetchConfig,
    error::{RetrievalError, TransportError},
    model::PaperRecord,
    parser::{build_query_url, parse_feed, FetchQuery}
};

const USER_AGENT: &str = concat!("paperpress/", env!("CARGO_PKG_VERSION"));

// raw access to the search API. one call is one HTTP request.
#[async_trait]
pub trait FeedSource {
    async fn get(&self, url: &str) -> Result<String, TransportError>;
}

pub struct HttpFeedSource {
    client: Client
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(HttpFeedSource { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        Ok(response.text().await?)
    }
}

// enforces a minimum delay between successive requests.
#[derive(Debug)]
pub struct Throttle {
    min_delay: Duration,
    last: Mutex<Option<Instant>>
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Throttle {
            min_delay,
            last: Mutex::new(None)
        }
    }

    pub async fn wait(&self) {
        let wait_until = {
            let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let next = match *last {
                Some(prev) => (prev + self.min_delay).max(now),
                None => now
            };
            *last = Some(next);
            next
        };
        time::sleep_until(wait_until).await;
    }
}

pub struct ArxivFetcher<S> {
    source: S,
    config: FetchConfig,
    throttle: Throttle
}

impl ArxivFetcher<HttpFeedSource> {
    pub fn from_config(config: FetchConfig) -> Result<Self, TransportError> {
        let source = HttpFeedSource::new(config.timeout)?;
        Ok(Self::new(source, config))
    }
}

impl<S: FeedSource> ArxivFetcher<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        let throttle = Throttle::new(config.request_delay);
        ArxivFetcher {
            source,
            config,
            throttle
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // lazily pages through the results. nothing is requested until the
    // first call to `next`.
    pub fn fetch(&self, query: FetchQuery) -> Result<PaperStream<'_, S>, RetrievalError> {
        query.validate()?;
        Ok(PaperStream::new(self, query, Utc::now()))
    }

    async fn get_page(&self, url: &str) -> Result<String, RetrievalError> {
        let attempts = self.config.retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            self.throttle.wait().await;
            match self.source.get(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "search API request failed");
                    last_error = Some(e);
                }
            }
        }
        Err(RetrievalError::Unavailable {
            attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default()
        })
    }
}

pub struct PaperStream<'a, S> {
    fetcher: &'a ArxivFetcher<S>,
    query: FetchQuery,
    now: DateTime<Utc>,
    buffer: VecDeque<PaperRecord>,
    seen: HashSet<String>,
    next_start: usize,
    pages_requested: u32,
    pages_parsed: u32,
    yielded: usize,
    exhausted: bool
}

impl<'a, S: FeedSource> PaperStream<'a, S> {
    fn new(fetcher: &'a ArxivFetcher<S>, query: FetchQuery, now: DateTime<Utc>) -> Self {
        PaperStream {
            fetcher,
            query,
            now,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            next_start: 0,
            pages_requested: 0,
            pages_parsed: 0,
            yielded: 0,
            exhausted: false
        }
    }

    // start over from the first page with an empty dedup set. the time
    // window is kept so that a restart sees the same query.
    pub fn restart(&mut self) {
        self.buffer.clear();
        self.seen.clear();
        self.next_start = 0;
        self.pages_requested = 0;
        self.pages_parsed = 0;
        self.yielded = 0;
        self.exhausted = false;
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub async fn next(&mut self) -> Option<Result<PaperRecord, RetrievalError>> {
        loop {
            if self.limit_reached() {
                self.exhausted = true;
                self.buffer.clear();
                return None;
            }
            if let Some(paper) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(paper));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.load_page().await {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn collect_all(mut self) -> Result<Vec<PaperRecord>, RetrievalError> {
        let mut papers = Vec::new();
        while let Some(paper) = self.next().await {
            papers.push(paper?);
        }
        info!(
            count = papers.len(),
            pages = self.pages_requested,
            scope = ?self.query.scope,
            "fetch finished"
        );
        Ok(papers)
    }

    fn limit_reached(&self) -> bool {
        self.query.scope.limit().is_some_and(|limit| self.yielded >= limit)
    }

    fn page_size(&self) -> usize {
        let page_size = self.fetcher.config.page_size.max(1);
        match self.query.scope.limit() {
            Some(limit) => page_size.min(limit - self.yielded.min(limit)).max(1),
            None => page_size
        }
    }

    async fn load_page(&mut self) -> Result<(), RetrievalError> {
        if self.pages_requested >= self.fetcher.config.max_pages {
            return self.finish();
        }

        let page_size = self.page_size();
        let url = build_query_url(
            &self.fetcher.config.base_url,
            &self.query,
            self.now,
            self.next_start,
            page_size
        );
        debug!(start = self.next_start, page = self.pages_requested, %url, "requesting feed page");
        self.pages_requested += 1;
        self.next_start += page_size;

        let body = self.fetcher.get_page(&url).await?;
        let page = match parse_feed(&body) {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "skipping malformed feed page");
                return Ok(());
            }
        };
        self.pages_parsed += 1;

        // a short page ends the results. counted before bad entries are dropped.
        let received = page.entries;
        if received < page_size {
            self.exhausted = true;
        }
        let mut papers = page.papers;
        papers.sort_by(|a, b| b.published.cmp(&a.published));

        let mut duplicates = 0;
        for paper in papers {
            if self.seen.insert(paper.id.clone()) {
                self.buffer.push_back(paper);
            } else {
                duplicates += 1;
            }
        }
        debug!(received, duplicates, "feed page parsed");
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RetrievalError> {
        self.exhausted = true;
        if self.pages_requested > 0 && self.pages_parsed == 0 {
            return Err(RetrievalError::Malformed { pages: self.pages_requested });
        }
        Ok(())
    }
}
