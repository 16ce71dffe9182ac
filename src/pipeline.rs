use std::{fmt, path::PathBuf};

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    agent::{Summarizer, TextGenerator},
    batch::BatchReport,
    error::RetrievalError,
    fetch::{ArxivFetcher, FeedSource},
    model::{PaperRecord, PublishReceipt, SummaryRecord, Visibility},
    parser::{FetchQuery, FetchScope},
    publish::{PublishTool, Publisher}
};

// extra candidates requested per wanted paper when already processed
// papers are filtered out.
const SKIP_EXISTING_FACTOR: usize = 3;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub query: FetchQuery,
    pub publish: bool,
    pub visibility: Visibility,
    pub skip_existing: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCounts {
    pub stage: &'static str,
    pub attempted: usize,
    pub succeeded: usize
}

impl StageCounts {
    fn of<T, E>(report: &BatchReport<T, E>) -> Self {
        StageCounts {
            stage: report.stage,
            attempted: report.attempted(),
            succeeded: report.succeeded()
        }
    }

    pub fn failed_entirely(&self) -> bool {
        self.attempted > 0 && self.succeeded == 0
    }
}

impl fmt::Display for StageCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{} succeeded", self.stage, self.succeeded, self.attempted)
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub fetched: usize,
    pub skipped: usize,
    pub fetch_error: Option<RetrievalError>,
    pub stages: Vec<StageCounts>,
    pub summaries: Vec<SummaryRecord>,
    pub documents: Vec<PathBuf>,
    pub receipts: Vec<PublishReceipt>
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        RunSummary {
            run_id,
            fetched: 0,
            skipped: 0,
            fetch_error: None,
            stages: Vec::new(),
            summaries: Vec::new(),
            documents: Vec::new(),
            receipts: Vec::new()
        }
    }

    pub fn is_success(&self) -> bool {
        self.fetch_error.is_none() && !self.stages.iter().any(StageCounts::failed_entirely)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

// fetch -> summarize -> write or publish, one paper at a time.
pub struct Pipeline<S, G, T> {
    fetcher: ArxivFetcher<S>,
    summarizer: Summarizer<G>,
    publisher: Publisher<T>
}

impl<S: FeedSource, G: TextGenerator, T: PublishTool> Pipeline<S, G, T> {
    pub fn new(fetcher: ArxivFetcher<S>, summarizer: Summarizer<G>, publisher: Publisher<T>) -> Self {
        Pipeline {
            fetcher,
            summarizer,
            publisher
        }
    }

    pub async fn run(&self, options: &RunOptions) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_with_id(run_id, options).instrument(span).await
    }

    async fn run_with_id(&self, run_id: Uuid, options: &RunOptions) -> RunSummary {
        let mut summary = RunSummary::new(run_id);

        let papers = match self.fetch(options, &mut summary).await {
            Ok(papers) => papers,
            Err(e) => {
                error!(error = %e, "fetch failed, nothing was processed");
                summary.fetch_error = Some(e);
                return summary;
            }
        };
        summary.fetched = papers.len();
        info!(fetched = summary.fetched, skipped = summary.skipped, "papers retrieved");
        if papers.is_empty() {
            warn!("no new papers found");
            return summary;
        }

        let report = self.summarizer.summarize_all(&papers).await;
        summary.stages.push(StageCounts::of(&report));
        summary.summaries = report.into_successes();
        self.record_summaries(run_id, &summary.summaries);
        if summary.summaries.is_empty() {
            return summary;
        }

        let summaries = &summary.summaries;
        if options.publish {
            let report = self.publisher.publish_all(summaries, options.visibility).await;
            summary.stages.push(StageCounts::of(&report));
            summary.receipts = report.into_successes();
            summary.documents = summary.receipts.iter().map(|r| r.document.clone()).collect();
        } else {
            let report = self.publisher.write_all(summaries, options.visibility);
            summary.stages.push(StageCounts::of(&report));
            summary.documents = report.into_successes();
        }
        summary
    }

    // records yielded before a retrieval error are discarded by the caller.
    async fn fetch(&self, options: &RunOptions, summary: &mut RunSummary) -> Result<Vec<PaperRecord>, RetrievalError> {
        let wanted = options.query.scope.limit();
        let query = if options.skip_existing {
            widen(&options.query)
        } else {
            options.query.clone()
        };
        let saver = self.publisher.saver();

        let mut stream = self.fetcher.fetch(query)?;
        let mut papers = Vec::new();
        while let Some(paper) = stream.next().await {
            let paper = paper?;
            if options.skip_existing && saver.is_processed(&paper.id) {
                debug!(paper_id = %paper.id, "already processed, skipping");
                summary.skipped += 1;
                continue;
            }
            papers.push(paper);
            if wanted.is_some_and(|wanted| papers.len() >= wanted) {
                break;
            }
        }
        Ok(papers)
    }

    fn record_summaries(&self, run_id: Uuid, summaries: &[SummaryRecord]) {
        let saver = self.publisher.saver();
        for data in summaries {
            if let Err(e) = saver.append_summary_jsonl(run_id, data) {
                warn!(paper_id = %data.paper_id, error = %e, "failed to append summary log");
            }
        }
    }
}

fn widen(query: &FetchQuery) -> FetchQuery {
    let scope = match query.scope {
        FetchScope::Latest { max_results } => FetchScope::Latest {
            max_results: max_results.saturating_mul(SKIP_EXISTING_FACTOR)
        },
        FetchScope::Window { days, max_results } => FetchScope::Window {
            days,
            max_results: max_results.map(|n| n.saturating_mul(SKIP_EXISTING_FACTOR))
        }
    };
    FetchQuery {
        scope,
        ..query.clone()
    }
}
