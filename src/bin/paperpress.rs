use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use paperpress::{
    agent::{ClaudeCli, Summarizer},
    fetch::ArxivFetcher,
    publish::{Publisher, QiitaCli},
    storage::LocalSaver,
    Config, FetchQuery, Pipeline, RunOptions, SummaryRecord, Visibility
};

#[derive(Parser)]
#[command(name = "paperpress")]
#[command(about = "Fetch recent arXiv papers, summarize them and publish the summaries as articles")]
struct Args {
    /// Number of papers to process
    #[arg(short = 'n', long, default_value_t = 3)]
    max_results: usize,

    /// Only consider papers submitted in the last `--days-back` days
    #[arg(long)]
    recent: bool,

    /// Size of the `--recent` window in days
    #[arg(long, default_value_t = 7)]
    days_back: u32,

    /// arXiv category to search (repeatable, overrides ARXIV_CATEGORIES)
    #[arg(short, long = "category")]
    categories: Vec<String>,

    /// Keyword the papers must mention (repeatable)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Run the publishing tool on every written article
    #[arg(long)]
    publish: bool,

    /// Publish articles as private
    #[arg(long)]
    private: bool,

    /// Directory the articles are written to (overrides OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also process papers that already have an article
    #[arg(long)]
    no_skip_existing: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("PAPERPRESS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.quiet, args.verbose)?;

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(dir) = args.output_dir {
        config.publish.output_dir = dir;
    }
    let categories = if args.categories.is_empty() {
        config.fetch.categories.clone()
    } else {
        args.categories
    };
    let query = if args.recent {
        FetchQuery::window(categories, args.days_back, Some(args.max_results))
    } else {
        FetchQuery::latest(categories, args.max_results)
    };
    let options = RunOptions {
        query: query.with_keywords(args.keywords),
        publish: args.publish,
        visibility: Visibility::from_private(args.private),
        skip_existing: !args.no_skip_existing
    };

    let fetcher = ArxivFetcher::from_config(config.fetch.clone())
        .context("failed to build HTTP client")?;
    let summarizer = Summarizer::new(
        ClaudeCli::from_config(&config.generator),
        &config.generator.language
    );
    let tool = QiitaCli::from_config(&config.publish);
    if options.publish {
        tool.preflight(|key| env::var(key).ok())
            .await
            .context("cannot publish, install the Qiita CLI with `npm install -g @qiita/qiita-cli` and set its token")?;
    }
    let publisher = Publisher::new(
        tool,
        LocalSaver::new(&config.publish.output_dir),
        config.publish.tags.clone()
    );
    let pipeline = Pipeline::new(fetcher, summarizer, publisher);

    let summary = pipeline.run(&options).await;

    if !args.quiet {
        for data in &summary.summaries {
            print_summary(data);
        }
    }
    println!("run: {}", summary.run_id);
    match &summary.fetch_error {
        Some(e) => println!("fetch: failed: {}", e),
        None => println!("fetch: {} paper(s), {} already processed", summary.fetched, summary.skipped)
    }
    for stage in &summary.stages {
        println!("{}", stage);
    }
    for receipt in &summary.receipts {
        match &receipt.post_id {
            Some(id) => println!("published {} as {}", receipt.paper_id, id),
            None => println!("published {}", receipt.paper_id)
        }
    }
    if !options.publish {
        for document in &summary.documents {
            println!("wrote {}", document.display());
        }
    }

    std::process::exit(summary.exit_code());
}

fn print_summary(data: &SummaryRecord) {
    println!("{}", "=".repeat(50));
    println!("Title: {}", data.title);
    println!("Authors: {}", data.authors.join(", "));
    println!("arXiv ID: {}", data.paper_id);
    println!("Summary: {}", data.summary);
    if !data.key_points.is_empty() {
        println!("Key Points:");
        for (i, point) in data.key_points.iter().enumerate() {
            println!("  {}. {}", i + 1, point);
        }
    }
    if !data.implications.is_empty() {
        println!("Implications: {}", data.implications);
    }
    println!();
}
