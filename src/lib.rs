pub mod agent;
pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod process;
pub mod prompt;
pub mod publish;
pub mod sections;
pub mod storage;

pub use config::Config;
pub use model::{PaperRecord, PublishReceipt, SummaryRecord, Visibility};
pub use parser::{FetchQuery, FetchScope};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
