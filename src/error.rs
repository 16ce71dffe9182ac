use std::{io, process::ExitStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // results yielded before this error must be discarded by the caller.
    #[error("search API unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    #[error("all {pages} page(s) of the feed were malformed")]
    Malformed { pages: u32 }
}

// a feed page that could not be used. the page is skipped.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to deserialize feed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("search API reported an error: {0}")]
    Api(String)
}

// failure to reach the search API for one request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no recognizable section header")]
    NoSections,

    #[error("document has no title heading")]
    MissingTitle,

    #[error("document has no arXiv identifier")]
    MissingIdentifier
}

// failure of an external command-line tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error
    },

    #[error("`{program}` did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String
    },

    #[error("`{0}` produced no output")]
    EmptyOutput(String)
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation tool failed: {0}")]
    Tool(#[from] ToolError)
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error
    },

    #[error("publishing tool failed: {0}")]
    Tool(#[from] ToolError),

    #[error("publishing tool is not ready: {0}")]
    NotReady(String)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String
    }
}
