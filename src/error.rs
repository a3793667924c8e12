use std::path::PathBuf;

use thiserror::Error;

use crate::request::ExpectedKind;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport Error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unexpected HTTP status {status} for {path}")]
    Status { path: String, status: u16 },

    #[error("Expected {expected} from {path}, got content type {content_type:?}")]
    UnexpectedContent {
        path: String,
        expected: ExpectedKind,
        content_type: Option<String>,
    },

    #[error("Response from {path} does not match the expected shape: {source}")]
    Schema {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Storage Error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config Error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

/// Failures below the HTTP layer, split by whether another attempt can help.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() || e.is_body() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}
