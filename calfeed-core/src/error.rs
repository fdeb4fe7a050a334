//! Error types for the calfeed pipeline.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can occur while ingesting or persisting calendar feeds.
#[derive(Error, Debug)]
pub enum CalFeedError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Sync status error: {0}")]
    Status(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for calfeed operations.
pub type CalFeedResult<T> = Result<T, CalFeedError>;
