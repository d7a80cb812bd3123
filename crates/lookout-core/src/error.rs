//! Error types shared by the ports.

use thiserror::Error;

/// Failures talking to the job store.
///
/// These are the transient failures of the read path: they propagate out of
/// `list_jobs`/`get_job` and are captured as a string by `get_stats`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A stored payload that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeserializeError {
    #[error("Payload is not valid UTF-8")]
    Encoding,

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Invalid timestamp: {0}")]
    Timestamp(i64),
}
