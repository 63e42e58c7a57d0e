//! Alert and report persistence errors.

use std::time::Duration;

use thiserror::Error;

/// Failure delivering to one sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The request could not be sent or its response not read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    /// No answer within the delivery timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl SinkError {
    /// Whether another attempt may succeed. Client errors other than 408 and
    /// 429 will not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code >= 500 || *code == 408 || *code == 429,
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Transport(err.to_string()),
        }
    }
}

/// Failure persisting or reading a report file.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem failure.
    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The report could not be encoded or decoded.
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
