//! Isolation probe error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by an [`IsolationStore`](super::IsolationStore).
#[derive(Debug, Clone, Error)]
pub enum IsolationError {
    /// A fixture row could not be created.
    #[error("Fixture setup failed: {0}")]
    Setup(String),

    /// A probe query failed.
    #[error("Probe query failed: {0}")]
    Query(String),

    /// A fixture row could not be deleted.
    #[error("Fixture teardown failed: {0}")]
    Teardown(String),

    /// A store call exceeded its timeout.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}
