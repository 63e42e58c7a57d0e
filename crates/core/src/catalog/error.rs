//! Catalog error types.

use std::time::Duration;

use thiserror::Error;

/// Catalog query errors.
///
/// Every variant means "could not determine", never "confirmed missing".
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The database cannot be reached.
    #[error("Database unreachable: {0}")]
    Unreachable(String),

    /// A catalog query failed.
    #[error("Catalog query failed: {0}")]
    Query(String),

    /// A catalog query exceeded its timeout.
    #[error("Catalog query timed out after {0:?}")]
    Timeout(Duration),

    /// An identifier was rejected by the allow-list.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl CatalogError {
    /// Whether the error means the whole catalog is unavailable rather than a
    /// single query failing.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}
