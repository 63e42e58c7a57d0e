//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `GuardError`.
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that end a run before a normal report can be produced.
///
/// Anything narrower than these (a failed catalog query for one table, a sink
/// that timed out) is converted into a finding at the component boundary and
/// never reaches this type.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database or its catalog could not be reached at all.
    #[error("Structural error: {0}")]
    Structural(String),

    /// The report artifact could not be written.
    #[error("Report error: {0}")]
    Report(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    /// Returns the stable error code used in logs and the report artifact.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Structural(_) => "STRUCTURAL_ERROR",
            Self::Report(_) => "REPORT_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Process exit code for this error. Every unrecoverable error fails the build.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }
}

impl From<config::ConfigError> for GuardError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GuardError::Config(String::new()).error_code(), "CONFIG_ERROR");
        assert_eq!(
            GuardError::Structural(String::new()).error_code(),
            "STRUCTURAL_ERROR"
        );
        assert_eq!(GuardError::Report(String::new()).error_code(), "REPORT_ERROR");
        assert_eq!(
            GuardError::Internal(String::new()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_every_error_fails_the_process() {
        assert_eq!(GuardError::Config(String::new()).exit_code(), 1);
        assert_eq!(GuardError::Structural(String::new()).exit_code(), 1);
        assert_eq!(GuardError::Report(String::new()).exit_code(), 1);
        assert_eq!(GuardError::Internal(String::new()).exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            GuardError::Config("msg".into()).to_string(),
            "Configuration error: msg"
        );
        assert_eq!(
            GuardError::Structural("msg".into()).to_string(),
            "Structural error: msg"
        );
        assert_eq!(
            GuardError::Report("msg".into()).to_string(),
            "Report error: msg"
        );
        assert_eq!(
            GuardError::Internal("msg".into()).to_string(),
            "Internal error: msg"
        );
    }
}
