//! Health scoring, the report model, and alert summaries.

pub mod report;
pub mod scorer;
pub mod summary;

#[cfg(test)]
mod scorer_props;

pub use report::{HealthReport, HealthStatus, LevelCounts, REPORT_SCHEMA_VERSION, ReportMode};
pub use scorer::{HealthScorer, Penalties};
pub use summary::AlertSummary;
