//! Health report model.
//!
//! This is the JSON artifact CI reads. Fields are only ever added, and every
//! field added after version 1 carries a serde default so older reports keep
//! parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::finding::{Finding, FindingLevel};

/// Current report schema version.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Overall status derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Score of 90 or more.
    Healthy,
    /// Score from 70 to 89.
    NeedsAttention,
    /// Score below 70, or a run that could not complete.
    Critical,
}

impl HealthStatus {
    /// Fixed score-to-status mapping.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::Healthy,
            70..=89 => Self::NeedsAttention,
            _ => Self::Critical,
        }
    }

    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::NeedsAttention => "Needs Attention",
            Self::Critical => "Critical",
        }
    }
}

/// Which pass produced the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Full audit including isolation probing.
    #[default]
    Audit,
    /// Classifier, inspector, and verifier only.
    Completeness,
}

/// Finding counts per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelCounts {
    /// PASS findings.
    pub pass: usize,
    /// FAIL findings.
    pub fail: usize,
    /// WARN findings.
    pub warn: usize,
    /// ERROR findings.
    pub error: usize,
    /// INFO findings.
    pub info: usize,
}

impl LevelCounts {
    /// Counts findings by level.
    #[must_use]
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.level {
                FindingLevel::Pass => counts.pass += 1,
                FindingLevel::Fail => counts.fail += 1,
                FindingLevel::Warn => counts.warn += 1,
                FindingLevel::Error => counts.error += 1,
                FindingLevel::Info => counts.info += 1,
            }
        }
        counts
    }

    /// Count for one level.
    #[must_use]
    pub const fn get(&self, level: FindingLevel) -> usize {
        match level {
            FindingLevel::Pass => self.pass,
            FindingLevel::Fail => self.fail,
            FindingLevel::Warn => self.warn,
            FindingLevel::Error => self.error,
            FindingLevel::Info => self.info,
        }
    }
}

/// Result of one audit pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Report schema version.
    pub schema_version: u32,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Pass that produced the report.
    #[serde(default)]
    pub mode: ReportMode,
    /// Findings in the order components produced them.
    pub findings: Vec<Finding>,
    /// Health score, 0 to 100.
    pub score: u8,
    /// Status derived from the score and completeness.
    pub status: HealthStatus,
    /// Finding counts per level.
    #[serde(default)]
    pub counts: LevelCounts,
    /// Whether some checks did not run.
    #[serde(default)]
    pub incomplete: bool,
    /// Why the run stopped early, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_reason: Option<String>,
}

impl HealthReport {
    /// Whether the report should fail a CI build.
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.status == HealthStatus::Critical || self.incomplete
    }

    /// Sets the pass that produced the report.
    #[must_use]
    pub fn with_mode(mut self, mode: ReportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Marks the report incomplete. An incomplete run cannot vouch for
    /// isolation, so its status is forced to Critical.
    #[must_use]
    pub fn incomplete(mut self, reason: impl Into<String>) -> Self {
        self.incomplete = true;
        self.status = HealthStatus::Critical;
        self.aborted_reason = Some(reason.into());
        self
    }

    /// FAIL findings, in order.
    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.level == FindingLevel::Fail)
    }
}
