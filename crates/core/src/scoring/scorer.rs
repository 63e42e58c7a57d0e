//! Health scorer.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::finding::{Finding, FindingCode, FindingLevel};

use super::report::{HealthReport, HealthStatus, LevelCounts, REPORT_SCHEMA_VERSION, ReportMode};

/// Score deductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalties {
    /// FAIL on a Critical-tier table.
    pub critical_fail: u32,
    /// FAIL on any other subject, or none.
    pub other_fail: u32,
    /// ERROR.
    pub error: u32,
    /// WARN.
    pub warn: u32,
    /// Extra deduction per table with enforcement disabled, on top of the
    /// finding that reported it.
    pub rls_disabled: u32,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            critical_fail: 25,
            other_fail: 10,
            error: 10,
            warn: 5,
            rls_disabled: 20,
        }
    }
}

/// Pure, stateless scorer. Never reads previous reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthScorer {
    penalties: Penalties,
}

impl HealthScorer {
    /// Scorer with custom penalties.
    #[must_use]
    pub const fn new(penalties: Penalties) -> Self {
        Self { penalties }
    }

    /// Deduction for one finding.
    #[must_use]
    pub fn penalty(&self, finding: &Finding) -> u32 {
        match finding.level {
            FindingLevel::Fail if finding.is_critical_fail() => self.penalties.critical_fail,
            FindingLevel::Fail => self.penalties.other_fail,
            FindingLevel::Error => self.penalties.error,
            FindingLevel::Warn => self.penalties.warn,
            FindingLevel::Pass | FindingLevel::Info => 0,
        }
    }

    /// Computes the 0-100 score: start at 100, subtract every finding's
    /// penalty plus the disabled-enforcement penalty per table, floor at 0.
    #[must_use]
    pub fn compute(&self, findings: &[Finding]) -> u8 {
        let disabled_tables: BTreeSet<&str> = findings
            .iter()
            .filter(|f| f.code == FindingCode::RlsDisabled)
            .filter_map(Finding::table)
            .collect();

        let deductions = findings
            .iter()
            .map(|f| self.penalty(f))
            .chain(disabled_tables.iter().map(|_| self.penalties.rls_disabled))
            .fold(0u32, u32::saturating_add);

        u8::try_from(100u32.saturating_sub(deductions)).unwrap_or(0)
    }

    /// Builds the report for a run's findings.
    #[must_use]
    pub fn score(&self, findings: Vec<Finding>) -> HealthReport {
        let score = self.compute(&findings);
        HealthReport {
            schema_version: REPORT_SCHEMA_VERSION,
            timestamp: Utc::now(),
            mode: ReportMode::default(),
            counts: LevelCounts::tally(&findings),
            findings,
            score,
            status: HealthStatus::from_score(score),
            incomplete: false,
            aborted_reason: None,
        }
    }
}
