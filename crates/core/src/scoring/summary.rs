//! Alert and console summaries of a report.

use std::fmt::Write as _;

use serde::Serialize;

use crate::finding::FindingLevel;

use super::report::{HealthReport, HealthStatus, LevelCounts};

/// Short, human-sized digest of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    /// One-line title.
    pub title: String,
    /// Overall status.
    pub status: HealthStatus,
    /// Health score.
    pub score: u8,
    /// Score of the previous report, when known.
    pub previous_score: Option<u8>,
    /// Counts per level.
    pub counts: LevelCounts,
    /// The first FAIL messages, at most `top_n`.
    pub top_failures: Vec<String>,
    /// Total FAIL findings, including those beyond `top_failures`.
    pub total_failures: usize,
    /// Why the run stopped early, if it did.
    pub aborted_reason: Option<String>,
}

impl AlertSummary {
    /// Summarizes a report.
    #[must_use]
    pub fn from_report(report: &HealthReport, top_n: usize, previous_score: Option<u8>) -> Self {
        let top_failures = report
            .failures()
            .take(top_n)
            .map(|f| f.message.clone())
            .collect();

        Self {
            title: format!(
                "RLS health {}: score {}/100",
                report.status.as_str(),
                report.score
            ),
            status: report.status,
            score: report.score,
            previous_score,
            counts: report.counts,
            top_failures,
            total_failures: report.counts.fail,
            aborted_reason: report.aborted_reason.clone(),
        }
    }

    /// Score change against the previous report.
    #[must_use]
    pub fn delta(&self) -> Option<i16> {
        self.previous_score
            .map(|previous| i16::from(self.score) - i16::from(previous))
    }

    /// Message lines for chat-style sinks.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.counts_line()];
        if let Some(delta) = self.delta() {
            lines.push(format!("Change since last run: {delta:+}"));
        }
        if let Some(reason) = &self.aborted_reason {
            lines.push(format!("Run incomplete: {reason}"));
        }
        lines.extend(self.top_failures.iter().map(|m| format!("FAIL: {m}")));
        let hidden = self.total_failures.saturating_sub(self.top_failures.len());
        if hidden > 0 {
            lines.push(format!("... and {hidden} more failures"));
        }
        lines
    }

    fn counts_line(&self) -> String {
        FindingLevel::ALL
            .iter()
            .map(|level| format!("{} {}", self.counts.get(*level), level.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Multi-line console rendering.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        for line in self.lines() {
            let _ = writeln!(out, "  {line}");
        }
        if self.status == HealthStatus::NeedsAttention {
            let _ = writeln!(
                out,
                "  Warning: RLS health needs attention; review WARN and FAIL findings"
            );
        }
        out
    }
}
