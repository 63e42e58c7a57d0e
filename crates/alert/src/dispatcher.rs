//! Alert dispatcher.

use std::path::PathBuf;
use std::time::Duration;

use futures::future::join_all;
use rlsguard_core::scoring::{AlertSummary, HealthReport, HealthStatus};
use rlsguard_shared::{AlertConfig, AuditConfig};
use tracing::{error, info, warn};

use crate::error::{ReportError, SinkError};
use crate::report_store::ReportWriter;
use crate::sink::{ChatWebhookSink, DashboardSink, Sink, deliver_with_retry};

/// What happened to one report.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Summary that was (or would have been) sent.
    pub summary: AlertSummary,
    /// Where the report was written, or why it was not.
    pub written: Result<PathBuf, ReportError>,
    /// Sinks that accepted the alert.
    pub delivered: Vec<&'static str>,
    /// Sinks that did not, with the last error.
    pub failed: Vec<(&'static str, SinkError)>,
}

impl DispatchOutcome {
    /// Whether the local report was persisted.
    #[must_use]
    pub const fn report_written(&self) -> bool {
        self.written.is_ok()
    }
}

/// Persists reports and fans alerts out to the configured sinks.
pub struct Dispatcher {
    writer: ReportWriter,
    sinks: Vec<Box<dyn Sink>>,
    timeout: Duration,
    retries: u32,
    top_failures: usize,
}

impl Dispatcher {
    /// Creates a dispatcher with explicit sinks.
    #[must_use]
    pub fn new(
        writer: ReportWriter,
        sinks: Vec<Box<dyn Sink>>,
        timeout: Duration,
        retries: u32,
        top_failures: usize,
    ) -> Self {
        Self {
            writer,
            sinks,
            timeout,
            retries: retries.min(1),
            top_failures,
        }
    }

    /// Builds the dispatcher from configuration. A sink without credentials
    /// is left out without complaint.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(alerts: &AlertConfig, audit: &AuditConfig) -> Result<Self, SinkError> {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        if let Some(url) = alerts.webhook() {
            sinks.push(Box::new(ChatWebhookSink::new(url, alerts.timeout())?));
        }
        if let Some((url, token)) = alerts.dashboard_credentials() {
            sinks.push(Box::new(DashboardSink::new(url, token, alerts.timeout())?));
        }
        info!(
            sinks = ?sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Alert sinks configured"
        );

        Ok(Self::new(
            ReportWriter::new(&audit.report_dir, audit.retain_reports),
            sinks,
            alerts.timeout(),
            alerts.retries,
            alerts.top_failures,
        ))
    }

    /// Report store.
    #[must_use]
    pub const fn writer(&self) -> &ReportWriter {
        &self.writer
    }

    /// Writes the report, then alerts every sink if the status is not
    /// Healthy. Sink failures are logged and returned, never raised.
    pub async fn dispatch(&self, report: &HealthReport) -> DispatchOutcome {
        let previous_score = match self.writer.read_latest() {
            Ok(previous) => previous.map(|r| r.score),
            Err(err) => {
                warn!(error = %err, "Previous report unreadable, trend unavailable");
                None
            }
        };

        let written = self.writer.write(report);
        if let Err(err) = &written {
            error!(error = %err, "Failed to write local report");
        }

        let summary = AlertSummary::from_report(report, self.top_failures, previous_score);
        let mut outcome = DispatchOutcome {
            summary,
            written,
            delivered: Vec::new(),
            failed: Vec::new(),
        };

        if report.status == HealthStatus::Healthy || self.sinks.is_empty() {
            return outcome;
        }

        let summary = &outcome.summary;
        let deliveries = self.sinks.iter().map(|sink| async move {
            let result =
                deliver_with_retry(sink.as_ref(), summary, report, self.timeout, self.retries)
                    .await;
            (sink.name(), result)
        });
        let results = join_all(deliveries).await;

        for (name, result) in results {
            match result {
                Ok(()) => outcome.delivered.push(name),
                Err(err) => {
                    warn!(sink = name, error = %err, "Alert delivery failed");
                    outcome.failed.push((name, err));
                }
            }
        }
        outcome
    }
}
