//! Alert sinks.
//!
//! Sinks only know how to shape and send one request. Timeouts and retries
//! are applied by [`deliver_with_retry`] so every sink behaves the same.

use std::time::Duration;

use async_trait::async_trait;
use rlsguard_core::scoring::{AlertSummary, HealthReport};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SinkError;

/// A destination for alerts.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Delivers one alert. Called at most `1 + retries` times per dispatch.
    async fn deliver(&self, summary: &AlertSummary, report: &HealthReport)
    -> Result<(), SinkError>;
}

/// Delivers to `sink` under `timeout`, retrying at most `retries` times
/// (clamped to one) on retryable failures.
pub async fn deliver_with_retry(
    sink: &dyn Sink,
    summary: &AlertSummary,
    report: &HealthReport,
    timeout: Duration,
    retries: u32,
) -> Result<(), SinkError> {
    let retries = retries.min(1);
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(timeout, sink.deliver(summary, report)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(timeout)),
        };
        match result {
            Ok(()) => {
                debug!(sink = sink.name(), attempt, "Alert delivered");
                return Ok(());
            }
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(sink = sink.name(), error = %err, attempt, "Alert delivery failed, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, SinkError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SinkError::Transport(e.to_string()))
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    title: &'a str,
    messages: Vec<String>,
}

/// Chat-style webhook taking a title and a list of message lines.
#[derive(Debug, Clone)]
pub struct ChatWebhookSink {
    client: reqwest::Client,
    url: String,
}

impl ChatWebhookSink {
    /// Creates a sink posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Sink for ChatWebhookSink {
    fn name(&self) -> &'static str {
        "chat_webhook"
    }

    async fn deliver(
        &self,
        summary: &AlertSummary,
        _report: &HealthReport,
    ) -> Result<(), SinkError> {
        let payload = ChatPayload {
            title: &summary.title,
            messages: summary.lines(),
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Dashboard ingestion endpoint taking the full report with bearer auth.
#[derive(Debug, Clone)]
pub struct DashboardSink {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl DashboardSink {
    /// Creates a sink posting to `url` with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl Sink for DashboardSink {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    async fn deliver(
        &self,
        _summary: &AlertSummary,
        report: &HealthReport,
    ) -> Result<(), SinkError> {
        self.client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
