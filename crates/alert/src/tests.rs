use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rlsguard_core::classification::Tier;
use rlsguard_core::finding::{Finding, FindingCode, Subject};
use rlsguard_core::scoring::{AlertSummary, HealthReport, HealthScorer, HealthStatus};
use rlsguard_shared::{AlertConfig, AuditConfig};
use tempfile::TempDir;

use crate::{Dispatcher, ReportWriter, Sink, SinkError, deliver_with_retry};

/// Sink that records calls and fails a set number of times first.
struct FakeSink {
    name: &'static str,
    failures_left: AtomicU32,
    error: SinkError,
    delay: Option<Duration>,
    received: Mutex<Vec<AlertSummary>>,
}

impl FakeSink {
    fn ok(name: &'static str) -> Self {
        Self::failing(name, 0, SinkError::Status(500))
    }

    fn failing(name: &'static str, times: u32, error: SinkError) -> Self {
        Self {
            name,
            failures_left: AtomicU32::new(times),
            error,
            delay: None,
            received: Mutex::new(Vec::new()),
        }
    }

    fn slow(name: &'static str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok(name)
        }
    }

    fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl Sink for FakeSink {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn deliver(
        &self,
        summary: &AlertSummary,
        _report: &HealthReport,
    ) -> Result<(), SinkError> {
        self.received.lock().unwrap().push(summary.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(self.error.clone());
        }
        Ok(())
    }
}

/// Shares one fake between the dispatcher and the test.
struct Shared(std::sync::Arc<FakeSink>);

#[async_trait]
impl Sink for Shared {
    fn name(&self) -> &'static str {
        self.0.name
    }

    async fn deliver(
        &self,
        summary: &AlertSummary,
        report: &HealthReport,
    ) -> Result<(), SinkError> {
        self.0.deliver(summary, report).await
    }
}

fn leaking_report() -> HealthReport {
    let leak = |direction: &str| {
        Finding::fail(
            FindingCode::CrossTenantLeak,
            format!("tenant {direction} reading the other tenant's leases: expected no rows, got 1"),
        )
        .with_subject(Subject::table("leases", Tier::Critical))
    };
    HealthScorer::default().score(vec![leak("A"), leak("B")])
}

fn healthy_report() -> HealthReport {
    HealthScorer::default().score(vec![Finding::pass(
        FindingCode::TableCompliant,
        "'leases' has enforcement enabled and 1 scoped policies",
    )])
}

fn dispatcher(dir: &TempDir, sinks: Vec<Box<dyn Sink>>) -> Dispatcher {
    Dispatcher::new(
        ReportWriter::new(dir.path(), 30),
        sinks,
        Duration::from_secs(5),
        1,
        5,
    )
}

#[tokio::test]
async fn test_healthy_report_is_written_but_not_alerted() {
    let dir = TempDir::new().unwrap();
    let sink = std::sync::Arc::new(FakeSink::ok("chat"));
    let dispatcher = dispatcher(&dir, vec![Box::new(Shared(sink.clone()))]);

    let outcome = dispatcher.dispatch(&healthy_report()).await;

    assert!(outcome.report_written());
    assert!(dir.path().join("latest.json").exists());
    assert_eq!(sink.calls(), 0);
    assert!(outcome.delivered.is_empty());
}

#[tokio::test]
async fn test_critical_report_reaches_every_sink() {
    let dir = TempDir::new().unwrap();
    let chat = std::sync::Arc::new(FakeSink::ok("chat"));
    let dashboard = std::sync::Arc::new(FakeSink::ok("dashboard"));
    let dispatcher = dispatcher(
        &dir,
        vec![
            Box::new(Shared(chat.clone())),
            Box::new(Shared(dashboard.clone())),
        ],
    );
    let report = leaking_report();
    assert_eq!(report.status, HealthStatus::Critical);

    let outcome = dispatcher.dispatch(&report).await;

    assert_eq!(outcome.delivered, vec!["chat", "dashboard"]);
    let received = chat.received.lock().unwrap();
    assert_eq!(received[0].top_failures.len(), 2);
    assert!(received[0].top_failures[0].contains("leases"));
}

#[tokio::test]
async fn test_failing_sink_does_not_block_others_or_the_report() {
    let dir = TempDir::new().unwrap();
    let broken = std::sync::Arc::new(FakeSink::failing("chat", 5, SinkError::Status(503)));
    let healthy = std::sync::Arc::new(FakeSink::ok("dashboard"));
    let dispatcher = dispatcher(
        &dir,
        vec![
            Box::new(Shared(broken.clone())),
            Box::new(Shared(healthy.clone())),
        ],
    );

    let outcome = dispatcher.dispatch(&leaking_report()).await;

    assert!(outcome.report_written());
    assert_eq!(outcome.delivered, vec!["dashboard"]);
    assert_eq!(outcome.failed, vec![("chat", SinkError::Status(503))]);
    assert_eq!(broken.calls(), 2, "one retry at most");
}

#[tokio::test]
async fn test_transient_failure_is_retried_once() {
    let sink = FakeSink::failing("chat", 1, SinkError::Transport("connection reset".into()));
    let report = leaking_report();
    let summary = AlertSummary::from_report(&report, 5, None);

    let result = deliver_with_retry(&sink, &summary, &report, Duration::from_secs(1), 1).await;

    assert!(result.is_ok());
    assert_eq!(sink.calls(), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let sink = FakeSink::failing("dashboard", 3, SinkError::Status(401));
    let report = leaking_report();
    let summary = AlertSummary::from_report(&report, 5, None);

    let result = deliver_with_retry(&sink, &summary, &report, Duration::from_secs(1), 1).await;

    assert_eq!(result, Err(SinkError::Status(401)));
    assert_eq!(sink.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_sink_times_out() {
    let sink = FakeSink::slow("chat", Duration::from_secs(30));
    let report = leaking_report();
    let summary = AlertSummary::from_report(&report, 5, None);

    let result = deliver_with_retry(&sink, &summary, &report, Duration::from_secs(2), 0).await;

    assert_eq!(result, Err(SinkError::Timeout(Duration::from_secs(2))));
}

#[tokio::test]
async fn test_trend_uses_previous_latest_report() {
    let dir = TempDir::new().unwrap();
    let dispatcher = dispatcher(&dir, Vec::new());

    let first = dispatcher.dispatch(&healthy_report()).await;
    let second = dispatcher.dispatch(&leaking_report()).await;

    assert_eq!(first.summary.previous_score, None);
    assert_eq!(second.summary.previous_score, Some(100));
    assert_eq!(second.summary.delta(), Some(-50));
}

#[tokio::test]
async fn test_unwritable_report_dir_still_alerts() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("reports");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let sink = std::sync::Arc::new(FakeSink::ok("chat"));
    let dispatcher = Dispatcher::new(
        ReportWriter::new(&blocker, 30),
        vec![Box::new(Shared(sink.clone()))],
        Duration::from_secs(5),
        1,
        5,
    );

    let outcome = dispatcher.dispatch(&leaking_report()).await;

    assert!(!outcome.report_written());
    assert_eq!(sink.calls(), 1);
}

#[tokio::test]
async fn test_missing_credentials_disable_sinks() {
    let dir = TempDir::new().unwrap();
    let alerts = AlertConfig {
        webhook_url: Some("   ".into()),
        dashboard_url: Some("https://dashboard.invalid/ingest".into()),
        dashboard_token: None,
        ..AlertConfig::default()
    };
    let audit = AuditConfig {
        report_dir: dir.path().to_string_lossy().into_owned(),
        ..AuditConfig::default()
    };

    let dispatcher = Dispatcher::from_config(&alerts, &audit).unwrap();
    let outcome = dispatcher.dispatch(&leaking_report()).await;

    assert!(outcome.report_written());
    assert!(outcome.delivered.is_empty());
    assert!(outcome.failed.is_empty());
}

#[test]
fn test_writer_round_trips_latest() {
    let dir = TempDir::new().unwrap();
    let writer = ReportWriter::new(dir.path(), 30);
    assert!(writer.read_latest().unwrap().is_none());

    let report = leaking_report();
    let path = writer.write(&report).unwrap();

    assert!(path.file_name().unwrap().to_str().unwrap().starts_with("rlsguard-report-"));
    assert_eq!(writer.read_latest().unwrap(), Some(report));
}

#[test]
fn test_writer_prunes_oldest_reports() {
    let dir = TempDir::new().unwrap();
    let writer = ReportWriter::new(dir.path(), 3);

    for day in 1..=5 {
        let mut report = healthy_report();
        report.timestamp = Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap();
        writer.write(&report).unwrap();
    }

    let kept: Vec<String> = writer
        .list()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        kept,
        vec![
            "rlsguard-report-20260303T120000.000Z.json",
            "rlsguard-report-20260304T120000.000Z.json",
            "rlsguard-report-20260305T120000.000Z.json",
        ]
    );
    assert!(dir.path().join("latest.json").exists());
}

#[test]
fn test_corrupt_latest_is_an_error_not_a_panic() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("latest.json"), b"{ not json").unwrap();
    let writer = ReportWriter::new(dir.path(), 30);

    assert!(writer.read_latest().is_err());
}
