//! Single-shot and continuous drivers.

use std::future::Future;
use std::time::Duration;

use rlsguard_alert::{DispatchOutcome, Dispatcher};
use rlsguard_core::scoring::{HealthReport, ReportMode};
use tracing::{info, warn};

use crate::auditor::Auditor;

/// Exit code for Healthy and NeedsAttention.
pub const EXIT_OK: i32 = 0;

/// Exit code for Critical, incomplete runs, and setup errors.
pub const EXIT_FAILURE: i32 = 1;

/// A scored and dispatched pass.
#[derive(Debug)]
pub struct PassResult {
    /// The report.
    pub report: HealthReport,
    /// What the dispatcher did with it.
    pub outcome: DispatchOutcome,
}

impl PassResult {
    /// Process exit code for a single-shot run. A report that could not be
    /// written fails the run: it is the artifact CI reads.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.report.is_failing() || !self.outcome.report_written() {
            EXIT_FAILURE
        } else {
            EXIT_OK
        }
    }
}

/// Runs one pass and dispatches its report.
pub async fn run_pass(auditor: &Auditor, dispatcher: &Dispatcher, mode: ReportMode) -> PassResult {
    let report = auditor.run(mode).await;
    let outcome = dispatcher.dispatch(&report).await;
    PassResult { report, outcome }
}

/// Runs passes every `interval` until `shutdown` resolves. A pass in flight
/// is finished first so fixtures are always torn down. Reports never stop
/// the loop. Returns the number of passes run.
pub async fn run_continuous<S, F>(
    auditor: &Auditor,
    dispatcher: &Dispatcher,
    mode: ReportMode,
    interval: Duration,
    shutdown: S,
    mut on_pass: F,
) -> u64
where
    S: Future<Output = ()>,
    F: FnMut(&PassResult),
{
    tokio::pin!(shutdown);
    let mut passes = 0;

    loop {
        let result = run_pass(auditor, dispatcher, mode).await;
        passes += 1;
        if result.report.is_failing() {
            warn!(pass = passes, score = result.report.score, "Pass reported Critical, continuing");
        }
        on_pass(&result);

        tokio::select! {
            () = &mut shutdown => {
                info!(passes, "Shutdown requested, monitor stopping");
                return passes;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
}
