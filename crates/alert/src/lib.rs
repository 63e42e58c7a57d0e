//! Delivery side of rlsguard.
//!
//! This crate provides:
//! - The [`Sink`] trait and the chat-webhook and dashboard sinks
//! - A uniform timeout/retry wrapper applied once, at the call site
//! - [`ReportWriter`], the local JSON report store with retention
//! - [`Dispatcher`], which always persists the report and alerts when the
//!   status is not Healthy

pub mod dispatcher;
pub mod error;
pub mod report_store;
pub mod sink;

#[cfg(test)]
mod tests;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{ReportError, SinkError};
pub use report_store::ReportWriter;
pub use sink::{ChatWebhookSink, DashboardSink, Sink, deliver_with_retry};
