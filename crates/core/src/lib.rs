//! Audit engine for rlsguard.
//!
//! This crate holds the whole compliance engine with ZERO database driver or
//! HTTP dependencies. It reaches the database only through the
//! [`catalog::SchemaCatalog`] and [`isolation::IsolationStore`] traits.
//!
//! # Modules
//!
//! - `catalog` - The read-only catalog seam and validated identifiers
//! - `classification` - Table tiers and the static security registry
//! - `policy` - Enforcement and policy coverage inspection
//! - `support` - Helper function and index verification
//! - `isolation` - Cross-tenant isolation probing with fixture lifecycle
//! - `scoring` - Health score, report model, alert summaries
//! - `finding` - The finding type every component emits

pub mod catalog;
pub mod classification;
pub mod finding;
pub mod isolation;
pub mod policy;
pub mod scoring;
pub mod support;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use finding::{Finding, FindingCode, FindingLevel, Subject};
pub use scoring::{HealthReport, HealthScorer, HealthStatus};
