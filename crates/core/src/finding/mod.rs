//! Findings: the atomic audit results every component produces.

pub mod types;

pub use types::{Finding, FindingCode, FindingLevel, Subject};
