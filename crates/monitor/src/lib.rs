//! Run driver for rlsguard.
//!
//! An [`Auditor`] composes one pass: classify, inspect and verify
//! concurrently, probe isolation, score. The driver functions hand each
//! report to the dispatcher and turn it into an exit code, once or on an
//! interval.

pub mod auditor;
pub mod driver;


pub use auditor::Auditor;
pub use driver::{EXIT_FAILURE, EXIT_OK, PassResult, run_continuous, run_pass};
