//! Policy inspection: enforcement flags, coverage, and predicate heuristics.

pub mod heuristics;
pub mod inspector;


pub use heuristics::{PredicateVerdict, assess_predicate};
pub use inspector::inspect_policies;
