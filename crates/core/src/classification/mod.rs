//! Table sensitivity classification.

pub mod classifier;
pub mod registry;
pub mod types;


pub use classifier::classify;
pub use registry::{RequiredIndex, Registry};
pub use types::{Classification, TableClassification, Tier};
