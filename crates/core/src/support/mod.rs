//! Helper function and index verification.

pub mod verifier;

pub use verifier::verify_support_objects;

#[cfg(test)]
mod tests;
