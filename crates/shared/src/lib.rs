//! Shared configuration, errors, and tracing setup for rlsguard.
//!
//! This crate provides the ambient pieces every other crate leans on:
//! - Layered configuration (files + `RLSGUARD__*` environment)
//! - The application-wide error taxonomy
//! - Tracing subscriber initialization

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{AlertConfig, AuditConfig, DatabaseConfig, GuardConfig, LogConfig, LogFormat};
pub use error::{GuardError, GuardResult};
pub use telemetry::init_tracing;
