//! `SeaORM` entities for the tenant-owned tables the isolation prober writes.
//!
//! Only the columns fixtures need are mapped; the reference schema carries
//! more.

pub mod leases;
pub mod maintenance_requests;
pub mod profiles;
pub mod properties;
pub mod units;
