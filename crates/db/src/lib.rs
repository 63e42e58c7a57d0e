//! Postgres side of rlsguard, built on `SeaORM`.
//!
//! This crate provides:
//! - [`PgCatalog`], the system-catalog reader behind the policy inspector
//! - [`PgIsolationStore`], fixture management and tenant-context probe queries
//! - [`TenantConnection`], a transaction carrying a tenant identity
//! - The reference schema migration used for validation databases

pub mod catalog;
pub mod entities;
pub mod migration;
pub mod rls;
pub mod store;

pub use catalog::PgCatalog;
pub use rls::TenantConnection;
pub use store::PgIsolationStore;

use rlsguard_shared::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::debug;

/// Opens a connection pool to `url` with the pool limits from `config`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(config.max_connections)
        .min_connections(0)
        .connect_timeout(config.connect_timeout())
        .acquire_timeout(config.connect_timeout())
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    debug!(max_connections = config.max_connections, "Database pool ready");
    Ok(db)
}
