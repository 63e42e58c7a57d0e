//! Read-only view of the database catalog.
//!
//! Components never build SQL themselves; they ask a [`SchemaCatalog`] for
//! enforcement flags, policies, routines, and indexes. Table names crossing
//! this seam are [`TableName`]s, so only allow-listed identifiers ever reach
//! a query.

pub mod error;
pub mod types;

use async_trait::async_trait;

pub use error::CatalogError;
pub use types::{Operation, PolicyCommand, PolicyRecord, TableName};

/// Catalog queries used by the classifier, inspector, and verifier.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Lists every base table in the audited schema.
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError>;

    /// Returns whether row-level enforcement is enabled.
    ///
    /// `Ok(None)` means the table does not exist.
    async fn rls_enabled(&self, table: &TableName) -> Result<Option<bool>, CatalogError>;

    /// Lists the policies defined on a table.
    async fn policies(&self, table: &TableName) -> Result<Vec<PolicyRecord>, CatalogError>;

    /// Returns whether a callable routine with this name exists.
    async fn function_exists(&self, name: &str) -> Result<bool, CatalogError>;

    /// Returns whether the named index exists on the table.
    async fn index_exists(&self, table: &TableName, index_name: &str)
    -> Result<bool, CatalogError>;
}
