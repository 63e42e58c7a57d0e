//! Cross-tenant isolation probing.
//!
//! Two synthetic tenants each get a property, a unit, a lease, and a
//! maintenance request. Queries then run under each tenant's own context and
//! under no context at all; any row crossing a tenant boundary is a FAIL.
//! Fixtures are always torn down, and a sweep keyed by [`FIXTURE_PREFIX`]
//! removes anything an earlier run left behind.

pub mod error;
pub mod prober;
pub mod types;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use uuid::Uuid;

pub use error::IsolationError;
pub use prober::probe_isolation;
pub use types::{
    FIXTURE_PREFIX, FixtureLabel, IsolationFixture, ProbeContext, ProbeQuery, Resource,
    TenantGraph,
};

/// Data access used by the prober.
///
/// Creation and deletion run with administrative rights; [`count`] runs under
/// the given [`ProbeContext`] so row-level policies apply.
///
/// [`count`]: IsolationStore::count
#[async_trait]
pub trait IsolationStore: Send + Sync {
    /// Creates a synthetic tenant identity and returns its id.
    async fn create_identity(&self, label: &FixtureLabel) -> Result<Uuid, IsolationError>;

    /// Creates one fixture row under `parent_id` and returns its id.
    ///
    /// The parent of a property is the owning identity; of a unit, its
    /// property; of a lease or maintenance request, its unit.
    async fn create_resource(
        &self,
        resource: Resource,
        parent_id: Uuid,
        label: &FixtureLabel,
    ) -> Result<Uuid, IsolationError>;

    /// Reports why probe queries would ignore row-level security, if they
    /// would: a superuser or `BYPASSRLS` role, or a role owning a probed
    /// table that does not force enforcement. `None` means counts are
    /// meaningful.
    async fn enforcement_bypass(&self) -> Result<Option<String>, IsolationError>;

    /// Counts the rows a query returns under the given context.
    async fn count(&self, context: ProbeContext, query: ProbeQuery)
    -> Result<u64, IsolationError>;

    /// Deletes one fixture row.
    async fn delete_resource(&self, resource: Resource, id: Uuid) -> Result<(), IsolationError>;

    /// Deletes a synthetic identity.
    async fn delete_identity(&self, id: Uuid) -> Result<(), IsolationError>;

    /// Deletes every fixture row and identity whose label starts with `prefix`,
    /// children first. Returns the number of rows removed.
    async fn sweep(&self, prefix: &str) -> Result<u64, IsolationError>;
}
