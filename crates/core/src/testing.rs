//! In-memory implementations of the engine's database seams.
//!
//! [`InMemoryCatalog`] and [`InMemoryIsolationStore`] emulate a Postgres
//! schema with row-level security closely enough to drive every component
//! without a database, and expose knobs to break it in specific ways.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::{CatalogError, PolicyCommand, PolicyRecord, SchemaCatalog, TableName};
use crate::classification::{Registry, Tier};
use crate::isolation::{
    FixtureLabel, IsolationError, IsolationStore, ProbeContext, ProbeQuery, Resource,
};

/// In-memory policy catalog.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: BTreeSet<String>,
    rls: HashMap<String, bool>,
    policies: HashMap<String, Vec<PolicyRecord>>,
    functions: HashSet<String>,
    indexes: HashSet<(String, String)>,
    unreachable: bool,
    broken_tables: HashSet<String>,
    list_calls: Mutex<u32>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every Critical table of the registry, each with
    /// enforcement enabled, an owner-scoped `ALL` policy, and its indexes,
    /// plus every helper function.
    #[must_use]
    pub fn compliant(registry: &Registry) -> Self {
        let mut catalog = Self::new();
        for table in registry.mapped(Tier::Critical) {
            catalog = catalog.with_table(table, true).with_policy(
                table,
                &format!("{table}_owner_all"),
                PolicyCommand::All,
                Some("(owner_id = auth.uid())"),
            );
        }
        for index in registry.required_indexes() {
            catalog = catalog.with_index(index.table, index.index_name);
        }
        for function in registry.helper_functions() {
            catalog = catalog.with_function(function);
        }
        catalog
    }

    /// Adds a table.
    #[must_use]
    pub fn with_table(mut self, table: &str, rls_enabled: bool) -> Self {
        self.tables.insert(table.to_string());
        self.rls.insert(table.to_string(), rls_enabled);
        self
    }

    /// Sets the enforcement flag of an existing table.
    #[must_use]
    pub fn with_rls(mut self, table: &str, enabled: bool) -> Self {
        self.rls.insert(table.to_string(), enabled);
        self
    }

    /// Adds a policy.
    #[must_use]
    pub fn with_policy(
        mut self,
        table: &str,
        name: &str,
        command: PolicyCommand,
        predicate: Option<&str>,
    ) -> Self {
        self.policies
            .entry(table.to_string())
            .or_default()
            .push(PolicyRecord {
                table_name: table.to_string(),
                policy_name: name.to_string(),
                command,
                predicate: predicate.map(str::to_string),
                check: None,
            });
        self
    }

    /// Removes every policy of a table.
    #[must_use]
    pub fn without_policies(mut self, table: &str) -> Self {
        self.policies.remove(table);
        self
    }

    /// Adds a helper function.
    #[must_use]
    pub fn with_function(mut self, name: &str) -> Self {
        self.functions.insert(name.to_string());
        self
    }

    /// Removes a helper function.
    #[must_use]
    pub fn without_function(mut self, name: &str) -> Self {
        self.functions.remove(name);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn with_index(mut self, table: &str, index_name: &str) -> Self {
        self.indexes
            .insert((table.to_string(), index_name.to_string()));
        self
    }

    /// Removes an index.
    #[must_use]
    pub fn without_index(mut self, table: &str, index_name: &str) -> Self {
        self.indexes
            .remove(&(table.to_string(), index_name.to_string()));
        self
    }

    /// Makes every call fail as if the database were down.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Makes queries about one table fail.
    #[must_use]
    pub fn with_broken_table(mut self, table: &str) -> Self {
        self.broken_tables.insert(table.to_string());
        self
    }

    /// Number of `list_tables` calls served.
    #[must_use]
    pub fn list_calls(&self) -> u32 {
        self.list_calls.lock().map(|n| *n).unwrap_or_default()
    }

    fn check(&self, table: Option<&TableName>) -> Result<(), CatalogError> {
        if self.unreachable {
            return Err(CatalogError::Unreachable("connection refused".into()));
        }
        if let Some(table) = table {
            if self.broken_tables.contains(table.as_str()) {
                return Err(CatalogError::Query(format!(
                    "permission denied for table {table}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaCatalog for InMemoryCatalog {
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        if let Ok(mut calls) = self.list_calls.lock() {
            *calls += 1;
        }
        self.check(None)?;
        Ok(self.tables.iter().cloned().collect())
    }

    async fn rls_enabled(&self, table: &TableName) -> Result<Option<bool>, CatalogError> {
        self.check(Some(table))?;
        if !self.tables.contains(table.as_str()) {
            return Ok(None);
        }
        Ok(Some(self.rls.get(table.as_str()).copied().unwrap_or(false)))
    }

    async fn policies(&self, table: &TableName) -> Result<Vec<PolicyRecord>, CatalogError> {
        self.check(Some(table))?;
        Ok(self.policies.get(table.as_str()).cloned().unwrap_or_default())
    }

    async fn function_exists(&self, name: &str) -> Result<bool, CatalogError> {
        self.check(None)?;
        Ok(self.functions.contains(name))
    }

    async fn index_exists(
        &self,
        table: &TableName,
        index_name: &str,
    ) -> Result<bool, CatalogError> {
        self.check(Some(table))?;
        Ok(self
            .indexes
            .contains(&(table.as_str().to_string(), index_name.to_string())))
    }
}

#[derive(Debug, Clone)]
struct Row {
    resource: Resource,
    parent: Uuid,
    label: String,
}

#[derive(Debug, Default)]
struct StoreState {
    identities: BTreeMap<Uuid, String>,
    rows: BTreeMap<Uuid, Row>,
    deletions: Vec<String>,
    failing_deletes: HashMap<Resource, u32>,
}

/// Deletion log entry for identities.
pub const IDENTITY_KIND: &str = "identity";

/// In-memory multi-tenant store with row-level isolation.
///
/// Rows are owned by the identity at the top of their parent chain and a
/// tenant context only sees its own rows, unless the store is told to leak.
/// Deleting a row that still has children fails, like a foreign key would.
#[derive(Debug, Default)]
pub struct InMemoryIsolationStore {
    state: Mutex<StoreState>,
    leaky: HashSet<Resource>,
    anonymous_sees_all: bool,
    bypassable: bool,
    fail_create: Option<Resource>,
    fail_sweep: bool,
    panic_on_count: bool,
    slow_count: Option<Duration>,
    slow_writes: Option<Duration>,
    bypass_reason: Option<String>,
    call_timeout: Option<Duration>,
}

impl InMemoryIsolationStore {
    /// Correctly isolating store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets every tenant read every row of `resource`.
    #[must_use]
    pub fn leaking(mut self, resource: Resource) -> Self {
        self.leaky.insert(resource);
        self
    }

    /// Makes rows visible when no tenant context is set.
    #[must_use]
    pub fn anonymous_sees_all(mut self) -> Self {
        self.anonymous_sees_all = true;
        self
    }

    /// Makes `OR 1=1` predicates return every property.
    #[must_use]
    pub fn bypassable(mut self) -> Self {
        self.bypassable = true;
        self
    }

    /// Fails creation of the given resource.
    #[must_use]
    pub fn failing_create(mut self, resource: Resource) -> Self {
        self.fail_create = Some(resource);
        self
    }

    /// Fails the next `times` deletions of the given resource.
    #[must_use]
    pub fn failing_delete(self, resource: Resource, times: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing_deletes.insert(resource, times);
        }
        self
    }

    /// Fails every sweep.
    #[must_use]
    pub fn failing_sweep(mut self) -> Self {
        self.fail_sweep = true;
        self
    }

    /// Panics inside every count.
    #[must_use]
    pub fn panicking_count(mut self) -> Self {
        self.panic_on_count = true;
        self
    }

    /// Sleeps before answering every count.
    #[must_use]
    pub fn slow_count(mut self, delay: Duration) -> Self {
        self.slow_count = Some(delay);
        self
    }

    /// Sleeps before every fixture insert, delete, and sweep.
    #[must_use]
    pub fn slow_writes(mut self, delay: Duration) -> Self {
        self.slow_writes = Some(delay);
        self
    }

    /// Bounds every store call, the way a database-backed store bounds its
    /// queries.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Reports the probe context as ignoring row-level security.
    #[must_use]
    pub fn bypassing_enforcement(mut self, reason: &str) -> Self {
        self.bypass_reason = Some(reason.to_string());
        self
    }

    /// Seeds a leftover fixture graph, as if a previous run's teardown had
    /// been interrupted. Returns the number of rows seeded.
    pub fn seed_leftover(&self, label: &FixtureLabel) -> u64 {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        let owner = Uuid::new_v4();
        let property = Uuid::new_v4();
        let unit = Uuid::new_v4();
        state.identities.insert(owner, label.email());
        for (id, resource, parent) in [
            (property, Resource::Property, owner),
            (unit, Resource::Unit, property),
            (Uuid::new_v4(), Resource::Lease, unit),
        ] {
            state.rows.insert(
                id,
                Row {
                    resource,
                    parent,
                    label: label.to_string(),
                },
            );
        }
        4
    }

    /// Rows and identities currently stored.
    #[must_use]
    pub fn residual(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.rows.len() + s.identities.len())
            .unwrap_or_default()
    }

    /// Kinds deleted so far, in order (`properties`, ..., `identity`).
    #[must_use]
    pub fn deletions(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.deletions.clone())
            .unwrap_or_default()
    }

    fn owner_of(state: &StoreState, id: Uuid) -> Option<Uuid> {
        let mut current = id;
        for _ in 0..4 {
            if state.identities.contains_key(&current) {
                return Some(current);
            }
            current = state.rows.get(&current)?.parent;
        }
        state.identities.contains_key(&current).then_some(current)
    }

    fn property_of(state: &StoreState, row: &Row) -> Option<Uuid> {
        match row.resource {
            Resource::Property => None,
            Resource::Unit => Some(row.parent),
            Resource::Lease | Resource::MaintenanceRequest => {
                state.rows.get(&row.parent).map(|unit| unit.parent)
            }
        }
    }

    fn visible(&self, state: &StoreState, context: ProbeContext, id: Uuid, row: &Row) -> bool {
        match context {
            ProbeContext::Anonymous => self.anonymous_sees_all,
            ProbeContext::Tenant(tenant) => {
                self.leaky.contains(&row.resource) || Self::owner_of(state, id) == Some(tenant)
            }
        }
    }
}

fn poisoned() -> IsolationError {
    IsolationError::Query("store state poisoned".into())
}

impl InMemoryIsolationStore {
    /// Waits out the injected write latency, failing once it exceeds the
    /// call timeout.
    async fn write_latency(&self) -> Result<(), IsolationError> {
        let Some(delay) = self.slow_writes else {
            return Ok(());
        };
        match self.call_timeout {
            Some(limit) if limit < delay => {
                tokio::time::sleep(limit).await;
                Err(IsolationError::Timeout(limit))
            }
            _ => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl IsolationStore for InMemoryIsolationStore {
    async fn create_identity(&self, label: &FixtureLabel) -> Result<Uuid, IsolationError> {
        self.write_latency().await?;
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let id = Uuid::new_v4();
        state.identities.insert(id, label.email());
        Ok(id)
    }

    async fn create_resource(
        &self,
        resource: Resource,
        parent_id: Uuid,
        label: &FixtureLabel,
    ) -> Result<Uuid, IsolationError> {
        if self.fail_create == Some(resource) {
            return Err(IsolationError::Setup(format!(
                "insert into {} violates check constraint",
                resource.table()
            )));
        }
        self.write_latency().await?;
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let id = Uuid::new_v4();
        state.rows.insert(
            id,
            Row {
                resource,
                parent: parent_id,
                label: label.to_string(),
            },
        );
        Ok(id)
    }

    async fn enforcement_bypass(&self) -> Result<Option<String>, IsolationError> {
        Ok(self.bypass_reason.clone())
    }

    async fn count(
        &self,
        context: ProbeContext,
        query: ProbeQuery,
    ) -> Result<u64, IsolationError> {
        if let Some(delay) = self.slow_count {
            tokio::time::sleep(delay).await;
        }
        assert!(!self.panic_on_count, "count panicked");

        let state = self.state.lock().map_err(|_| poisoned())?;
        let matches = |id: &Uuid, row: &Row| -> bool {
            match query {
                ProbeQuery::PropertyById(property) => {
                    row.resource == Resource::Property && *id == property
                }
                ProbeQuery::UnitsOfProperty(property) => {
                    row.resource == Resource::Unit && Self::property_of(&state, row) == Some(property)
                }
                ProbeQuery::LeasesOfProperty(property) => {
                    row.resource == Resource::Lease
                        && Self::property_of(&state, row) == Some(property)
                }
                ProbeQuery::MaintenanceOfProperty(property) => {
                    row.resource == Resource::MaintenanceRequest
                        && Self::property_of(&state, row) == Some(property)
                }
                ProbeQuery::Visible(resource) => row.resource == resource,
                ProbeQuery::BooleanBypass(_) => row.resource == Resource::Property,
            }
        };

        let bypass = matches!(query, ProbeQuery::BooleanBypass(_)) && self.bypassable;
        let count = state
            .rows
            .iter()
            .filter(|&(id, row)| matches(id, row))
            .filter(|&(id, row)| bypass || self.visible(&state, context, *id, row))
            .count();
        Ok(count as u64)
    }

    async fn delete_resource(&self, resource: Resource, id: Uuid) -> Result<(), IsolationError> {
        self.write_latency().await?;
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        if let Some(remaining) = state.failing_deletes.get_mut(&resource) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IsolationError::Teardown(format!(
                    "delete from {} timed out",
                    resource.table()
                )));
            }
        }
        if state.rows.values().any(|row| row.parent == id) {
            return Err(IsolationError::Teardown(format!(
                "delete from {} violates foreign key constraint",
                resource.table()
            )));
        }
        state.rows.remove(&id);
        state.deletions.push(resource.table().to_string());
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), IsolationError> {
        self.write_latency().await?;
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        if state.rows.values().any(|row| row.parent == id) {
            return Err(IsolationError::Teardown(
                "delete from profiles violates foreign key constraint".into(),
            ));
        }
        state.identities.remove(&id);
        state.deletions.push(IDENTITY_KIND.to_string());
        Ok(())
    }

    async fn sweep(&self, prefix: &str) -> Result<u64, IsolationError> {
        if self.fail_sweep {
            return Err(IsolationError::Teardown("sweep failed".into()));
        }
        self.write_latency().await?;
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let before = state.rows.len() + state.identities.len();
        state.rows.retain(|_, row| !row.label.starts_with(prefix));
        state.identities.retain(|_, email| !email.starts_with(prefix));
        let after = state.rows.len() + state.identities.len();
        Ok((before - after) as u64)
    }
}
