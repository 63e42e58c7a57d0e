//! Postgres-backed [`IsolationStore`].
//!
//! Fixtures are written and removed over the administrative connection.
//! Probe counts run on the application connection inside a
//! [`TenantConnection`], so the row-level policies under audit decide what
//! comes back. Every call is bounded by the configured query timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rlsguard_core::isolation::{
    FixtureLabel, IsolationError, IsolationStore, ProbeContext, ProbeQuery, Resource,
};
use rlsguard_shared::DatabaseConfig;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QuerySelect, Set, Statement,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{leases, maintenance_requests, profiles, properties, units};
use crate::rls::TenantConnection;

const BOOLEAN_BYPASS_SQL: &str = "SELECT COUNT(*) AS count FROM properties WHERE id = $1 OR 1=1";

const ROLE_PRIVILEGES_SQL: &str = r"
SELECT current_user::text AS role_name,
       r.rolsuper AS superuser,
       r.rolbypassrls AS bypass_rls
FROM pg_roles r
WHERE r.rolname = current_user
";

/// Probed tables the current role owns without `FORCE ROW LEVEL SECURITY`.
const OWNED_UNFORCED_SQL: &str = r"
SELECT c.relname::text AS table_name
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = current_schema()
  AND c.relname IN ('properties', 'units', 'leases', 'maintenance_requests')
  AND NOT c.relforcerowsecurity
  AND pg_has_role(current_user, c.relowner, 'USAGE')
ORDER BY c.relname
";

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct RolePrivileges {
    role_name: String,
    superuser: bool,
    bypass_rls: bool,
}

#[derive(Debug, FromQueryResult)]
struct OwnedTable {
    table_name: String,
}

/// [`IsolationStore`] over the tenant-owned tables of the property schema.
#[derive(Debug, Clone)]
pub struct PgIsolationStore {
    admin: DatabaseConnection,
    app: DatabaseConnection,
    app_role: Option<String>,
    context_setting: String,
    query_timeout: Duration,
}

impl PgIsolationStore {
    /// Creates a store. `admin` writes fixtures; `app` runs probe queries.
    /// Both may be the same pool when a probe role is configured.
    #[must_use]
    pub fn new(
        admin: DatabaseConnection,
        app: DatabaseConnection,
        config: &DatabaseConfig,
    ) -> Self {
        Self {
            admin,
            app,
            app_role: config.app_role.clone(),
            context_setting: config.context_setting.clone(),
            query_timeout: config.query_timeout(),
        }
    }

    /// Units of a property, resolved with administrative rights so the probe
    /// does not depend on the `units` policy being correct.
    async fn unit_ids(&self, property_id: Uuid) -> Result<Vec<Uuid>, DbErr> {
        units::Entity::find()
            .select_only()
            .column(units::Column::Id)
            .filter(units::Column::PropertyId.eq(property_id))
            .into_tuple::<Uuid>()
            .all(&self.admin)
            .await
    }

    async fn count_in(&self, conn: &TenantConnection, query: ProbeQuery) -> Result<u64, DbErr> {
        let txn = conn.transaction();
        match query {
            ProbeQuery::PropertyById(id) => {
                properties::Entity::find()
                    .filter(properties::Column::Id.eq(id))
                    .count(txn)
                    .await
            }
            ProbeQuery::UnitsOfProperty(property_id) => {
                units::Entity::find()
                    .filter(units::Column::PropertyId.eq(property_id))
                    .count(txn)
                    .await
            }
            ProbeQuery::LeasesOfProperty(property_id) => {
                let unit_ids = self.unit_ids(property_id).await?;
                leases::Entity::find()
                    .filter(leases::Column::UnitId.is_in(unit_ids))
                    .count(txn)
                    .await
            }
            ProbeQuery::MaintenanceOfProperty(property_id) => {
                let unit_ids = self.unit_ids(property_id).await?;
                maintenance_requests::Entity::find()
                    .filter(maintenance_requests::Column::UnitId.is_in(unit_ids))
                    .count(txn)
                    .await
            }
            ProbeQuery::Visible(resource) => match resource {
                Resource::Property => properties::Entity::find().count(txn).await,
                Resource::Unit => units::Entity::find().count(txn).await,
                Resource::Lease => leases::Entity::find().count(txn).await,
                Resource::MaintenanceRequest => {
                    maintenance_requests::Entity::find().count(txn).await
                }
            },
            ProbeQuery::BooleanBypass(property_id) => {
                let row = CountRow::find_by_statement(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    BOOLEAN_BYPASS_SQL,
                    [property_id.into()],
                ))
                .one(txn)
                .await?;
                Ok(row.map_or(0, |row| u64::try_from(row.count).unwrap_or_default()))
            }
        }
    }

    async fn insert_row(
        &self,
        resource: Resource,
        id: Uuid,
        parent_id: Uuid,
        tag: String,
    ) -> Result<(), DbErr> {
        match resource {
            Resource::Property => {
                properties::ActiveModel {
                    id: Set(id),
                    owner_id: Set(parent_id),
                    name: Set(tag),
                    address: Set(None),
                    ..Default::default()
                }
                .insert(&self.admin)
                .await?;
            }
            Resource::Unit => {
                units::ActiveModel {
                    id: Set(id),
                    property_id: Set(parent_id),
                    label: Set(tag),
                    ..Default::default()
                }
                .insert(&self.admin)
                .await?;
            }
            Resource::Lease => {
                leases::ActiveModel {
                    id: Set(id),
                    unit_id: Set(parent_id),
                    reference: Set(tag),
                    ..Default::default()
                }
                .insert(&self.admin)
                .await?;
            }
            Resource::MaintenanceRequest => {
                maintenance_requests::ActiveModel {
                    id: Set(id),
                    unit_id: Set(parent_id),
                    title: Set(tag),
                    ..Default::default()
                }
                .insert(&self.admin)
                .await?;
            }
        }
        Ok(())
    }

    /// Why queries on `conn` would ignore row-level security, if they would.
    async fn bypass_reason(conn: &TenantConnection) -> Result<Option<String>, DbErr> {
        let txn = conn.transaction();
        let role = RolePrivileges::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            ROLE_PRIVILEGES_SQL,
        ))
        .one(txn)
        .await?;
        if let Some(role) = role {
            if role.superuser {
                return Ok(Some(format!("role '{}' is a superuser", role.role_name)));
            }
            if role.bypass_rls {
                return Ok(Some(format!("role '{}' has BYPASSRLS", role.role_name)));
            }
        }

        let owned: Vec<String> = OwnedTable::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            OWNED_UNFORCED_SQL,
        ))
        .all(txn)
        .await?
        .into_iter()
        .map(|row| row.table_name)
        .collect();
        if owned.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "probe role owns {} without FORCE ROW LEVEL SECURITY",
            owned.join(", ")
        )))
    }

    async fn sweep_in_txn(&self, prefix: &str) -> Result<u64, DbErr> {
        let txn = self.admin.begin().await?;
        let mut removed = maintenance_requests::Entity::delete_many()
            .filter(maintenance_requests::Column::Title.starts_with(prefix))
            .exec(&txn)
            .await?
            .rows_affected;
        removed += leases::Entity::delete_many()
            .filter(leases::Column::Reference.starts_with(prefix))
            .exec(&txn)
            .await?
            .rows_affected;
        removed += units::Entity::delete_many()
            .filter(units::Column::Label.starts_with(prefix))
            .exec(&txn)
            .await?
            .rows_affected;
        removed += properties::Entity::delete_many()
            .filter(properties::Column::Name.starts_with(prefix))
            .exec(&txn)
            .await?
            .rows_affected;
        removed += profiles::Entity::delete_many()
            .filter(profiles::Column::Email.starts_with(prefix))
            .exec(&txn)
            .await?
            .rows_affected;
        txn.commit().await?;
        Ok(removed)
    }
}

fn setup_err(err: DbErr) -> IsolationError {
    IsolationError::Setup(err.to_string())
}

fn teardown_err(err: DbErr) -> IsolationError {
    IsolationError::Teardown(err.to_string())
}

fn query_err(err: DbErr) -> IsolationError {
    IsolationError::Query(err.to_string())
}

/// Runs `call` under `limit`, mapping database errors with `on_err`.
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, DbErr>>,
    on_err: fn(DbErr) -> IsolationError,
) -> Result<T, IsolationError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(on_err),
        Err(_) => Err(IsolationError::Timeout(limit)),
    }
}

#[async_trait]
impl IsolationStore for PgIsolationStore {
    async fn create_identity(&self, label: &FixtureLabel) -> Result<Uuid, IsolationError> {
        let profile = profiles::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(label.email()),
            full_name: Set(label.to_string()),
            ..Default::default()
        };
        let created = bounded(self.query_timeout, profile.insert(&self.admin), setup_err).await?;
        debug!(id = %created.id, label = %label, "Created fixture identity");
        Ok(created.id)
    }

    async fn create_resource(
        &self,
        resource: Resource,
        parent_id: Uuid,
        label: &FixtureLabel,
    ) -> Result<Uuid, IsolationError> {
        let id = Uuid::new_v4();
        bounded(
            self.query_timeout,
            self.insert_row(resource, id, parent_id, label.to_string()),
            setup_err,
        )
        .await?;

        debug!(%resource, %id, "Created fixture row");
        Ok(id)
    }

    async fn enforcement_bypass(&self) -> Result<Option<String>, IsolationError> {
        let inspect = async {
            let conn = TenantConnection::begin(
                &self.app,
                self.app_role.as_deref(),
                &self.context_setting,
                None,
            )
            .await?;
            let result = Self::bypass_reason(&conn).await;
            conn.rollback().await?;
            result
        };
        bounded(self.query_timeout, inspect, query_err).await
    }

    async fn count(
        &self,
        context: ProbeContext,
        query: ProbeQuery,
    ) -> Result<u64, IsolationError> {
        let tenant = match context {
            ProbeContext::Tenant(id) => Some(id),
            ProbeContext::Anonymous => None,
        };

        let probe = async {
            let conn = TenantConnection::begin(
                &self.app,
                self.app_role.as_deref(),
                &self.context_setting,
                tenant,
            )
            .await?;
            let result = self.count_in(&conn, query).await;
            conn.rollback().await?;
            result
        };
        bounded(self.query_timeout, probe, query_err).await
    }

    async fn delete_resource(&self, resource: Resource, id: Uuid) -> Result<(), IsolationError> {
        let delete = async {
            match resource {
                Resource::Property => properties::Entity::delete_by_id(id).exec(&self.admin).await,
                Resource::Unit => units::Entity::delete_by_id(id).exec(&self.admin).await,
                Resource::Lease => leases::Entity::delete_by_id(id).exec(&self.admin).await,
                Resource::MaintenanceRequest => {
                    maintenance_requests::Entity::delete_by_id(id)
                        .exec(&self.admin)
                        .await
                }
            }
        };
        bounded(self.query_timeout, delete, teardown_err)
            .await
            .map(|_| ())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), IsolationError> {
        bounded(
            self.query_timeout,
            profiles::Entity::delete_by_id(id).exec(&self.admin),
            teardown_err,
        )
        .await
        .map(|_| ())
    }

    async fn sweep(&self, prefix: &str) -> Result<u64, IsolationError> {
        let removed = bounded(self.query_timeout, self.sweep_in_txn(prefix), teardown_err).await?;
        if removed > 0 {
            info!(removed, prefix, "Swept fixture rows");
        }
        Ok(removed)
    }
}
