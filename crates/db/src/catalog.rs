//! Postgres system-catalog reader.
//!
//! All queries are read-only, restricted to the `public` schema, and bind
//! table and object names as parameters. Each read runs under the configured
//! query timeout and is retried at most once, and only when the failure
//! looks like a connectivity problem.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rlsguard_core::catalog::{
    CatalogError, PolicyCommand, PolicyRecord, SchemaCatalog, TableName,
};
use rlsguard_shared::DatabaseConfig;
use sea_orm::{DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement, Value};
use tracing::{debug, warn};

const LIST_TABLES_SQL: &str = r"
SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
ORDER BY table_name
";

const RLS_ENABLED_SQL: &str = r"
SELECT c.relrowsecurity AS enabled
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = 'public' AND c.relname = $1 AND c.relkind IN ('r', 'p')
";

const POLICIES_SQL: &str = r"
SELECT tablename::text AS table_name,
       policyname::text AS policy_name,
       cmd::text AS command,
       qual::text AS predicate,
       with_check::text AS check_expr
FROM pg_policies
WHERE schemaname = 'public' AND tablename = $1
ORDER BY policyname
";

const FUNCTION_EXISTS_SQL: &str = r"
SELECT EXISTS (
    SELECT 1 FROM pg_proc p
    JOIN pg_namespace n ON n.oid = p.pronamespace
    WHERE n.nspname = 'public' AND p.proname = $1
) AS present
";

const INDEX_EXISTS_SQL: &str = r"
SELECT EXISTS (
    SELECT 1 FROM pg_indexes
    WHERE schemaname = 'public' AND tablename = $1 AND indexname = $2
) AS present
";

#[derive(Debug, FromQueryResult)]
struct TableRow {
    table_name: String,
}

#[derive(Debug, FromQueryResult)]
struct EnabledRow {
    enabled: bool,
}

#[derive(Debug, FromQueryResult)]
struct PolicyRow {
    table_name: String,
    policy_name: String,
    command: String,
    predicate: Option<String>,
    check_expr: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct PresentRow {
    present: bool,
}

/// [`SchemaCatalog`] backed by the Postgres system catalogs.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    db: DatabaseConnection,
    query_timeout: Duration,
    retries: u32,
}

impl PgCatalog {
    /// Creates a catalog reader over the administrative connection.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: &DatabaseConfig) -> Self {
        Self {
            db,
            query_timeout: config.query_timeout(),
            retries: config.read_retries.min(1),
        }
    }

    fn statement(sql: &str, values: impl IntoIterator<Item = Value>) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    async fn read<T, F, Fut>(&self, what: &str, op: F) -> Result<T, CatalogError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, DbErr>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.query_timeout, op()).await {
                Ok(result) => result.map_err(map_db_err),
                Err(_) => Err(CatalogError::Timeout(self.query_timeout)),
            };
            match result {
                Err(err) if err.is_connectivity() && attempt < self.retries => {
                    attempt += 1;
                    warn!(query = what, error = %err, attempt, "Catalog read failed, retrying");
                }
                other => return other,
            }
        }
    }
}

/// Connection-level failures become [`CatalogError::Unreachable`]; anything
/// else is a query failure.
fn map_db_err(err: DbErr) -> CatalogError {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => CatalogError::Unreachable(err.to_string()),
        other => CatalogError::Query(other.to_string()),
    }
}

#[async_trait]
impl SchemaCatalog for PgCatalog {
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        let rows = self
            .read("list_tables", || {
                TableRow::find_by_statement(Self::statement(LIST_TABLES_SQL, []))
                    .all(&self.db)
            })
            .await?;
        debug!(tables = rows.len(), "Listed public tables");
        Ok(rows.into_iter().map(|row| row.table_name).collect())
    }

    async fn rls_enabled(&self, table: &TableName) -> Result<Option<bool>, CatalogError> {
        let row = self
            .read("rls_enabled", || {
                EnabledRow::find_by_statement(Self::statement(
                    RLS_ENABLED_SQL,
                    [table.as_str().into()],
                ))
                .one(&self.db)
            })
            .await?;
        Ok(row.map(|row| row.enabled))
    }

    async fn policies(&self, table: &TableName) -> Result<Vec<PolicyRecord>, CatalogError> {
        let rows = self
            .read("policies", || {
                PolicyRow::find_by_statement(Self::statement(
                    POLICIES_SQL,
                    [table.as_str().into()],
                ))
                .all(&self.db)
            })
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PolicyRecord {
                    command: PolicyCommand::parse(&row.command)?,
                    table_name: row.table_name,
                    policy_name: row.policy_name,
                    predicate: row.predicate,
                    check: row.check_expr,
                })
            })
            .collect()
    }

    async fn function_exists(&self, name: &str) -> Result<bool, CatalogError> {
        let row = self
            .read("function_exists", || {
                PresentRow::find_by_statement(Self::statement(FUNCTION_EXISTS_SQL, [name.into()]))
                    .one(&self.db)
            })
            .await?;
        Ok(row.is_some_and(|row| row.present))
    }

    async fn index_exists(
        &self,
        table: &TableName,
        index_name: &str,
    ) -> Result<bool, CatalogError> {
        let row = self
            .read("index_exists", || {
                PresentRow::find_by_statement(Self::statement(
                    INDEX_EXISTS_SQL,
                    [table.as_str().into(), index_name.into()],
                ))
                .one(&self.db)
            })
            .await?;
        Ok(row.is_some_and(|row| row.present))
    }
}
