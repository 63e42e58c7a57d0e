//! Tenant-context connections.
//!
//! Probe queries must see the database the way an end user's session does.
//! A [`TenantConnection`] opens a transaction, optionally drops to a
//! non-privileged role, and sets the session variable the row-level policies
//! read the caller's identity from. Everything is `LOCAL` to the transaction,
//! and the transaction is always rolled back, so nothing leaks into the pool.
//!
//! # Usage
//!
//! ```ignore
//! use rlsguard_db::rls::TenantConnection;
//!
//! let conn = TenantConnection::begin(&db, Some("rlsguard_app"), "app.current_user_id", Some(tenant_id)).await?;
//! let visible = properties::Entity::find().count(conn.transaction()).await?;
//! conn.rollback().await?;
//! ```

use rlsguard_shared::config::{is_plain_identifier, is_setting_name};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, Statement,
    TransactionTrait,
};
use uuid::Uuid;

/// A transaction scoped to one tenant identity, or to none.
pub struct TenantConnection {
    txn: DatabaseTransaction,
}

impl TenantConnection {
    /// Begins a transaction carrying `tenant` in the `setting` session
    /// variable. `None` clears the variable, simulating a request whose
    /// identity was never propagated.
    ///
    /// `role` must be a plain identifier; `SET ROLE` cannot take a bind
    /// parameter, so it is validated here before being spliced in.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started, the role or
    /// setting name is invalid, or either statement fails.
    pub async fn begin(
        db: &DatabaseConnection,
        role: Option<&str>,
        setting: &str,
        tenant: Option<Uuid>,
    ) -> Result<Self, DbErr> {
        if !is_setting_name(setting) {
            return Err(DbErr::Custom(format!("invalid context setting '{setting}'")));
        }
        if let Some(role) = role {
            if !is_plain_identifier(role) {
                return Err(DbErr::Custom(format!("invalid role name '{role}'")));
            }
        }

        let txn = db.begin().await?;

        if let Some(role) = role {
            txn.execute_unprepared(&format!("SET LOCAL ROLE {role}"))
                .await?;
        }

        let value = tenant.map(|id| id.to_string()).unwrap_or_default();
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT set_config($1, $2, true)",
            [setting.into(), value.into()],
        ))
        .await?;

        Ok(Self { txn })
    }

    /// Returns the transaction to run probe queries on.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Rolls back the transaction, discarding the role and context.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}
