//! Catalog data types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CatalogError;

/// A table name that passed the identifier allow-list.
///
/// Only `[a-z_][a-z0-9_]*` names of at most 63 bytes are accepted, which is
/// what unquoted Postgres identifiers fold to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Maximum identifier length Postgres keeps.
    pub const MAX_LEN: usize = 63;

    /// Validates a table name.
    pub fn parse(name: &str) -> Result<Self, CatalogError> {
        let mut chars = name.chars();
        let valid_first = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if valid_first && valid_rest && name.len() <= Self::MAX_LEN {
            Ok(Self(name.to_string()))
        } else {
            Err(CatalogError::InvalidIdentifier(name.to_string()))
        }
    }

    /// The validated name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Data operation a policy may cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// SELECT.
    Select,
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
}

impl Operation {
    /// All four operations.
    pub const ALL: [Self; 4] = [Self::Select, Self::Insert, Self::Update, Self::Delete];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyCommand {
    /// SELECT only.
    Select,
    /// INSERT only.
    Insert,
    /// UPDATE only.
    Update,
    /// DELETE only.
    Delete,
    /// Every command.
    All,
}

impl PolicyCommand {
    /// Parses the `cmd` column of `pg_policies` (`SELECT`, `ALL`, ...).
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Ok(Self::Select),
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "ALL" | "*" => Ok(Self::All),
            other => Err(CatalogError::Query(format!("unknown policy command '{other}'"))),
        }
    }

    /// Whether a policy with this command covers the operation.
    #[must_use]
    pub const fn covers(self, operation: Operation) -> bool {
        matches!(
            (self, operation),
            (Self::All, _)
                | (Self::Select, Operation::Select)
                | (Self::Insert, Operation::Insert)
                | (Self::Update, Operation::Update)
                | (Self::Delete, Operation::Delete)
        )
    }
}

/// A row of the policy catalog. Read-only; the engine never writes policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Table the policy is attached to.
    pub table_name: String,
    /// Policy name.
    pub policy_name: String,
    /// Command the policy applies to.
    pub command: PolicyCommand,
    /// `USING` expression.
    pub predicate: Option<String>,
    /// `WITH CHECK` expression.
    pub check: Option<String>,
}

impl PolicyRecord {
    /// Expression that decides which rows the policy admits.
    ///
    /// INSERT policies carry only a `WITH CHECK` clause, so that one is used
    /// when there is no `USING` clause.
    #[must_use]
    pub fn effective_predicate(&self) -> Option<&str> {
        self.predicate.as_deref().or(self.check.as_deref())
    }
}
