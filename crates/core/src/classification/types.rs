//! Classification data types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::finding::Finding;

/// Sensitivity tier of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Tenant-owned business data; isolation is mandatory.
    Critical,
    /// Per-user data; enforcement expected.
    High,
    /// Shared or derived data.
    Medium,
    /// Configuration and reference data.
    Low,
    /// Not in the tier map; needs a manual decision.
    Unclassified,
}

impl Tier {
    /// Whether the policy inspector audits tables of this tier.
    #[must_use]
    pub const fn is_audited(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }

    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier assigned to one table for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableClassification {
    /// Table name.
    pub table_name: String,
    /// Assigned tier.
    pub tier: Tier,
}

/// Output of [`classify`](super::classify).
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Classified tables, sorted by name.
    pub tables: Vec<TableClassification>,
    /// Findings raised while classifying.
    pub findings: Vec<Finding>,
}

impl Classification {
    /// Tables of the given tier.
    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &TableClassification> {
        self.tables.iter().filter(move |t| t.tier == tier)
    }

    /// Tier of a table, if it was discovered.
    #[must_use]
    pub fn tier_of(&self, table: &str) -> Option<Tier> {
        self.tables
            .iter()
            .find(|t| t.table_name == table)
            .map(|t| t.tier)
    }
}
