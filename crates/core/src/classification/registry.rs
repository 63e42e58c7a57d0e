//! Static security registry for the property-management schema.
//!
//! The tier map, required policy coverage, helper functions, and indexes are
//! fixed configuration. Anything the schema contains beyond the tier map is
//! classified as [`Tier::Unclassified`] at run time.

use crate::catalog::Operation;

use super::types::Tier;

/// Index a policy predicate relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredIndex {
    /// Table carrying the index.
    pub table: &'static str,
    /// Indexed column.
    pub column: &'static str,
    /// Expected index name.
    pub index_name: &'static str,
}

const TIER_MAP: &[(&str, Tier)] = &[
    ("properties", Tier::Critical),
    ("units", Tier::Critical),
    ("tenants", Tier::Critical),
    ("leases", Tier::Critical),
    ("maintenance_requests", Tier::Critical),
    ("rent_payments", Tier::Critical),
    ("documents", Tier::Critical),
    ("profiles", Tier::High),
    ("expenses", Tier::High),
    ("notifications", Tier::High),
    ("messages", Tier::High),
    ("property_photos", Tier::Medium),
    ("activity_log", Tier::Medium),
    ("feature_flags", Tier::Low),
    ("app_settings", Tier::Low),
];

const HELPER_FUNCTIONS: &[&str] = &["current_user_id", "user_owns_property", "user_owns_unit"];

const INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        table: "properties",
        column: "owner_id",
        index_name: "idx_properties_owner_id",
    },
    RequiredIndex {
        table: "units",
        column: "property_id",
        index_name: "idx_units_property_id",
    },
    RequiredIndex {
        table: "tenants",
        column: "property_id",
        index_name: "idx_tenants_property_id",
    },
    RequiredIndex {
        table: "leases",
        column: "unit_id",
        index_name: "idx_leases_unit_id",
    },
    RequiredIndex {
        table: "maintenance_requests",
        column: "unit_id",
        index_name: "idx_maintenance_requests_unit_id",
    },
    RequiredIndex {
        table: "rent_payments",
        column: "lease_id",
        index_name: "idx_rent_payments_lease_id",
    },
    RequiredIndex {
        table: "documents",
        column: "property_id",
        index_name: "idx_documents_property_id",
    },
];

/// Substrings that show a predicate is scoped to the caller's identity.
const USER_CONTEXT_MARKERS: &[&str] = &[
    "auth.uid()",
    "current_user_id(",
    "current_setting('app.current_user_id'",
    "user_owns_",
];

const HIGH_TIER_OPERATIONS: &[Operation] = &[Operation::Select];

/// The security registry consulted by every component.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    tiers: &'static [(&'static str, Tier)],
    functions: &'static [&'static str],
    indexes: &'static [RequiredIndex],
    context_markers: &'static [&'static str],
}

impl Default for Registry {
    fn default() -> Self {
        Self::property_management()
    }
}

impl Registry {
    /// Registry for the property-management schema.
    #[must_use]
    pub const fn property_management() -> Self {
        Self {
            tiers: TIER_MAP,
            functions: HELPER_FUNCTIONS,
            indexes: INDEXES,
            context_markers: USER_CONTEXT_MARKERS,
        }
    }

    /// Tier of a mapped table.
    #[must_use]
    pub fn tier_for(&self, table: &str) -> Option<Tier> {
        self.tiers
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, tier)| *tier)
    }

    /// Mapped tables of a tier.
    pub fn mapped(&self, tier: Tier) -> impl Iterator<Item = &'static str> {
        self.tiers
            .iter()
            .filter(move |(_, t)| *t == tier)
            .map(|(name, _)| *name)
    }

    /// Minimum policy coverage for a table of the given tier.
    #[must_use]
    pub const fn required_operations(&self, tier: Tier) -> &'static [Operation] {
        match tier {
            Tier::Critical => &Operation::ALL,
            Tier::High => HIGH_TIER_OPERATIONS,
            Tier::Medium | Tier::Low | Tier::Unclassified => &[],
        }
    }

    /// Helper functions policy predicates call.
    #[must_use]
    pub const fn helper_functions(&self) -> &'static [&'static str] {
        self.functions
    }

    /// Indexes policy predicates rely on.
    #[must_use]
    pub const fn required_indexes(&self) -> &'static [RequiredIndex] {
        self.indexes
    }

    /// Markers of identity-scoped predicates.
    #[must_use]
    pub const fn context_markers(&self) -> &'static [&'static str] {
        self.context_markers
    }
}
