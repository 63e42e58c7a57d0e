//! Isolation probe data types.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Prefix of every synthetic label and email. Sweeps match on it, so it must
/// not contain `LIKE` wildcards.
pub const FIXTURE_PREFIX: &str = "rlsguard-probe-";

/// Domain used for synthetic identity emails.
pub const FIXTURE_EMAIL_DOMAIN: &str = "rlsguard.invalid";

/// Tenant-owned resource exercised by the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Property, owned directly by a tenant identity.
    Property,
    /// Unit of a property.
    Unit,
    /// Lease on a unit.
    Lease,
    /// Maintenance request on a unit.
    MaintenanceRequest,
}

impl Resource {
    /// Every resource, in creation order.
    pub const ALL: [Self; 4] = [
        Self::Property,
        Self::Unit,
        Self::Lease,
        Self::MaintenanceRequest,
    ];

    /// Backing table.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Property => "properties",
            Self::Unit => "units",
            Self::Lease => "leases",
            Self::MaintenanceRequest => "maintenance_requests",
        }
    }

    /// Deletion rank; lower ranks are deleted first. Identities come after
    /// every resource.
    #[must_use]
    pub const fn teardown_rank(self) -> u8 {
        match self {
            Self::MaintenanceRequest => 0,
            Self::Lease => 1,
            Self::Unit => 2,
            Self::Property => 3,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Greppable label of one synthetic tenant's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLabel(String);

impl FixtureLabel {
    /// Label for `tenant` (`a` or `b`) of the run tagged `run_tag`.
    #[must_use]
    pub fn new(run_tag: &str, tenant: char) -> Self {
        Self(format!("{FIXTURE_PREFIX}{run_tag}-{tenant}"))
    }

    /// The label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Email of the synthetic identity.
    #[must_use]
    pub fn email(&self) -> String {
        format!("{}@{FIXTURE_EMAIL_DOMAIN}", self.0)
    }
}

impl fmt::Display for FixtureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object graph owned by one synthetic tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TenantGraph {
    /// Identity id.
    pub tenant_id: Uuid,
    /// Property id.
    pub property_id: Uuid,
    /// Unit id.
    pub unit_id: Uuid,
    /// Lease id.
    pub lease_id: Uuid,
    /// Maintenance request id.
    pub maintenance_request_id: Uuid,
}

impl TenantGraph {
    /// Id of the tenant's row of the given resource.
    #[must_use]
    pub const fn id_of(&self, resource: Resource) -> Uuid {
        match resource {
            Resource::Property => self.property_id,
            Resource::Unit => self.unit_id,
            Resource::Lease => self.lease_id,
            Resource::MaintenanceRequest => self.maintenance_request_id,
        }
    }
}

/// Fixtures of one probe batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsolationFixture {
    /// Tag shared by every label of the batch.
    pub run_tag: String,
    /// First tenant.
    pub tenant_a: TenantGraph,
    /// Second tenant.
    pub tenant_b: TenantGraph,
}

/// Identity a probe query runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeContext {
    /// Authenticated as the given tenant identity.
    Tenant(Uuid),
    /// No identity at all, as if context propagation were broken.
    Anonymous,
}

/// Probe queries, all returning a row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeQuery {
    /// `properties` by id.
    PropertyById(Uuid),
    /// `units` joined to the given property.
    UnitsOfProperty(Uuid),
    /// `leases` joined through units to the given property.
    LeasesOfProperty(Uuid),
    /// `maintenance_requests` joined through units to the given property.
    MaintenanceOfProperty(Uuid),
    /// Every visible row of a resource.
    Visible(Resource),
    /// `properties WHERE id = $1 OR 1=1`.
    BooleanBypass(Uuid),
}

impl ProbeQuery {
    /// Cross-tenant query for `resource` anchored on a property.
    #[must_use]
    pub const fn through_property(resource: Resource, property_id: Uuid) -> Self {
        match resource {
            Resource::Property => Self::PropertyById(property_id),
            Resource::Unit => Self::UnitsOfProperty(property_id),
            Resource::Lease => Self::LeasesOfProperty(property_id),
            Resource::MaintenanceRequest => Self::MaintenanceOfProperty(property_id),
        }
    }
}
