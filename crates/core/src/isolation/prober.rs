//! Isolation prober: setup, assertions, guaranteed teardown.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::json;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classification::Tier;
use crate::finding::{Finding, FindingCode, Subject};

use super::IsolationStore;
use super::error::IsolationError;
use super::types::{
    FIXTURE_PREFIX, FixtureLabel, IsolationFixture, ProbeContext, ProbeQuery, Resource,
    TenantGraph,
};

/// Runs one isolation batch and returns its findings.
///
/// Order is fixed: defensive sweep, probe-context check, setup, assertions,
/// teardown, defensive sweep. Teardown runs whatever happened before it,
/// including a setup failure halfway through the graph, a panicking
/// assertion, or the `deadline` expiring. The deadline bounds the
/// assertions only; every store call carries its own timeout.
///
/// When the probe context ignores row-level security, no fixtures are
/// created and a single ERROR replaces the assertions.
pub async fn probe_isolation(store: &dyn IsolationStore, deadline: Option<Instant>) -> Vec<Finding> {
    let mut findings = Vec::new();

    match store.sweep(FIXTURE_PREFIX).await {
        Ok(0) => {}
        Ok(removed) => {
            info!(removed, "Swept fixtures left by a previous run");
            findings.push(
                Finding::info(
                    FindingCode::FixturesSwept,
                    format!("removed {removed} leftover fixture rows from a previous run"),
                )
                .with_details(json!({ "removed": removed, "phase": "before_setup" })),
            );
        }
        Err(err) => {
            warn!(error = %err, "Pre-run fixture sweep failed");
            findings.push(cleanup_incomplete(&format!("pre-run sweep failed: {err}")));
        }
    }

    let run_tag = Uuid::new_v4().simple().to_string()[..12].to_string();
    let mut ledger = FixtureLedger::default();

    let context_error = match store.enforcement_bypass().await {
        Ok(None) => None,
        Ok(Some(reason)) => {
            error!(reason = %reason, "Probe context bypasses row-level security");
            Some(
                Finding::error(
                    FindingCode::ProbeContextBypassesRls,
                    format!(
                        "isolation could not be verified: probe context bypasses RLS ({reason})"
                    ),
                )
                .with_details(json!({ "reason": reason })),
            )
        }
        Err(err) => {
            warn!(error = %err, "Could not inspect the probe context");
            Some(Finding::error(
                FindingCode::ProbeFailed,
                format!(
                    "isolation could not be verified: could not determine whether the probe context bypasses RLS: {err}"
                ),
            ))
        }
    };

    let setup_result = match context_error {
        Some(finding) => {
            findings.push(finding);
            None
        }
        None => Some(setup(store, &run_tag, &mut ledger).await),
    };

    match setup_result {
        None => {}
        Some(Ok(fixture)) => {
            info!(run_tag = %fixture.run_tag, "Isolation fixtures created");
            let assertions = AssertUnwindSafe(run_assertions(store, &fixture, deadline))
                .catch_unwind()
                .await;
            match assertions {
                Ok(assertion_findings) => findings.extend(assertion_findings),
                Err(_) => {
                    error!(run_tag = %fixture.run_tag, "Isolation assertions panicked");
                    findings.push(Finding::error(
                        FindingCode::ProbeFailed,
                        "isolation assertions aborted unexpectedly; results are incomplete",
                    ));
                }
            }
        }
        Some(Err(err)) => {
            error!(error = %err, "Isolation fixture setup failed");
            findings.push(Finding::error(
                FindingCode::FixtureSetupFailed,
                format!("could not create isolation fixtures, isolation was not verified: {err}"),
            ));
        }
    }

    let teardown_clean = teardown(store, ledger, &mut findings).await;

    match store.sweep(FIXTURE_PREFIX).await {
        Ok(0) => {}
        Ok(removed) => {
            warn!(removed, "Defensive sweep removed fixture rows teardown missed");
            findings.push(
                Finding::info(
                    FindingCode::FixturesSwept,
                    format!("defensive sweep removed {removed} fixture rows teardown missed"),
                )
                .with_details(json!({ "removed": removed, "phase": "after_teardown" })),
            );
        }
        Err(err) if teardown_clean => {
            warn!(error = %err, "Post-run fixture sweep failed");
            findings.push(cleanup_incomplete(&format!("post-run sweep failed: {err}")));
        }
        Err(err) => warn!(error = %err, "Post-run fixture sweep failed"),
    }

    findings
}

/// A row the batch created, in creation order.
#[derive(Debug, Clone, Copy)]
enum FixtureRow {
    Identity(Uuid),
    Resource(Resource, Uuid),
}

impl FixtureRow {
    const fn rank(self) -> u8 {
        match self {
            Self::Resource(resource, _) => resource.teardown_rank(),
            Self::Identity(_) => u8::MAX,
        }
    }
}

#[derive(Debug, Default)]
struct FixtureLedger {
    rows: Vec<FixtureRow>,
}

async fn setup(
    store: &dyn IsolationStore,
    run_tag: &str,
    ledger: &mut FixtureLedger,
) -> Result<IsolationFixture, IsolationError> {
    let tenant_a = setup_tenant(store, &FixtureLabel::new(run_tag, 'a'), ledger).await?;
    let tenant_b = setup_tenant(store, &FixtureLabel::new(run_tag, 'b'), ledger).await?;

    Ok(IsolationFixture {
        run_tag: run_tag.to_string(),
        tenant_a,
        tenant_b,
    })
}

async fn setup_tenant(
    store: &dyn IsolationStore,
    label: &FixtureLabel,
    ledger: &mut FixtureLedger,
) -> Result<TenantGraph, IsolationError> {
    let tenant_id = store.create_identity(label).await?;
    ledger.rows.push(FixtureRow::Identity(tenant_id));

    let property_id = create(store, ledger, Resource::Property, tenant_id, label).await?;
    let unit_id = create(store, ledger, Resource::Unit, property_id, label).await?;
    let lease_id = create(store, ledger, Resource::Lease, unit_id, label).await?;
    let maintenance_request_id =
        create(store, ledger, Resource::MaintenanceRequest, unit_id, label).await?;

    Ok(TenantGraph {
        tenant_id,
        property_id,
        unit_id,
        lease_id,
        maintenance_request_id,
    })
}

async fn create(
    store: &dyn IsolationStore,
    ledger: &mut FixtureLedger,
    resource: Resource,
    parent_id: Uuid,
    label: &FixtureLabel,
) -> Result<Uuid, IsolationError> {
    let id = store.create_resource(resource, parent_id, label).await?;
    ledger.rows.push(FixtureRow::Resource(resource, id));
    Ok(id)
}

/// What a check expects the row count to be.
#[derive(Debug, Clone, Copy)]
enum Expect {
    /// Zero rows; anything else is a leak.
    Nothing,
    /// Exactly this many rows.
    Exactly(u64),
    /// At most this many rows.
    AtMost(u64),
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("no rows"),
            Self::Exactly(n) => write!(f, "exactly {n} rows"),
            Self::AtMost(n) => write!(f, "at most {n} rows"),
        }
    }
}

impl Expect {
    const fn holds(self, rows: u64) -> bool {
        match self {
            Self::Nothing => rows == 0,
            Self::Exactly(n) => rows == n,
            Self::AtMost(n) => rows <= n,
        }
    }
}

#[derive(Debug, Clone)]
struct Check {
    resource: Resource,
    context: ProbeContext,
    query: ProbeQuery,
    expect: Expect,
    code: FindingCode,
    description: String,
}

fn plan_checks(fixture: &IsolationFixture) -> Vec<Check> {
    let mut checks = Vec::new();
    let tenants = [
        ('A', &fixture.tenant_a, 'B', &fixture.tenant_b),
        ('B', &fixture.tenant_b, 'A', &fixture.tenant_a),
    ];

    for (viewer_name, viewer, owner_name, owner) in tenants {
        for resource in Resource::ALL {
            checks.push(Check {
                resource,
                context: ProbeContext::Tenant(viewer.tenant_id),
                query: ProbeQuery::through_property(resource, owner.property_id),
                expect: Expect::Nothing,
                code: FindingCode::CrossTenantLeak,
                description: format!(
                    "tenant {viewer_name} reading tenant {owner_name}'s {resource}"
                ),
            });
        }
    }

    for (name, tenant) in [('A', &fixture.tenant_a), ('B', &fixture.tenant_b)] {
        for resource in Resource::ALL {
            checks.push(Check {
                resource,
                context: ProbeContext::Tenant(tenant.tenant_id),
                query: ProbeQuery::Visible(resource),
                expect: Expect::Exactly(1),
                code: FindingCode::OwnDataMismatch,
                description: format!("tenant {name} reading its own {resource}"),
            });
        }
    }

    for resource in Resource::ALL {
        checks.push(Check {
            resource,
            context: ProbeContext::Anonymous,
            query: ProbeQuery::Visible(resource),
            expect: Expect::Nothing,
            code: FindingCode::AnonymousAccess,
            description: format!("query on {resource} without tenant context"),
        });
    }

    checks.push(Check {
        resource: Resource::Property,
        context: ProbeContext::Tenant(fixture.tenant_a.tenant_id),
        query: ProbeQuery::BooleanBypass(fixture.tenant_b.property_id),
        expect: Expect::AtMost(1),
        code: FindingCode::BooleanBypass,
        description: "tenant A querying properties with an OR 1=1 predicate".to_string(),
    });

    checks
}

async fn run_assertions(
    store: &dyn IsolationStore,
    fixture: &IsolationFixture,
    deadline: Option<Instant>,
) -> Vec<Finding> {
    let checks = plan_checks(fixture);
    let mut findings = Vec::new();
    let mut broken: Vec<Resource> = Vec::new();
    let mut completed = 0usize;

    for check in &checks {
        let outcome = match deadline {
            Some(at) => match timeout_at(at, store.count(check.context, check.query)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(completed, total = checks.len(), "Run budget exhausted during isolation probe");
                    findings.push(
                        Finding::error(
                            FindingCode::RunBudgetExceeded,
                            format!(
                                "run budget exceeded after {completed} of {} isolation checks; remaining checks skipped",
                                checks.len()
                            ),
                        )
                        .with_details(json!({ "completed": completed, "total": checks.len() })),
                    );
                    return findings;
                }
            },
            None => store.count(check.context, check.query).await,
        };
        completed += 1;

        let subject = Subject::table(check.resource.table(), Tier::Critical);
        match outcome {
            Ok(rows) if check.expect.holds(rows) => {}
            Ok(rows) => {
                if !broken.contains(&check.resource) {
                    broken.push(check.resource);
                }
                error!(check = %check.description, rows, "Isolation check failed");
                findings.push(
                    Finding::fail(
                        check.code,
                        format!("{}: expected {}, got {rows}", check.description, check.expect),
                    )
                    .with_subject(subject)
                    .with_details(json!({
                        "run_tag": fixture.run_tag,
                        "rows": rows,
                        "check": check.description,
                    })),
                );
            }
            Err(err) => {
                if !broken.contains(&check.resource) {
                    broken.push(check.resource);
                }
                warn!(check = %check.description, error = %err, "Isolation check could not run");
                findings.push(
                    Finding::error(
                        FindingCode::ProbeFailed,
                        format!("could not determine isolation for {}: {err}", check.description),
                    )
                    .with_subject(subject),
                );
            }
        }
    }

    for resource in Resource::ALL {
        if !broken.contains(&resource) {
            findings.push(
                Finding::pass(
                    FindingCode::IsolationVerified,
                    format!("no cross-tenant access to {resource}"),
                )
                .with_subject(Subject::table(resource.table(), Tier::Critical)),
            );
        }
    }

    findings
}

/// Deletes every ledger row, children before parents and identities last.
/// Returns whether every deletion succeeded.
async fn teardown(
    store: &dyn IsolationStore,
    mut ledger: FixtureLedger,
    findings: &mut Vec<Finding>,
) -> bool {
    ledger.rows.sort_by_key(|row| row.rank());
    let mut failures = Vec::new();

    for row in &ledger.rows {
        let result = match *row {
            FixtureRow::Resource(resource, id) => store
                .delete_resource(resource, id)
                .await
                .map_err(|e| (resource.table().to_string(), id, e)),
            FixtureRow::Identity(id) => store
                .delete_identity(id)
                .await
                .map_err(|e| ("identity".to_string(), id, e)),
        };
        if let Err((kind, id, err)) = result {
            error!(kind = %kind, %id, error = %err, "Fixture teardown step failed");
            failures.push(json!({ "kind": kind, "id": id, "error": err.to_string() }));
        }
    }

    if failures.is_empty() {
        info!(rows = ledger.rows.len(), "Isolation fixtures removed");
        return true;
    }

    findings.push(
        cleanup_incomplete(&format!("{} of {} rows not deleted", failures.len(), ledger.rows.len()))
            .with_details(json!({ "failures": failures })),
    );
    false
}

fn cleanup_incomplete(reason: &str) -> Finding {
    Finding::warn(
        FindingCode::FixtureCleanupIncomplete,
        format!("test fixture cleanup incomplete, manual review required ({reason})"),
    )
}
