//! Lifecycle and assertion tests for the isolation prober.

use std::time::Duration;

use tokio::time::Instant;

use super::prober::probe_isolation;
use super::types::{FIXTURE_PREFIX, FixtureLabel, Resource};
use crate::finding::{Finding, FindingCode, FindingLevel};
use crate::testing::{IDENTITY_KIND, InMemoryIsolationStore};

fn with_code(findings: &[Finding], code: FindingCode) -> Vec<&Finding> {
    findings.iter().filter(|f| f.code == code).collect()
}

#[tokio::test]
async fn test_isolated_store_passes_every_resource() {
    let store = InMemoryIsolationStore::new();

    let findings = probe_isolation(&store, None).await;

    assert!(
        findings.iter().all(|f| f.level == FindingLevel::Pass),
        "unexpected findings: {findings:#?}"
    );
    let verified: Vec<_> = with_code(&findings, FindingCode::IsolationVerified)
        .iter()
        .map(|f| f.table().unwrap().to_string())
        .collect();
    assert_eq!(
        verified,
        vec!["properties", "units", "leases", "maintenance_requests"]
    );
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_lease_leak_is_a_critical_fail_on_leases() {
    let store = InMemoryIsolationStore::new().leaking(Resource::Lease);

    let findings = probe_isolation(&store, None).await;

    let leaks = with_code(&findings, FindingCode::CrossTenantLeak);
    assert_eq!(leaks.len(), 2, "both directions leak");
    assert!(leaks.iter().all(|f| f.table() == Some("leases")));
    assert!(leaks.iter().all(|f| f.is_critical_fail()));
    assert!(
        !with_code(&findings, FindingCode::IsolationVerified)
            .iter()
            .any(|f| f.table() == Some("leases"))
    );
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_anonymous_visibility_is_reported_per_table() {
    let store = InMemoryIsolationStore::new().anonymous_sees_all();

    let findings = probe_isolation(&store, None).await;

    let anonymous = with_code(&findings, FindingCode::AnonymousAccess);
    assert_eq!(anonymous.len(), 4);
    assert!(anonymous.iter().all(|f| f.level == FindingLevel::Fail));
}

#[tokio::test]
async fn test_boolean_bypass_is_detected() {
    let store = InMemoryIsolationStore::new().bypassable();

    let findings = probe_isolation(&store, None).await;

    let bypass = with_code(&findings, FindingCode::BooleanBypass);
    assert_eq!(bypass.len(), 1);
    assert_eq!(bypass[0].table(), Some("properties"));
    assert!(bypass[0].message.contains("got 2"));
}

#[tokio::test]
async fn test_teardown_runs_in_reverse_dependency_order() {
    let store = InMemoryIsolationStore::new();

    probe_isolation(&store, None).await;

    let deletions = store.deletions();
    let expected: Vec<String> = [
        "maintenance_requests",
        "maintenance_requests",
        "leases",
        "leases",
        "units",
        "units",
        "properties",
        "properties",
        IDENTITY_KIND,
        IDENTITY_KIND,
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();
    assert_eq!(deletions, expected);
}

#[tokio::test]
async fn test_setup_failure_still_tears_down_partial_graph() {
    let store = InMemoryIsolationStore::new().failing_create(Resource::Lease);

    let findings = probe_isolation(&store, None).await;

    let setup = with_code(&findings, FindingCode::FixtureSetupFailed);
    assert_eq!(setup.len(), 1);
    assert_eq!(setup[0].level, FindingLevel::Error);
    assert!(with_code(&findings, FindingCode::IsolationVerified).is_empty());
    assert_eq!(store.deletions(), vec!["units", "properties", IDENTITY_KIND]);
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_panicking_assertion_still_tears_down() {
    let store = InMemoryIsolationStore::new().panicking_count();

    let findings = probe_isolation(&store, None).await;

    assert_eq!(with_code(&findings, FindingCode::ProbeFailed).len(), 1);
    assert_eq!(store.deletions().len(), 10);
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_partial_teardown_warns_and_sweep_heals() {
    let store = InMemoryIsolationStore::new().failing_delete(Resource::Unit, 1);

    let findings = probe_isolation(&store, None).await;

    let cleanup = with_code(&findings, FindingCode::FixtureCleanupIncomplete);
    assert_eq!(cleanup.len(), 1);
    assert_eq!(cleanup[0].level, FindingLevel::Warn);
    assert!(cleanup[0].message.contains("manual review required"));

    let swept = with_code(&findings, FindingCode::FixturesSwept);
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].details.as_ref().unwrap()["phase"], "after_teardown");
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_leftovers_from_interrupted_run_are_swept_first() {
    let store = InMemoryIsolationStore::new();
    let seeded = store.seed_leftover(&FixtureLabel::new("deadbeef0000", 'a'));

    let findings = probe_isolation(&store, None).await;

    let swept = with_code(&findings, FindingCode::FixturesSwept);
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].details.as_ref().unwrap()["removed"], seeded);
    assert_eq!(swept[0].details.as_ref().unwrap()["phase"], "before_setup");
    // Leftovers must not skew own-row counts.
    assert!(with_code(&findings, FindingCode::OwnDataMismatch).is_empty());
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_two_runs_leave_nothing_behind() {
    let store = InMemoryIsolationStore::new().failing_delete(Resource::Property, 2);

    probe_isolation(&store, None).await;
    let second = probe_isolation(&store, None).await;

    assert_eq!(store.residual(), 0);
    assert!(with_code(&second, FindingCode::FixtureCleanupIncomplete).is_empty());
}

#[tokio::test]
async fn test_failed_sweep_is_a_warning_not_a_failure() {
    let store = InMemoryIsolationStore::new().failing_sweep();

    let findings = probe_isolation(&store, None).await;

    let cleanup = with_code(&findings, FindingCode::FixtureCleanupIncomplete);
    assert_eq!(cleanup.len(), 2);
    assert!(cleanup.iter().all(|f| f.level == FindingLevel::Warn));
    assert_eq!(with_code(&findings, FindingCode::IsolationVerified).len(), 4);
    assert_eq!(store.residual(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_aborts_assertions_but_not_teardown() {
    let store = InMemoryIsolationStore::new().slow_count(Duration::from_secs(1));
    let deadline = Instant::now() + Duration::from_millis(3500);

    let findings = probe_isolation(&store, Some(deadline)).await;

    let budget = with_code(&findings, FindingCode::RunBudgetExceeded);
    assert_eq!(budget.len(), 1);
    assert_eq!(budget[0].level, FindingLevel::Error);
    assert_eq!(budget[0].details.as_ref().unwrap()["completed"], 3);
    assert_eq!(store.residual(), 0);
}

#[tokio::test]
async fn test_superuser_context_is_an_error_not_a_leak() {
    let store = InMemoryIsolationStore::new()
        .leaking(Resource::Property)
        .anonymous_sees_all()
        .bypassing_enforcement("role 'postgres' is a superuser");

    let findings = probe_isolation(&store, None).await;

    assert_eq!(findings.len(), 1, "unexpected findings: {findings:#?}");
    assert_eq!(findings[0].code, FindingCode::ProbeContextBypassesRls);
    assert_eq!(findings[0].level, FindingLevel::Error);
    assert!(findings[0].message.contains("probe context bypasses RLS"));
    assert!(findings[0].message.contains("superuser"));
    assert!(store.deletions().is_empty(), "no fixtures were created");
    assert_eq!(store.residual(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_fixture_writes_time_out() {
    let store = InMemoryIsolationStore::new()
        .slow_writes(Duration::from_secs(600))
        .with_call_timeout(Duration::from_secs(2));
    let started = Instant::now();

    let findings = probe_isolation(&store, None).await;

    let setup = with_code(&findings, FindingCode::FixtureSetupFailed);
    assert_eq!(setup.len(), 1);
    assert!(setup[0].message.contains("timed out"));
    assert!(with_code(&findings, FindingCode::IsolationVerified).is_empty());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_fixture_labels_are_greppable() {
    let label = FixtureLabel::new("abc123", 'b');
    assert_eq!(label.as_str(), "rlsguard-probe-abc123-b");
    assert!(label.email().starts_with(FIXTURE_PREFIX));
    assert!(label.email().ends_with("@rlsguard.invalid"));
    assert!(!FIXTURE_PREFIX.contains(['%', '_']));
}
