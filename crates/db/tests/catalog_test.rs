//! Integration tests for the Postgres catalog reader.
//!
//! Each test starts its own Postgres container with the reference schema.
//! Run with `cargo test -p rlsguard-db -- --ignored` on a host with Docker.

mod common;

use rlsguard_core::catalog::{PolicyCommand, SchemaCatalog, TableName};
use rlsguard_core::classification::{Registry, Tier, classify};
use rlsguard_core::finding::{FindingCode, FindingLevel};
use rlsguard_core::policy::inspect_policies;
use rlsguard_core::support::verify_support_objects;
use rlsguard_db::PgCatalog;
use sea_orm::ConnectionTrait;

fn table(name: &str) -> TableName {
    TableName::parse(name).expect("valid table name")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_lists_every_registry_table() {
    let test_db = common::start().await;
    let catalog = PgCatalog::new(test_db.db.clone(), &test_db.config);

    let tables = catalog.list_tables().await.expect("list tables");

    let registry = Registry::property_management();
    for tier in [Tier::Critical, Tier::High, Tier::Medium, Tier::Low] {
        for name in registry.mapped(tier) {
            assert!(tables.iter().any(|t| t == name), "missing {name}");
        }
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reads_enforcement_flags() {
    let test_db = common::start().await;
    let catalog = PgCatalog::new(test_db.db.clone(), &test_db.config);

    assert_eq!(catalog.rls_enabled(&table("leases")).await.unwrap(), Some(true));
    assert_eq!(
        catalog.rls_enabled(&table("feature_flags")).await.unwrap(),
        Some(false)
    );
    assert_eq!(catalog.rls_enabled(&table("no_such_table")).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reads_policy_commands_and_predicates() {
    let test_db = common::start().await;
    let catalog = PgCatalog::new(test_db.db.clone(), &test_db.config);

    let messages = catalog.policies(&table("messages")).await.unwrap();
    let commands: Vec<_> = messages.iter().map(|p| p.command).collect();
    assert_eq!(commands, vec![PolicyCommand::Select, PolicyCommand::Insert]);

    let sender = &messages[1];
    assert!(sender.predicate.is_none());
    assert!(sender.effective_predicate().unwrap().contains("current_user_id()"));

    let rent = catalog.policies(&table("rent_payments")).await.unwrap();
    assert_eq!(rent.len(), 1);
    assert!(rent[0].predicate.as_deref().unwrap().contains("user_owns_unit"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reads_functions_and_indexes() {
    let test_db = common::start().await;
    let catalog = PgCatalog::new(test_db.db.clone(), &test_db.config);

    assert!(catalog.function_exists("user_owns_property").await.unwrap());
    assert!(!catalog.function_exists("user_owns_lease").await.unwrap());
    assert!(
        catalog
            .index_exists(&table("units"), "idx_units_property_id")
            .await
            .unwrap()
    );
    assert!(
        !catalog
            .index_exists(&table("units"), "idx_units_label")
            .await
            .unwrap()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reference_schema_has_no_static_failures() {
    let test_db = common::start().await;
    let catalog = PgCatalog::new(test_db.db.clone(), &test_db.config);
    let registry = Registry::property_management();

    let tables = catalog.list_tables().await.unwrap();
    let classification = classify(&registry, &tables);
    let mut findings = inspect_policies(&catalog, &registry, &classification.tables).await;
    findings.extend(
        verify_support_objects(
            &catalog,
            registry.helper_functions(),
            registry.required_indexes(),
            &classification,
        )
        .await,
    );

    let problems: Vec<_> = findings
        .iter()
        .filter(|f| matches!(f.level, FindingLevel::Fail | FindingLevel::Error))
        .collect();
    assert!(problems.is_empty(), "unexpected findings: {problems:#?}");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_disabled_enforcement_is_detected() {
    let test_db = common::start().await;
    test_db
        .db
        .execute_unprepared("ALTER TABLE leases DISABLE ROW LEVEL SECURITY")
        .await
        .unwrap();
    let catalog = PgCatalog::new(test_db.db.clone(), &test_db.config);
    let registry = Registry::property_management();
    let classification = classify(&registry, &["leases".to_string()]);

    let findings = inspect_policies(&catalog, &registry, &classification.tables).await;

    assert!(
        findings
            .iter()
            .any(|f| f.code == FindingCode::RlsDisabled && f.is_critical_fail())
    );
}
