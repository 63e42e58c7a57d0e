use super::verify_support_objects;
use crate::classification::{Registry, Tier, classify};
use crate::finding::{Finding, FindingCode, FindingLevel};
use crate::testing::InMemoryCatalog;

async fn verify(catalog: &InMemoryCatalog) -> Vec<Finding> {
    let registry = Registry::property_management();
    let tables: Vec<String> = registry.mapped(Tier::Critical).map(str::to_string).collect();
    let classification = classify(&registry, &tables);
    verify_support_objects(
        catalog,
        registry.helper_functions(),
        registry.required_indexes(),
        &classification,
    )
    .await
}

fn codes(findings: &[Finding], code: FindingCode) -> usize {
    findings.iter().filter(|f| f.code == code).count()
}

#[tokio::test]
async fn test_complete_schema_passes() {
    let registry = Registry::property_management();
    let findings = verify(&InMemoryCatalog::compliant(&registry)).await;

    assert!(findings.iter().all(|f| f.level == FindingLevel::Pass));
    assert_eq!(codes(&findings, FindingCode::HelperFunctionPresent), 3);
    assert_eq!(codes(&findings, FindingCode::IndexPresent), 7);
}

#[tokio::test]
async fn test_missing_helper_is_a_fail() {
    let registry = Registry::property_management();
    let catalog = InMemoryCatalog::compliant(&registry).without_function("user_owns_unit");

    let findings = verify(&catalog).await;

    let missing: Vec<_> = findings
        .iter()
        .filter(|f| f.code == FindingCode::HelperFunctionMissing)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].level, FindingLevel::Fail);
    assert!(missing[0].message.contains("user_owns_unit"));
}

#[tokio::test]
async fn test_missing_index_warns_and_sole_index_fails() {
    let registry = Registry::property_management();
    let catalog = InMemoryCatalog::compliant(&registry)
        .without_index("leases", "idx_leases_unit_id");

    let findings = verify(&catalog).await;

    let warn: Vec<_> = findings
        .iter()
        .filter(|f| f.code == FindingCode::IndexMissing)
        .collect();
    assert_eq!(warn.len(), 1);
    assert_eq!(warn[0].level, FindingLevel::Warn);
    assert_eq!(warn[0].table(), Some("leases"));

    let none_left: Vec<_> = findings
        .iter()
        .filter(|f| f.code == FindingCode::NoSupportingIndex)
        .collect();
    assert_eq!(none_left.len(), 1);
    assert!(none_left[0].is_critical_fail());
}

#[tokio::test]
async fn test_indexes_of_absent_tables_are_skipped() {
    let registry = Registry::property_management();
    let catalog = InMemoryCatalog::compliant(&registry);
    let classification = classify(&registry, &["properties".to_string()]);

    let findings = verify_support_objects(
        &catalog,
        &[],
        registry.required_indexes(),
        &classification,
    )
    .await;

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code, FindingCode::IndexPresent);
    assert_eq!(findings[0].table(), Some("properties"));
}

#[tokio::test]
async fn test_unreachable_catalog_yields_single_error() {
    let findings = verify(&InMemoryCatalog::new().unreachable()).await;

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].level, FindingLevel::Error);
    assert_eq!(findings[0].code, FindingCode::CatalogUnavailable);
}

#[tokio::test]
async fn test_query_error_is_not_reported_as_missing() {
    let registry = Registry::property_management();
    let catalog = InMemoryCatalog::compliant(&registry).with_broken_table("documents");

    let findings = verify(&catalog).await;

    assert_eq!(codes(&findings, FindingCode::IndexMissing), 0);
    assert_eq!(codes(&findings, FindingCode::NoSupportingIndex), 0);
    let errors: Vec<_> = findings
        .iter()
        .filter(|f| f.level == FindingLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("could not determine"));
}
