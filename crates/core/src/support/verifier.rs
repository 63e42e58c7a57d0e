//! Helper/index verifier.
//!
//! Missing helpers are FAIL: policies calling them error out or match
//! nothing. Missing indexes are WARN, except that a Critical table with none
//! of its supporting indexes present is a FAIL.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::{info, warn};

use crate::catalog::{CatalogError, SchemaCatalog, TableName};
use crate::classification::{Classification, RequiredIndex, Tier};
use crate::finding::{Finding, FindingCode, Subject};

/// Checks that every helper function and supporting index exists.
///
/// Indexes on tables absent from the classification are skipped; the
/// classifier already reports absent Critical tables. A connectivity failure
/// ends the component with one [`FindingCode::CatalogUnavailable`] ERROR.
pub async fn verify_support_objects(
    catalog: &dyn SchemaCatalog,
    required_functions: &[&str],
    required_indexes: &[RequiredIndex],
    classification: &Classification,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Err(err) = verify_functions(catalog, required_functions, &mut findings).await {
        findings.push(unavailable(&err));
        return findings;
    }
    if let Err(err) =
        verify_indexes(catalog, required_indexes, classification, &mut findings).await
    {
        findings.push(unavailable(&err));
        return findings;
    }

    info!(findings = findings.len(), "Support object verification complete");
    findings
}

fn unavailable(err: &CatalogError) -> Finding {
    warn!(error = %err, "Catalog unavailable during support object verification");
    Finding::error(
        FindingCode::CatalogUnavailable,
        format!("helper/index verification aborted, catalog unavailable: {err}"),
    )
}

async fn verify_functions(
    catalog: &dyn SchemaCatalog,
    required: &[&str],
    findings: &mut Vec<Finding>,
) -> Result<(), CatalogError> {
    for name in required {
        match catalog.function_exists(name).await {
            Ok(true) => findings.push(Finding::pass(
                FindingCode::HelperFunctionPresent,
                format!("helper function '{name}' exists"),
            )),
            Ok(false) => findings.push(
                Finding::fail(
                    FindingCode::HelperFunctionMissing,
                    format!("helper function '{name}' is missing; policies calling it cannot scope rows"),
                )
                .with_details(json!({ "function": name })),
            ),
            Err(err) if err.is_connectivity() => return Err(err),
            Err(err) => findings.push(
                Finding::error(
                    FindingCode::CatalogUnavailable,
                    format!("could not determine whether helper function '{name}' exists: {err}"),
                )
                .with_details(json!({ "function": name })),
            ),
        }
    }
    Ok(())
}

#[derive(Default)]
struct IndexTally {
    required: usize,
    confirmed_missing: usize,
}

async fn verify_indexes(
    catalog: &dyn SchemaCatalog,
    required: &[RequiredIndex],
    classification: &Classification,
    findings: &mut Vec<Finding>,
) -> Result<(), CatalogError> {
    let mut tallies: BTreeMap<&str, IndexTally> = BTreeMap::new();

    for index in required {
        let Some(tier) = classification.tier_of(index.table) else {
            continue;
        };
        let table = TableName::parse(index.table)?;
        let subject = Subject::table(index.table, tier);
        let details = json!({
            "table": index.table,
            "column": index.column,
            "index": index.index_name,
        });
        let tally = tallies.entry(index.table).or_default();
        tally.required += 1;

        match catalog.index_exists(&table, index.index_name).await {
            Ok(true) => findings.push(
                Finding::pass(
                    FindingCode::IndexPresent,
                    format!("index '{}' exists on '{}'", index.index_name, index.table),
                )
                .with_subject(subject),
            ),
            Ok(false) => {
                tally.confirmed_missing += 1;
                findings.push(
                    Finding::warn(
                        FindingCode::IndexMissing,
                        format!(
                            "index '{}' on {}({}) is missing",
                            index.index_name, index.table, index.column
                        ),
                    )
                    .with_subject(subject)
                    .with_details(details),
                );
            }
            Err(err) if err.is_connectivity() => return Err(err),
            Err(err) => findings.push(
                Finding::error(
                    FindingCode::CatalogUnavailable,
                    format!(
                        "could not determine whether index '{}' exists: {err}",
                        index.index_name
                    ),
                )
                .with_subject(subject)
                .with_details(details),
            ),
        }
    }

    for (table, tally) in tallies {
        let critical = classification.tier_of(table) == Some(Tier::Critical);
        if critical && tally.required > 0 && tally.confirmed_missing == tally.required {
            findings.push(
                Finding::fail(
                    FindingCode::NoSupportingIndex,
                    format!("critical table '{table}' has no supporting index for its policies"),
                )
                .with_subject(Subject::table(table, Tier::Critical)),
            );
        }
    }

    Ok(())
}
