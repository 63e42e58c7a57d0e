//! Schema classifier.

use std::collections::BTreeSet;

use serde_json::json;
use tracing::debug;

use crate::catalog::TableName;
use crate::finding::{Finding, FindingCode, Subject};

use super::registry::Registry;
use super::types::{Classification, TableClassification, Tier};

/// Assigns a tier to every discovered table.
///
/// Input order and duplicates do not matter; output is sorted by name so the
/// same schema always classifies identically. Unmapped tables become
/// [`Tier::Unclassified`] with a WARN; names failing the identifier
/// allow-list get a WARN of their own and are never queried afterwards.
pub fn classify(registry: &Registry, table_names: &[String]) -> Classification {
    let names: BTreeSet<&str> = table_names.iter().map(String::as_str).collect();
    let mut tables = Vec::with_capacity(names.len());
    let mut findings = Vec::new();

    for name in &names {
        if TableName::parse(name).is_err() {
            findings.push(
                Finding::warn(
                    FindingCode::InvalidTableName,
                    format!("table '{name}' does not match the identifier allow-list and was not audited"),
                )
                .with_subject(Subject::table(*name, Tier::Unclassified)),
            );
            tables.push(TableClassification {
                table_name: (*name).to_string(),
                tier: Tier::Unclassified,
            });
            continue;
        }

        let tier = registry.tier_for(name).unwrap_or(Tier::Unclassified);
        if tier == Tier::Unclassified {
            findings.push(
                Finding::warn(
                    FindingCode::UnclassifiedTable,
                    format!("table '{name}' requires manual security classification"),
                )
                .with_subject(Subject::table(*name, Tier::Unclassified)),
            );
        }
        tables.push(TableClassification {
            table_name: (*name).to_string(),
            tier,
        });
    }

    for expected in registry.mapped(Tier::Critical) {
        if !names.contains(expected) {
            findings.push(
                Finding::info(
                    FindingCode::ExpectedTableAbsent,
                    format!("critical table '{expected}' is not present in the schema"),
                )
                .with_subject(Subject::table(expected, Tier::Critical)),
            );
        }
    }

    let count = |tier: Tier| tables.iter().filter(|t| t.tier == tier).count();
    let summary = json!({
        "critical": count(Tier::Critical),
        "high": count(Tier::High),
        "medium": count(Tier::Medium),
        "low": count(Tier::Low),
        "unclassified": count(Tier::Unclassified),
    });
    debug!(tables = tables.len(), %summary, "Classified schema");
    findings.insert(
        0,
        Finding::info(
            FindingCode::ClassificationSummary,
            format!("classified {} tables", tables.len()),
        )
        .with_details(summary),
    );

    Classification { tables, findings }
}
