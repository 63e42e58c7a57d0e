//! Policy inspector.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, PolicyRecord, SchemaCatalog, TableName};
use crate::classification::{Registry, TableClassification, Tier};
use crate::finding::{Finding, FindingCode, FindingLevel, Subject};

use super::heuristics::{PredicateVerdict, assess_predicate};

/// Audits enforcement flags and policies of every Critical and High table.
/// Medium and Low tables get an INFO when enforcement is off; unclassified
/// tables are left to the classifier's warning.
///
/// A connectivity failure stops the component with a single
/// [`FindingCode::CatalogUnavailable`] ERROR; findings gathered before it are
/// kept. A failed query for one table yields an ERROR for that table only,
/// worded as "could not determine" so it is never mistaken for a confirmed
/// gap.
pub async fn inspect_policies(
    catalog: &dyn SchemaCatalog,
    registry: &Registry,
    tables: &[TableClassification],
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for table in tables.iter().filter(|t| t.tier != Tier::Unclassified) {
        let outcome = if table.tier.is_audited() {
            inspect_table(catalog, registry, table).await
        } else {
            note_unaudited(catalog, table).await
        };
        match outcome {
            Ok(table_findings) => findings.extend(table_findings),
            Err(err) if err.is_connectivity() => {
                warn!(error = %err, table = %table.table_name, "Policy catalog unavailable");
                findings.push(Finding::error(
                    FindingCode::CatalogUnavailable,
                    format!("policy inspection aborted, catalog unavailable: {err}"),
                ));
                return findings;
            }
            Err(err) => {
                warn!(error = %err, table = %table.table_name, "Policy query failed");
                findings.push(
                    Finding::error(
                        FindingCode::CatalogUnavailable,
                        format!(
                            "could not determine policy state of '{}': {err}",
                            table.table_name
                        ),
                    )
                    .with_subject(Subject::table(&table.table_name, table.tier)),
                );
            }
        }
    }

    info!(findings = findings.len(), "Policy inspection complete");
    findings
}

async fn inspect_table(
    catalog: &dyn SchemaCatalog,
    registry: &Registry,
    table: &TableClassification,
) -> Result<Vec<Finding>, CatalogError> {
    let name = TableName::parse(&table.table_name)?;
    let subject = Subject::table(name.as_str(), table.tier);
    let mut findings = Vec::new();

    match catalog.rls_enabled(&name).await? {
        Some(true) => {}
        Some(false) => {
            let message = format!("row-level security is not enabled on '{name}'");
            let finding = if table.tier == Tier::Critical {
                Finding::fail(FindingCode::RlsDisabled, message)
            } else {
                Finding::warn(FindingCode::RlsDisabled, message)
            };
            findings.push(finding.with_subject(subject.clone()));
        }
        None => {
            findings.push(
                Finding::error(
                    FindingCode::RlsStateUnknown,
                    format!("could not determine enforcement state: '{name}' disappeared during the run"),
                )
                .with_subject(subject.clone()),
            );
            return Ok(findings);
        }
    }

    let policies = catalog.policies(&name).await?;
    debug!(table = %name, policies = policies.len(), "Loaded policies");

    if policies.is_empty() {
        findings.push(
            Finding::fail(
                FindingCode::NoPolicies,
                format!("'{name}' has no row-level security policies"),
            )
            .with_subject(subject.clone()),
        );
    }

    for operation in registry.required_operations(table.tier) {
        let covered = policies.iter().any(|p| p.command.covers(*operation));
        if !covered {
            findings.push(
                Finding::fail(
                    FindingCode::PolicyMissingOperation,
                    format!("'{name}' has no policy covering {operation}"),
                )
                .with_subject(subject.clone())
                .with_details(json!({ "operation": operation })),
            );
        }
    }

    for policy in &policies {
        findings.extend(assess_policy(registry, table.tier, &subject, policy));
    }

    let clean = findings.iter().all(|f| f.level == FindingLevel::Pass);
    if clean {
        findings.push(
            Finding::pass(
                FindingCode::TableCompliant,
                format!(
                    "'{name}' has enforcement enabled and {} scoped policies",
                    policies.len()
                ),
            )
            .with_subject(subject),
        );
    }

    Ok(findings)
}

/// Medium and Low tables only get an INFO when enforcement is off.
async fn note_unaudited(
    catalog: &dyn SchemaCatalog,
    table: &TableClassification,
) -> Result<Vec<Finding>, CatalogError> {
    let name = TableName::parse(&table.table_name)?;
    if catalog.rls_enabled(&name).await? != Some(false) {
        return Ok(Vec::new());
    }
    Ok(vec![
        Finding::info(
            FindingCode::RlsDisabledUnaudited,
            format!(
                "row-level security is not enabled on {} table '{name}'",
                table.tier.as_str().to_lowercase()
            ),
        )
        .with_subject(Subject::table(name.as_str(), table.tier)),
    ])
}

/// Predicate checks for one policy. A permissive predicate is reported once;
/// it is not also reported as missing user context.
fn assess_policy(
    registry: &Registry,
    tier: Tier,
    subject: &Subject,
    policy: &PolicyRecord,
) -> Option<Finding> {
    let verdict = assess_predicate(policy.effective_predicate(), registry.context_markers());
    let policy_subject = subject.clone().with_policy(&policy.policy_name);
    let details = json!({
        "command": policy.command,
        "predicate": policy.effective_predicate(),
    });

    match verdict {
        PredicateVerdict::Missing | PredicateVerdict::Tautology => Some(
            Finding::warn(
                FindingCode::PermissivePolicy,
                format!(
                    "potentially permissive policy '{}' on '{}'",
                    policy.policy_name, subject.table
                ),
            )
            .with_subject(policy_subject)
            .with_details(details),
        ),
        PredicateVerdict::NoUserContext if tier == Tier::Critical => Some(
            Finding::warn(
                FindingCode::PolicyMissingUserContext,
                format!(
                    "policy '{}' on '{}' is missing user context",
                    policy.policy_name, subject.table
                ),
            )
            .with_subject(policy_subject)
            .with_details(details),
        ),
        PredicateVerdict::NoUserContext | PredicateVerdict::Scoped => None,
    }
}
