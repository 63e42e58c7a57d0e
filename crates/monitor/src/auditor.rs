//! One audit pass.

use std::sync::Arc;
use std::time::Duration;

use rlsguard_core::catalog::SchemaCatalog;
use rlsguard_core::classification::{Registry, classify};
use rlsguard_core::finding::{Finding, FindingCode};
use rlsguard_core::isolation::{IsolationStore, probe_isolation};
use rlsguard_core::policy::inspect_policies;
use rlsguard_core::scoring::{HealthReport, HealthScorer, ReportMode};
use rlsguard_core::support::verify_support_objects;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

/// Runs audit and completeness passes against one database.
pub struct Auditor {
    catalog: Arc<dyn SchemaCatalog>,
    store: Arc<dyn IsolationStore>,
    registry: Registry,
    scorer: HealthScorer,
    budget: Duration,
}

impl Auditor {
    /// Creates an auditor with the default registry and penalties.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn SchemaCatalog>,
        store: Arc<dyn IsolationStore>,
        budget: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            registry: Registry::default(),
            scorer: HealthScorer::default(),
            budget,
        }
    }

    /// Report for a run that could not reach the schema catalog at all.
    /// It carries a single ERROR and is always failing.
    #[must_use]
    pub fn structural_report(mode: ReportMode, reason: &str) -> HealthReport {
        error!(reason, "Structural error, no checks were run");
        let finding = Finding::error(
            FindingCode::StructuralError,
            format!("could not read the schema catalog, no checks were run: {reason}"),
        );
        HealthScorer::default()
            .score(vec![finding])
            .with_mode(mode)
            .incomplete(format!("structural error: {reason}"))
    }

    /// Runs one pass. `Completeness` skips the isolation probe.
    pub async fn run(&self, mode: ReportMode) -> HealthReport {
        let deadline = Instant::now() + self.budget;
        info!(?mode, budget_secs = self.budget.as_secs(), "Audit pass started");

        let tables = match timeout_at(deadline, self.catalog.list_tables()).await {
            Ok(Ok(tables)) => tables,
            Ok(Err(err)) => return Self::structural_report(mode, &err.to_string()),
            Err(_) => return Self::structural_report(mode, "run budget exhausted listing tables"),
        };

        let classification = classify(&self.registry, &tables);
        let mut findings = classification.findings.clone();

        let static_checks = async {
            tokio::join!(
                inspect_policies(
                    self.catalog.as_ref(),
                    &self.registry,
                    &classification.tables
                ),
                verify_support_objects(
                    self.catalog.as_ref(),
                    self.registry.helper_functions(),
                    self.registry.required_indexes(),
                    &classification,
                ),
            )
        };
        match timeout_at(deadline, static_checks).await {
            Ok((policy, support)) => {
                findings.extend(policy);
                findings.extend(support);
            }
            Err(_) => {
                warn!("Run budget exhausted during catalog checks");
                findings.push(Finding::error(
                    FindingCode::RunBudgetExceeded,
                    "run budget exceeded during policy and index checks; isolation was not probed",
                ));
                return self.finish(findings, mode);
            }
        }

        if mode == ReportMode::Audit {
            findings.extend(probe_isolation(self.store.as_ref(), Some(deadline)).await);
        }

        self.finish(findings, mode)
    }

    fn finish(&self, findings: Vec<Finding>, mode: ReportMode) -> HealthReport {
        let over_budget = findings
            .iter()
            .any(|f| f.code == FindingCode::RunBudgetExceeded);
        let unverifiable = findings
            .iter()
            .any(|f| f.code == FindingCode::ProbeContextBypassesRls);
        let mut report = self.scorer.score(findings).with_mode(mode);
        if over_budget {
            report = report.incomplete(format!(
                "run budget of {}s exceeded; remaining checks skipped",
                self.budget.as_secs()
            ));
        } else if unverifiable {
            report = report.incomplete(
                "isolation could not be verified: probe context bypasses RLS; configure database.app_role or database.app_url",
            );
        }
        info!(
            score = report.score,
            status = report.status.as_str(),
            findings = report.findings.len(),
            incomplete = report.incomplete,
            "Audit pass finished"
        );
        report
    }
}
