//! Property-based tests for the health scorer.

use proptest::prelude::*;

use super::report::HealthStatus;
use super::scorer::HealthScorer;
use crate::classification::Tier;
use crate::finding::{Finding, FindingCode, Subject};

fn arb_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![
        Just(Tier::Critical),
        Just(Tier::High),
        Just(Tier::Medium),
        Just(Tier::Low),
        Just(Tier::Unclassified),
    ]
}

fn arb_finding() -> impl Strategy<Value = Finding> {
    let table = prop_oneof![
        Just("properties"),
        Just("units"),
        Just("leases"),
        Just("profiles"),
    ];
    (0u8..6, table, arb_tier(), any::<bool>()).prop_map(|(kind, table, tier, with_subject)| {
        let finding = match kind {
            0 => Finding::pass(FindingCode::TableCompliant, "ok"),
            1 => Finding::fail(FindingCode::PolicyMissingOperation, "gap"),
            2 => Finding::warn(FindingCode::PermissivePolicy, "open"),
            3 => Finding::error(FindingCode::CatalogUnavailable, "down"),
            4 => Finding::info(FindingCode::ClassificationSummary, "info"),
            _ => Finding::fail(FindingCode::RlsDisabled, "rls off"),
        };
        if with_subject {
            finding.with_subject(Subject::table(table, tier))
        } else {
            finding
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The score always stays within 0..=100.
    #[test]
    fn prop_score_is_bounded(findings in proptest::collection::vec(arb_finding(), 0..40)) {
        let score = HealthScorer::default().compute(&findings);
        prop_assert!(score <= 100);
    }

    /// One more FAIL on a Critical table strictly lowers the score unless it
    /// is already 0.
    #[test]
    fn prop_critical_fail_strictly_decreases(
        findings in proptest::collection::vec(arb_finding(), 0..20)
    ) {
        let scorer = HealthScorer::default();
        let before = scorer.compute(&findings);

        let mut more = findings.clone();
        more.push(
            Finding::fail(FindingCode::CrossTenantLeak, "leak")
                .with_subject(Subject::table("leases", Tier::Critical)),
        );
        let after = scorer.compute(&more);

        if before == 0 {
            prop_assert_eq!(after, 0);
        } else {
            prop_assert!(after < before);
        }
    }

    /// Adding findings never raises the score.
    #[test]
    fn prop_adding_findings_never_increases(
        findings in proptest::collection::vec(arb_finding(), 0..20),
        extra in arb_finding(),
    ) {
        let scorer = HealthScorer::default();
        let before = scorer.compute(&findings);
        let mut more = findings.clone();
        more.push(extra);
        prop_assert!(scorer.compute(&more) <= before);
    }

    /// Scoring ignores finding order.
    #[test]
    fn prop_score_ignores_order(findings in proptest::collection::vec(arb_finding(), 0..20)) {
        let scorer = HealthScorer::default();
        let mut reversed = findings.clone();
        reversed.reverse();
        prop_assert_eq!(scorer.compute(&findings), scorer.compute(&reversed));
    }

    /// Status always follows the fixed thresholds.
    #[test]
    fn prop_status_matches_thresholds(findings in proptest::collection::vec(arb_finding(), 0..20)) {
        let report = HealthScorer::default().score(findings);
        let expected = if report.score >= 90 {
            HealthStatus::Healthy
        } else if report.score >= 70 {
            HealthStatus::NeedsAttention
        } else {
            HealthStatus::Critical
        };
        prop_assert_eq!(report.status, expected);
    }
}
