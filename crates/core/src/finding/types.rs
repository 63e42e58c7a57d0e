//! Finding data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::Tier;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingLevel {
    /// Check passed.
    Pass,
    /// Security gap.
    Fail,
    /// Hygiene or best-practice gap.
    Warn,
    /// A check could not be completed.
    Error,
    /// Informational.
    Info,
}

impl FindingLevel {
    /// Every level, in report order.
    pub const ALL: [Self; 5] = [Self::Fail, Self::Error, Self::Warn, Self::Info, Self::Pass];

    /// Uppercase label used in summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Info => "INFO",
        }
    }
}

/// Stable machine-readable finding code.
///
/// Codes are part of the report schema; new variants may be added, existing
/// ones are never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCode {
    /// Tier counts for the discovered schema.
    ClassificationSummary,
    /// Table is not in the tier map.
    UnclassifiedTable,
    /// Introspected table name failed the identifier allow-list.
    InvalidTableName,
    /// A mapped Critical table was not found in the schema.
    ExpectedTableAbsent,
    /// Row-level enforcement is disabled.
    RlsDisabled,
    /// Row-level enforcement is disabled on a table that is not audited.
    RlsDisabledUnaudited,
    /// Enforcement state could not be read.
    RlsStateUnknown,
    /// Table has no policies at all.
    NoPolicies,
    /// A required operation has no covering policy.
    PolicyMissingOperation,
    /// Policy predicate is null or always true.
    PermissivePolicy,
    /// Policy predicate never references the caller identity.
    PolicyMissingUserContext,
    /// Table passed every policy check.
    TableCompliant,
    /// Catalog could not be queried.
    CatalogUnavailable,
    /// Helper function is missing.
    HelperFunctionMissing,
    /// Helper function is present.
    HelperFunctionPresent,
    /// Supporting index is missing.
    IndexMissing,
    /// Supporting index is present.
    IndexPresent,
    /// Critical table has none of its supporting indexes.
    NoSupportingIndex,
    /// One tenant could read another tenant's rows.
    CrossTenantLeak,
    /// A tenant could not see exactly its own rows.
    OwnDataMismatch,
    /// Rows were visible without any tenant context.
    AnonymousAccess,
    /// An `OR 1=1` style predicate widened the visible row set.
    BooleanBypass,
    /// Isolation held for a resource.
    IsolationVerified,
    /// A probe query failed to execute.
    ProbeFailed,
    /// Probe queries run as a role that ignores row-level security.
    ProbeContextBypassesRls,
    /// Fixture setup failed.
    FixtureSetupFailed,
    /// Fixture teardown left rows behind.
    FixtureCleanupIncomplete,
    /// Defensive sweep removed leftover fixture rows.
    FixturesSwept,
    /// The run exceeded its wall-clock budget.
    RunBudgetExceeded,
    /// The database could not be reached at all.
    StructuralError,
}

/// What a finding is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Table name.
    pub table: String,
    /// Tier of the table, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Policy name, for policy-level findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl Subject {
    /// Subject for a table of a known tier.
    #[must_use]
    pub fn table(table: impl Into<String>, tier: Tier) -> Self {
        Self {
            table: table.into(),
            tier: Some(tier),
            policy: None,
        }
    }

    /// Narrows the subject to one policy of the table.
    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Whether the subject is a Critical-tier table.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.tier == Some(Tier::Critical)
    }
}

/// One atomic audit result.
///
/// Built with the level constructors and the `with_*` adapters, then pushed
/// into a component's finding list; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity.
    pub level: FindingLevel,
    /// Machine-readable code.
    pub code: FindingCode,
    /// Human-readable message.
    pub message: String,
    /// Table and policy the finding is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    /// Structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    /// Creates a finding at the given level.
    #[must_use]
    pub fn new(level: FindingLevel, code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            level,
            code,
            message: message.into(),
            subject: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    /// PASS finding.
    #[must_use]
    pub fn pass(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(FindingLevel::Pass, code, message)
    }

    /// FAIL finding.
    #[must_use]
    pub fn fail(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(FindingLevel::Fail, code, message)
    }

    /// WARN finding.
    #[must_use]
    pub fn warn(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(FindingLevel::Warn, code, message)
    }

    /// ERROR finding.
    #[must_use]
    pub fn error(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(FindingLevel::Error, code, message)
    }

    /// INFO finding.
    #[must_use]
    pub fn info(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(FindingLevel::Info, code, message)
    }

    /// Attaches a subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether this finding is a FAIL on a Critical-tier table.
    #[must_use]
    pub fn is_critical_fail(&self) -> bool {
        self.level == FindingLevel::Fail && self.subject.as_ref().is_some_and(Subject::is_critical)
    }

    /// Table name of the subject, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        self.subject.as_ref().map(|s| s.table.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serializes_uppercase() {
        let json = serde_json::to_string(&FindingLevel::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
    }

    #[test]
    fn test_code_serializes_snake_case() {
        let json = serde_json::to_string(&FindingCode::PolicyMissingOperation).unwrap();
        assert_eq!(json, "\"policy_missing_operation\"");
    }

    #[test]
    fn test_critical_fail_requires_critical_subject() {
        let bare = Finding::fail(FindingCode::HelperFunctionMissing, "missing");
        assert!(!bare.is_critical_fail());

        let high = Finding::fail(FindingCode::NoPolicies, "none")
            .with_subject(Subject::table("profiles", Tier::High));
        assert!(!high.is_critical_fail());

        let critical = Finding::fail(FindingCode::NoPolicies, "none")
            .with_subject(Subject::table("leases", Tier::Critical));
        assert!(critical.is_critical_fail());

        let warn = Finding::warn(FindingCode::PermissivePolicy, "open")
            .with_subject(Subject::table("leases", Tier::Critical));
        assert!(!warn.is_critical_fail());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let finding = Finding::info(FindingCode::ClassificationSummary, "summary");
        let json = serde_json::to_value(&finding).unwrap();
        assert!(json.get("subject").is_none());
        assert!(json.get("details").is_none());
        assert_eq!(json["level"], "INFO");
    }

    #[test]
    fn test_reads_finding_without_optional_fields() {
        let json = r#"{
            "level": "FAIL",
            "code": "rls_disabled",
            "message": "enforcement disabled",
            "timestamp": "2026-10-01T00:00:00Z"
        }"#;
        let finding: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(finding.level, FindingLevel::Fail);
        assert!(finding.subject.is_none());
    }
}
