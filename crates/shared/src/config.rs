//! Application configuration management.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{GuardError, GuardResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Alert sink configuration.
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Audit run configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Administrative connection URL (catalog reads, fixture setup and teardown).
    pub url: String,
    /// Non-superuser connection URL used for tenant-context probing.
    #[serde(default)]
    pub app_url: Option<String>,
    /// Role assumed with `SET LOCAL ROLE` inside probe transactions.
    #[serde(default)]
    pub app_role: Option<String>,
    /// Session variable carrying the tenant identity.
    #[serde(default = "default_context_setting")]
    pub context_setting: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection establishment timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-query timeout in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// Retries for read-only catalog queries (0 or 1).
    #[serde(default = "default_retries")]
    pub read_retries: u32,
}

fn default_context_setting() -> String {
    "app.current_user_id".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    8
}

fn default_retries() -> u32 {
    1
}

impl DatabaseConfig {
    /// URL used for tenant-context probing, falling back to the admin URL.
    #[must_use]
    pub fn probe_url(&self) -> &str {
        self.app_url.as_deref().unwrap_or(&self.url)
    }

    /// Per-query timeout.
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Alert sink configuration. A sink without credentials is disabled.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Chat webhook URL.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Dashboard ingestion endpoint.
    #[serde(default)]
    pub dashboard_url: Option<String>,
    /// Bearer token for the dashboard endpoint.
    #[serde(default)]
    pub dashboard_token: Option<String>,
    /// Delivery timeout in seconds.
    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u64,
    /// Delivery retries (0 or 1).
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Number of FAIL messages included in the alert summary.
    #[serde(default = "default_top_failures")]
    pub top_failures: usize,
}

fn default_alert_timeout() -> u64 {
    5
}

fn default_top_failures() -> usize {
    5
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            dashboard_url: None,
            dashboard_token: None,
            timeout_secs: default_alert_timeout(),
            retries: default_retries(),
            top_failures: default_top_failures(),
        }
    }
}

impl AlertConfig {
    /// Delivery timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Dashboard URL and token, only when both are present and non-empty.
    #[must_use]
    pub fn dashboard_credentials(&self) -> Option<(&str, &str)> {
        let url = non_empty(self.dashboard_url.as_deref())?;
        let token = non_empty(self.dashboard_token.as_deref())?;
        Some((url, token))
    }

    /// Webhook URL, only when present and non-empty.
    #[must_use]
    pub fn webhook(&self) -> Option<&str> {
        non_empty(self.webhook_url.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Audit run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Directory receiving report artifacts.
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
    /// Number of timestamped reports kept on disk.
    #[serde(default = "default_retain_reports")]
    pub retain_reports: usize,
    /// Wall-clock budget for one pass, in seconds.
    #[serde(default = "default_run_budget")]
    pub run_budget_secs: u64,
    /// Interval between passes in continuous mode, in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_report_dir() -> String {
    "reports".to_string()
}

fn default_retain_reports() -> usize {
    30
}

fn default_run_budget() -> u64 {
    300
}

fn default_interval() -> u64 {
    3600 // 1 hour
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            retain_reports: default_retain_reports(),
            run_budget_secs: default_run_budget(),
            interval_secs: default_interval(),
        }
    }
}

impl AuditConfig {
    /// Wall-clock budget for one pass.
    #[must_use]
    pub const fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }

    /// Interval between passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "rlsguard=info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl GuardConfig {
    /// Loads configuration from config files and `RLSGUARD__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or fails validation.
    pub fn load() -> GuardResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("RLSGUARD").separator("__"))
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validated()
    }

    /// Validates and normalizes a loaded configuration.
    ///
    /// Retry counts are clamped to at most one; an empty database URL or a
    /// probe role that is not a plain identifier is rejected.
    pub fn validated(mut self) -> GuardResult<Self> {
        if self.database.url.trim().is_empty() {
            return Err(GuardError::Config("database.url must not be empty".into()));
        }
        if let Some(role) = self.database.app_role.as_deref() {
            if !is_plain_identifier(role) {
                return Err(GuardError::Config(format!(
                    "database.app_role '{role}' is not a plain identifier"
                )));
            }
        }
        if !is_setting_name(&self.database.context_setting) {
            return Err(GuardError::Config(format!(
                "database.context_setting '{}' is not a dotted identifier",
                self.database.context_setting
            )));
        }
        self.database.read_retries = self.database.read_retries.min(1);
        self.alerts.retries = self.alerts.retries.min(1);
        Ok(self)
    }
}

/// Returns true for `[a-z_][a-z0-9_]*` identifiers of at most 63 bytes.
#[must_use]
pub fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= 63
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Returns true for dotted names such as `app.current_user_id` whose every
/// segment is a plain identifier.
#[must_use]
pub fn is_setting_name(value: &str) -> bool {
    value.contains('.') && value.split('.').all(is_plain_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn minimal() -> GuardConfig {
        GuardConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/app".into(),
                app_url: None,
                app_role: None,
                context_setting: default_context_setting(),
                max_connections: default_max_connections(),
                connect_timeout_secs: default_connect_timeout(),
                query_timeout_secs: default_query_timeout(),
                read_retries: 3,
            },
            alerts: AlertConfig::default(),
            audit: AuditConfig::default(),
            log: LogConfig::default(),
        }
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("RLSGUARD__DATABASE__URL", Some("postgres://admin@db/app")),
                ("RLSGUARD__DATABASE__APP_ROLE", Some("authenticated")),
                ("RLSGUARD__ALERTS__WEBHOOK_URL", Some("https://chat.example/hook")),
                ("RLSGUARD__AUDIT__RUN_BUDGET_SECS", Some("60")),
            ],
            || {
                let config = GuardConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://admin@db/app");
                assert_eq!(config.database.probe_url(), "postgres://admin@db/app");
                assert_eq!(config.database.app_role.as_deref(), Some("authenticated"));
                assert_eq!(config.alerts.webhook(), Some("https://chat.example/hook"));
                assert!(config.alerts.dashboard_credentials().is_none());
                assert_eq!(config.audit.run_budget_secs, 60);
                assert_eq!(config.audit.retain_reports, 30);
                assert_eq!(config.log.format, LogFormat::Pretty);
            },
        );
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        temp_env::with_vars_unset(["RLSGUARD__DATABASE__URL"], || {
            let err = GuardConfig::load().unwrap_err();
            assert_eq!(err.error_code(), "CONFIG_ERROR");
        });
    }

    #[test]
    fn test_retries_are_clamped() {
        let mut config = minimal();
        config.alerts.retries = 9;
        let config = config.validated().unwrap();
        assert_eq!(config.database.read_retries, 1);
        assert_eq!(config.alerts.retries, 1);
    }

    #[test]
    fn test_dashboard_requires_url_and_token() {
        let mut alerts = AlertConfig {
            dashboard_url: Some("https://dash.example/ingest".into()),
            ..AlertConfig::default()
        };
        assert!(alerts.dashboard_credentials().is_none());

        alerts.dashboard_token = Some("   ".into());
        assert!(alerts.dashboard_credentials().is_none());

        alerts.dashboard_token = Some("secret".into());
        assert_eq!(
            alerts.dashboard_credentials(),
            Some(("https://dash.example/ingest", "secret"))
        );
    }

    #[test]
    fn test_rejects_injected_role() {
        let mut config = minimal();
        config.database.app_role = Some("authenticated; DROP TABLE leases".into());
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_rejects_bad_context_setting() {
        let mut config = minimal();
        config.database.context_setting = "app.user id".into();
        assert!(config.validated().is_err());
    }

    #[rstest]
    #[case("authenticated", true)]
    #[case("_private", true)]
    #[case("role2", true)]
    #[case("", false)]
    #[case("2role", false)]
    #[case("Role", false)]
    #[case("a-b", false)]
    #[case("a b", false)]
    fn test_plain_identifier(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_plain_identifier(value), expected);
    }
}
