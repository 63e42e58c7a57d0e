//! Local report persistence.
//!
//! Every report is written as `rlsguard-report-<timestamp>.json` and copied to
//! `latest.json`. Timestamped files beyond the retention count are pruned,
//! oldest first. `latest.json` is read back only to show a trend.

use std::fs;
use std::path::{Path, PathBuf};

use rlsguard_core::scoring::HealthReport;
use tracing::{debug, info, warn};

use crate::error::ReportError;

const REPORT_PREFIX: &str = "rlsguard-report-";
const LATEST: &str = "latest.json";

/// Writes reports into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    retain: usize,
}

impl ReportWriter {
    /// Creates a writer. `retain` of zero keeps every report.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, retain: usize) -> Self {
        Self {
            dir: dir.into(),
            retain,
        }
    }

    /// Report directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists `report` and refreshes `latest.json`. Returns the path of the
    /// timestamped file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or either file cannot be written.
    pub fn write(&self, report: &HealthReport) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.dir)?;
        let body = serde_json::to_vec_pretty(report)?;

        let name = format!(
            "{REPORT_PREFIX}{}.json",
            report.timestamp.format("%Y%m%dT%H%M%S%.3fZ")
        );
        let path = self.dir.join(name);
        write_atomic(&path, &body)?;
        write_atomic(&self.dir.join(LATEST), &body)?;
        info!(path = %path.display(), score = report.score, "Report written");

        if let Err(err) = self.prune() {
            warn!(error = %err, "Report retention pruning failed");
        }
        Ok(path)
    }

    /// Reads `latest.json`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_latest(&self) -> Result<Option<HealthReport>, ReportError> {
        let path = self.dir.join(LATEST);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Timestamped reports in the directory, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<PathBuf>, ReportError> {
        let mut reports: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| {
                        n.starts_with(REPORT_PREFIX)
                            && Path::new(n)
                                .extension()
                                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                    })
            })
            .collect();
        reports.sort();
        Ok(reports)
    }

    fn prune(&self) -> Result<(), ReportError> {
        if self.retain == 0 {
            return Ok(());
        }
        let reports = self.list()?;
        let excess = reports.len().saturating_sub(self.retain);
        for path in reports.into_iter().take(excess) {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "Pruned old report");
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, body: &[u8]) -> Result<(), ReportError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
