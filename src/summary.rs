//! Per-root outcomes and the run summary.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use treecensus_core::CensusError;
use treecensus_scan::ScanStats;

/// How a root ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RootOutcome {
    /// The archive was written.
    Archived {
        /// Archive location.
        archive: PathBuf,
        /// Data rows in the archive.
        rows: u64,
    },
    /// Scanning or assembly failed; no archive was kept.
    Failed {
        /// What went wrong.
        reason: String,
    },
    /// The root was dropped during resolution.
    Skipped {
        /// Why the root was dropped.
        reason: String,
    },
}

/// One root's line in the summary.
#[derive(Debug, Clone, Serialize)]
pub struct RootReport {
    /// Root as given on input.
    pub root: String,
    /// Archive tag, for roots that reached the scan phase.
    pub tag: Option<String>,
    /// Targets queued for the root.
    pub targets: usize,
    /// Counters from the scan phase.
    pub stats: Option<ScanStats>,
    /// Final state.
    pub outcome: RootOutcome,
}

impl RootReport {
    /// A root that never reached the scan phase.
    pub fn skipped(root: impl Into<String>, reason: &CensusError) -> Self {
        Self {
            root: root.into(),
            tag: None,
            targets: 0,
            stats: None,
            outcome: RootOutcome::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    /// Rows archived for this root.
    pub fn rows(&self) -> u64 {
        match self.outcome {
            RootOutcome::Archived { rows, .. } => rows,
            _ => 0,
        }
    }

    /// Whether an archive was produced.
    pub fn is_archived(&self) -> bool {
        matches!(self.outcome, RootOutcome::Archived { .. })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run start time.
    pub started: DateTime<Local>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Results directory.
    pub run_dir: PathBuf,
    /// Target audit file.
    pub targets_file: PathBuf,
    /// Rows in the target audit.
    pub targets: usize,
    /// The error log, if anything was written to it.
    pub error_log: Option<PathBuf>,
    /// Per-root results, skipped roots first.
    pub roots: Vec<RootReport>,
}

impl RunSummary {
    /// Rows across all archives.
    pub fn total_rows(&self) -> u64 {
        self.roots.iter().map(RootReport::rows).sum()
    }

    /// Number of archives written.
    pub fn archived(&self) -> usize {
        self.roots.iter().filter(|r| r.is_archived()).count()
    }

    /// Whether any root was skipped or failed.
    pub fn has_failures(&self) -> bool {
        self.roots.iter().any(|r| !r.is_archived())
    }

    /// Whether the error log received any line.
    pub fn errors_logged(&self) -> bool {
        self.error_log.is_some()
    }

    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), CensusError> {
        let file = File::create(path).map_err(|e| CensusError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| CensusError::io(path, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(roots: Vec<RootReport>) -> RunSummary {
        RunSummary {
            started: Local::now(),
            elapsed: Duration::from_secs(1),
            run_dir: PathBuf::from("/out/run"),
            targets_file: PathBuf::from("/out/run/targets.csv"),
            targets: 3,
            error_log: None,
            roots,
        }
    }

    #[test]
    fn test_totals() {
        let archived = RootReport {
            root: "/data".into(),
            tag: Some("data".into()),
            targets: 3,
            stats: Some(ScanStats::new()),
            outcome: RootOutcome::Archived {
                archive: PathBuf::from("/out/run/data.zip"),
                rows: 12,
            },
        };
        let skipped = RootReport::skipped(
            r"\\nas\share",
            &CensusError::RootUnreachable { host: "nas".into() },
        );

        let summary = summary(vec![skipped, archived]);
        assert_eq!(summary.total_rows(), 12);
        assert_eq!(summary.archived(), 1);
        assert!(summary.has_failures());
        assert!(!summary.errors_logged());
    }

    #[test]
    fn test_json_shape() {
        let skipped = RootReport::skipped("/gone", &CensusError::NotFound { path: "/gone".into() });
        let value = serde_json::to_value(summary(vec![skipped])).unwrap();

        let root = &value["roots"][0];
        assert_eq!(root["root"], "/gone");
        assert_eq!(root["outcome"]["status"], "skipped");
        assert_eq!(root["outcome"]["reason"], "Path not found: /gone");
    }
}
