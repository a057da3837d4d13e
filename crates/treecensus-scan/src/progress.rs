//! Scan statistics.

use std::time::Duration;

use serde::Serialize;

/// Counters for one worker or, once merged, one root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Targets taken from the queue.
    pub targets_scanned: u64,
    /// Targets skipped (unreachable, missing or a reparse point).
    pub targets_skipped: u64,
    /// Files recorded.
    pub files: u64,
    /// Bytes across recorded files.
    pub bytes: u64,
    /// Non-fatal failures recorded.
    pub failures: u64,
    /// Wall-clock time of the scan phase.
    pub elapsed: Duration,
}

impl ScanStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one file.
    pub fn record_file(&mut self, size: u64) {
        self.files += 1;
        self.bytes += size;
    }

    /// Fold another worker's counters into these. Elapsed time is the
    /// maximum, since workers run concurrently.
    pub fn merge(&mut self, other: &ScanStats) {
        self.targets_scanned += other.targets_scanned;
        self.targets_skipped += other.targets_skipped;
        self.files += other.files;
        self.bytes += other.bytes;
        self.failures += other.failures;
        self.elapsed = self.elapsed.max(other.elapsed);
    }

    /// Scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}
