//! Timestamped run directory and its temp area.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use treecensus_archive::{ERROR_LOG_NAME, TARGETS_FILE_NAME};
use treecensus_core::CensusError;

/// Directory name format of a run, e.g. `20240131_235959`.
pub const RUN_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where one run puts its files.
///
/// Results go to `<output_dir>/<timestamp>/`. Sinks and error buffers go to
/// `<run_dir>/tmp`, or `<temp_override>/<timestamp>` when an override is
/// given.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Run start time.
    pub started: DateTime<Local>,
    /// Results directory.
    pub run_dir: PathBuf,
    /// Temp directory for sinks.
    pub temp_dir: PathBuf,
}

impl RunContext {
    /// Create the directories of a run starting now.
    pub fn create(output_dir: &Path, temp_override: Option<&Path>) -> Result<Self, CensusError> {
        Self::create_at(output_dir, temp_override, Local::now())
    }

    /// Create the directories of a run started at `started`.
    ///
    /// A second run in the same second gets a `_<n>` suffix instead of
    /// sharing the first run's directory.
    pub fn create_at(
        output_dir: &Path,
        temp_override: Option<&Path>,
        started: DateTime<Local>,
    ) -> Result<Self, CensusError> {
        let stamp = started.format(RUN_DIR_FORMAT).to_string();
        fs::create_dir_all(output_dir).map_err(|e| CensusError::io(output_dir, e))?;

        let mut name = stamp.clone();
        let mut n = 1;
        let run_dir = loop {
            let candidate = output_dir.join(&name);
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    name = format!("{stamp}_{n}");
                    n += 1;
                }
                Err(e) => return Err(CensusError::io(&candidate, e)),
            }
        };

        let temp_dir = match temp_override {
            Some(base) => base.join(&name),
            None => run_dir.join("tmp"),
        };
        fs::create_dir_all(&temp_dir).map_err(|e| CensusError::io(&temp_dir, e))?;

        debug!(
            "Run directory {}, temp directory {}",
            run_dir.display(),
            temp_dir.display()
        );

        Ok(Self {
            started,
            run_dir,
            temp_dir,
        })
    }

    /// Location of the target audit, `targets.csv` in the run directory
    /// unless overridden.
    pub fn targets_path(&self, targets_override: Option<&Path>) -> PathBuf {
        match targets_override {
            Some(path) => path.to_path_buf(),
            None => self.run_dir.join(TARGETS_FILE_NAME),
        }
    }

    /// Location of the run's `errors.log`.
    pub fn error_log_path(&self) -> PathBuf {
        self.run_dir.join(ERROR_LOG_NAME)
    }

    /// Remove the temp directory if nothing was left in it.
    pub fn finish(&self) {
        let empty = fs::read_dir(&self.temp_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if empty {
            if let Err(err) = fs::remove_dir(&self.temp_dir) {
                warn!("Could not remove {}: {err}", self.temp_dir.display());
            }
        } else {
            warn!("Leftover temp files in {}", self.temp_dir.display());
        }
    }
}
