//! Run-scoped `errors.log`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use treecensus_core::CensusError;

/// File name of the error log inside a run directory.
pub const ERROR_LOG_NAME: &str = "errors.log";

/// Timestamp prefix of every log line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collects failure lines for the whole run.
///
/// The file is created on the first line, so a run without failures leaves
/// no `errors.log` behind. A disabled log accepts and drops everything.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    enabled: bool,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl ErrorLog {
    /// Create a log at `path`. Nothing is written unless `enabled`.
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
            writer: None,
            lines: 0,
        }
    }

    /// A log that never writes.
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    /// Whether lines are persisted.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Whether anything was logged.
    pub fn has_entries(&self) -> bool {
        self.lines > 0
    }

    /// Append one timestamped line.
    pub fn record(&mut self, message: &str) -> Result<(), CensusError> {
        if !self.enabled {
            return Ok(());
        }
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        writeln!(self.writer()?, "{stamp} {message}")
            .map_err(|e| CensusError::io(&self.path, e))?;
        self.lines += 1;
        Ok(())
    }

    /// Log a root that could not be scanned.
    pub fn record_root(&mut self, root: &str, reason: &CensusError) -> Result<(), CensusError> {
        self.record(&format!("[root] {root}: {reason}"))
    }

    /// Move every line of a worker's error buffer into this log and delete
    /// the buffer. Returns the number of lines merged.
    pub fn merge_buffer(&mut self, buffer: &Path) -> Result<u64, CensusError> {
        let file = File::open(buffer).map_err(|e| CensusError::io(buffer, e))?;
        let mut merged = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| CensusError::io(buffer, e))?;
            if line.is_empty() {
                continue;
            }
            self.record(&line)?;
            merged += 1;
        }
        if let Err(err) = fs::remove_file(buffer) {
            warn!("Could not remove {}: {err}", buffer.display());
        }
        Ok(merged)
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> Result<(), CensusError> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(|e| CensusError::io(&self.path, e)),
            None => Ok(()),
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, CensusError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| CensusError::io(&self.path, e))?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }
}

impl Drop for ErrorLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
