//! Error types for census runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving, scanning or archiving a root.
///
/// Only [`CensusError::InvalidConfig`] aborts a whole run. Everything else
/// is scoped to the root (or worker) that produced it.
#[derive(Debug, Error)]
pub enum CensusError {
    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Network host did not answer the reachability probe.
    #[error("Host unreachable: {host}")]
    RootUnreachable { host: String },

    /// Root path does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Root path exists but is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding failed while writing a sink or audit file.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Archive layer failed while assembling a root's output.
    #[error("Archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// A scan worker panicked instead of reporting back.
    #[error("Scan worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

impl CensusError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an archive error with path context.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Kind of subtree failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Permission was denied.
    PermissionDenied,
    /// The subtree's host did not answer the reachability probe.
    Unreachable,
    /// The target vanished between discovery and scanning.
    Missing,
    /// Error reading a directory.
    ReadError,
    /// Error reading file metadata.
    MetadataError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Missing => write!(f, "missing"),
            Self::ReadError => write!(f, "read error"),
            Self::MetadataError => write!(f, "metadata error"),
        }
    }
}

/// Non-fatal failure recorded by a worker while scanning one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtreeFailure {
    /// Target (queued work item) the failure happened under.
    pub target: PathBuf,
    /// Path that actually failed; may equal `target`.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of failure.
    pub kind: FailureKind,
}

impl SubtreeFailure {
    /// Create a new subtree failure.
    pub fn new(
        target: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        kind: FailureKind,
    ) -> Self {
        Self {
            target: target.into(),
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a failure from an I/O error, classifying permission problems.
    pub fn from_io(
        target: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
        error: &std::io::Error,
    ) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
            std::io::ErrorKind::NotFound => FailureKind::Missing,
            _ => FailureKind::ReadError,
        };
        Self::new(target, path, error.to_string(), kind)
    }

    /// Single log line for this failure, tagged with its target.
    pub fn to_log_line(&self) -> String {
        if self.path == self.target {
            format!(
                "[{}] {}: {}",
                self.kind,
                self.target.display(),
                self.message
            )
        } else {
            format!(
                "[{}] {} (under {}): {}",
                self.kind,
                self.path.display(),
                self.target.display(),
                self.message
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_census_error_io() {
        let err = CensusError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, CensusError::PermissionDenied { .. }));

        let err = CensusError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, CensusError::NotFound { .. }));
    }

    #[test]
    fn test_failure_from_io_classifies() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let failure = SubtreeFailure::from_io("/data/a", "/data/a/locked", &err);
        assert_eq!(failure.kind, FailureKind::PermissionDenied);
    }

    #[test]
    fn test_log_line_names_target() {
        let failure = SubtreeFailure::new(
            "/data/a",
            "/data/a/b",
            "boom",
            FailureKind::ReadError,
        );
        let line = failure.to_log_line();
        assert!(line.contains("/data/a/b"));
        assert!(line.contains("under /data/a"));
        assert!(line.starts_with("[read error]"));
    }
}
