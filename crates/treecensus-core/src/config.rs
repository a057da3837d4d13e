//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::CensusError;
use crate::filter::ExtensionFilter;
use crate::root::Root;

/// Default number of scan workers per root.
pub const DEFAULT_THROTTLE: usize = 4;

/// Default TCP port probed for network hosts (SMB).
pub const DEFAULT_PROBE_PORT: u16 = 445;

/// Configuration for a census run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct CensusConfig {
    /// Raw root strings, local paths or UNC shares.
    pub roots: Vec<String>,

    /// Worker count per root.
    #[builder(default = "DEFAULT_THROTTLE")]
    #[serde(default = "default_throttle")]
    pub throttle: usize,

    /// Extensions to keep (empty = all files).
    #[builder(default)]
    #[serde(default)]
    pub include_ext: Vec<String>,

    /// Print each matched path as it is found.
    #[builder(default = "false")]
    #[serde(default)]
    pub echo_to_console: bool,

    /// Persist per-failure records to the run's error log.
    #[builder(default = "false")]
    #[serde(default)]
    pub verbose_errors: bool,

    /// Override for the targets audit file location.
    #[builder(default)]
    #[serde(default)]
    pub targets_file: Option<PathBuf>,

    /// Directory under which timestamped run folders are created.
    #[builder(default = "PathBuf::from(\"census\")")]
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Override for the temporary sink directory.
    #[builder(default)]
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Timeout of a single reachability probe.
    #[builder(default = "Duration::from_secs(1)")]
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// TCP port used for reachability probes.
    #[builder(default = "DEFAULT_PROBE_PORT")]
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
}

fn default_throttle() -> usize {
    DEFAULT_THROTTLE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("census")
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_probe_port() -> u16 {
    DEFAULT_PROBE_PORT
}

impl CensusConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.roots {
            Some(ref roots) if roots.iter().any(|r| Root::parse(r).is_some()) => {}
            _ => return Err("At least one root is required".to_string()),
        }
        if self.throttle == Some(0) {
            return Err("Throttle must be at least 1".to_string());
        }
        if let Some(ref exts) = self.include_ext {
            ExtensionFilter::from_extensions(exts).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl CensusConfig {
    /// Create a new config builder.
    pub fn builder() -> CensusConfigBuilder {
        CensusConfigBuilder::default()
    }

    /// Create a config with defaults for the given roots.
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            throttle: DEFAULT_THROTTLE,
            include_ext: Vec::new(),
            echo_to_console: false,
            verbose_errors: false,
            targets_file: None,
            output_dir: default_output_dir(),
            temp_dir: None,
            probe_timeout: default_probe_timeout(),
            probe_port: DEFAULT_PROBE_PORT,
        }
    }

    /// Parsed roots, blank entries dropped, duplicates removed in input order.
    pub fn parsed_roots(&self) -> Result<Vec<Root>, CensusError> {
        let mut roots: Vec<Root> = Vec::new();
        for raw in &self.roots {
            let Some(root) = Root::parse(raw) else {
                continue;
            };
            if !roots.iter().any(|r| r.path == root.path) {
                roots.push(root);
            }
        }
        if roots.is_empty() {
            return Err(CensusError::invalid_config("no valid roots supplied"));
        }
        Ok(roots)
    }

    /// The extension filter strategy for this run.
    pub fn extension_filter(&self) -> Result<ExtensionFilter, CensusError> {
        ExtensionFilter::from_extensions(&self.include_ext)
    }

    /// Worker count, never below one.
    pub fn workers(&self) -> usize {
        self.throttle.max(1)
    }
}
