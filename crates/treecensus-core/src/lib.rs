//! Core types for treecensus.
//!
//! This crate provides the data model shared by the scanning engine and
//! the archive assembler: roots and the targets discovered under them,
//! the per-file record written to sinks, extension filtering and the
//! run configuration.

mod config;
mod error;
mod filter;
mod record;
mod root;

pub use config::{CensusConfig, CensusConfigBuilder, DEFAULT_PROBE_PORT, DEFAULT_THROTTLE};
pub use error::{CensusError, FailureKind, SubtreeFailure};
pub use filter::ExtensionFilter;
pub use record::{FileRecord, RECORD_HEADER, TARGETS_HEADER};
pub use root::{Root, RootKind, RootTag, Target, TargetDepth, network_host};
