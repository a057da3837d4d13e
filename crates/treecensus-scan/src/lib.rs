//! Scanning engine for treecensus.
//!
//! Scanning runs in two stages:
//!
//! - **Stage 1** ([`RootResolver`]): every root is checked for existence
//!   and, for UNC shares, host reachability. The root and its immediate
//!   non-reparse subdirectories become its targets.
//! - **Stage 2** ([`ScanPool`]): for one root at a time, the targets are
//!   put in a closed [`WorkQueue`] and a fixed number of [`ScanWorker`]s
//!   drain it, each streaming rows into its own [`TempSink`].
//!
//! Memory stays proportional to the number of workers: no worker ever
//! holds more than one sink buffer, and records are never collected.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use treecensus_core::{ExtensionFilter, Root};
//! use treecensus_scan::{PoolOptions, ReachabilityCache, RootResolver, ScanPool, TcpProbe};
//!
//! let cache = ReachabilityCache::new(TcpProbe::new(445, Duration::from_secs(1)));
//! let roots = vec![Root::parse("/srv/data").unwrap()];
//! let resolution = RootResolver::new(&cache).resolve(&roots);
//!
//! let filter = ExtensionFilter::All;
//! let options = PoolOptions {
//!     workers: 4,
//!     temp_dir: "/tmp/census".into(),
//!     echo_to_console: false,
//!     persist_errors: false,
//! };
//! let pool = ScanPool::new(&cache, &filter, options);
//! for resolved in &resolution.roots {
//!     let outcome = pool.run(&resolved.root, &resolved.targets).unwrap();
//!     println!("{} sink(s), {} file(s)", outcome.sinks.len(), outcome.stats.files);
//! }
//! ```

mod pool;
mod progress;
mod queue;
mod reachability;
mod reparse;
mod resolver;
mod sink;
mod worker;

pub use pool::{PoolOptions, PoolOutcome, ScanPool, remove_all};
pub use progress::ScanStats;
pub use queue::{QueueStats, WorkQueue};
pub use reachability::{HostProbe, ReachabilityCache, TcpProbe};
pub use resolver::{Resolution, ResolvedRoot, RootResolver, SkippedRoot};
pub use sink::{SINK_BUFFER_SIZE, TempSink};
pub use worker::{ScanWorker, WorkerContext, WorkerReport};

// Re-export core types for convenience
pub use treecensus_core::{
    CensusError, ExtensionFilter, FailureKind, FileRecord, Root, RootKind, RootTag,
    SubtreeFailure, Target, TargetDepth,
};
