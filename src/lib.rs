//! treecensus - a memory-bounded file census of local and network roots.
//!
//! A run resolves every root to a list of targets (the root itself plus
//! its immediate subdirectories), writes them to `targets.csv`, then scans
//! the roots one at a time with a fixed pool of workers. Each root that
//! scans successfully ends up as `<RootTag>.zip` holding a single
//! `<RootTag>.csv` with one `Root,Path,SizeBytes` row per file.
//!
//! ```rust,no_run
//! use treecensus::{Census, CensusConfig};
//!
//! let config = CensusConfig::builder()
//!     .roots(vec![r"C:\Data".to_string(), r"\\fileserver\share".to_string()])
//!     .include_ext(vec!["exe".to_string()])
//!     .build()
//!     .unwrap();
//!
//! let summary = Census::new(config).unwrap().run().unwrap();
//! println!("{} row(s) in {}", summary.total_rows(), summary.run_dir.display());
//! ```

mod census;
mod context;
mod summary;

pub use census::Census;
pub use context::{RUN_DIR_FORMAT, RunContext};
pub use summary::{RootOutcome, RootReport, RunSummary};

pub use treecensus_core::{CensusConfig, CensusConfigBuilder, CensusError, DEFAULT_THROTTLE};
pub use treecensus_scan::{HostProbe, ScanStats, TcpProbe};
