//! Run artifacts for treecensus.
//!
//! After a root's scan phase, [`ZipAssembler`] concatenates its worker
//! sinks behind the `Root,Path,SizeBytes` header into a single compressed
//! entry `<RootTag>.csv` of `<RootTag>.zip`. The run directory also holds
//! the target audit ([`write_targets`]) and, in verbose mode, the
//! [`ErrorLog`].

mod assembler;
mod error_log;
mod targets;

pub use assembler::{AssembledArchive, ZipAssembler};
pub use error_log::{ERROR_LOG_NAME, ErrorLog};
pub use targets::{TARGETS_FILE_NAME, write_targets};
