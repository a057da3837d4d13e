//! The per-file record written to sinks.

use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;

/// Header line of every root's CSV entry.
pub const RECORD_HEADER: &str = "Root,Path,SizeBytes";

/// Header line of the targets audit file.
pub const TARGETS_HEADER: &str = "Path";

/// One inventoried file: owning root, absolute path, size in bytes.
///
/// Serialized as a CSV row with both string fields quoted and the size as
/// a bare integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord<'a> {
    /// Root identifier.
    #[serde(rename = "Root")]
    pub root: &'a str,
    /// Absolute file path.
    #[serde(rename = "Path")]
    pub path: Cow<'a, str>,
    /// Size in bytes.
    #[serde(rename = "SizeBytes")]
    pub size: u64,
}

impl<'a> FileRecord<'a> {
    /// Create a record for a file under `root`.
    pub fn new(root: &'a str, path: &'a Path, size: u64) -> Self {
        Self {
            root,
            path: path.to_string_lossy(),
            size,
        }
    }
}
