//! Reparse point detection.
//!
//! Junctions, symlinks and other reparse points are never listed as
//! targets, never descended into and never recorded as files.

use std::fs::Metadata;

#[cfg(windows)]
const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;

/// Check whether un-followed metadata describes a reparse point.
#[cfg(windows)]
pub(crate) fn is_reparse_point(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_type().is_symlink()
        || metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
pub(crate) fn is_reparse_point(metadata: &Metadata) -> bool {
    metadata.file_type().is_symlink()
}

/// Whether an entry needs its metadata read to rule out a reparse point.
///
/// Outside Windows the directory entry's file type is enough.
#[cfg(windows)]
pub(crate) const NEEDS_METADATA: bool = true;

#[cfg(not(windows))]
pub(crate) const NEEDS_METADATA: bool = false;
