//! Stage 1: turn raw roots into deduplicated, sorted target lists.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use treecensus_core::{CensusError, FailureKind, Root, SubtreeFailure, Target};

use crate::reachability::ReachabilityCache;
use crate::reparse::is_reparse_point;

/// A root that passed resolution, with its targets.
#[derive(Debug, Clone)]
pub struct ResolvedRoot {
    /// The resolved root.
    pub root: Root,
    /// The root itself plus its immediate non-reparse subdirectories,
    /// deduplicated and sorted.
    pub targets: Vec<Target>,
    /// Root entries that could not be inspected while listing it.
    pub failures: Vec<SubtreeFailure>,
}

/// A root that was skipped, with the reason.
#[derive(Debug)]
pub struct SkippedRoot {
    /// Input string of the skipped root.
    pub raw: String,
    /// Why it was skipped.
    pub reason: CensusError,
}

/// Result of resolving every root of a run.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Roots to scan, in input order.
    pub roots: Vec<ResolvedRoot>,
    /// Roots that were skipped.
    pub skipped: Vec<SkippedRoot>,
}

impl Resolution {
    /// Every discovered target path, deduplicated and sorted, for the
    /// targets audit file.
    pub fn audit_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .roots
            .iter()
            .flat_map(|r| r.targets.iter().map(|t| t.path.clone()))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Total number of targets across roots.
    pub fn target_count(&self) -> usize {
        self.roots.iter().map(|r| r.targets.len()).sum()
    }
}

/// Resolves roots to targets, gating network roots on reachability.
pub struct RootResolver<'a> {
    cache: &'a ReachabilityCache,
}

impl<'a> RootResolver<'a> {
    /// Create a resolver sharing the run's reachability cache.
    pub fn new(cache: &'a ReachabilityCache) -> Self {
        Self { cache }
    }

    /// Resolve all roots. A failing root is recorded in
    /// [`Resolution::skipped`] and never affects the others.
    pub fn resolve(&self, roots: &[Root]) -> Resolution {
        let mut resolution = Resolution::default();

        for root in roots {
            match self.resolve_root(root) {
                Ok(resolved) => {
                    info!(
                        "Resolved {} to {} target(s)",
                        root.path.display(),
                        resolved.targets.len()
                    );
                    resolution.roots.push(resolved);
                }
                Err(reason) => {
                    warn!("Skipping root {}: {reason}", root.raw.trim());
                    resolution.skipped.push(SkippedRoot {
                        raw: root.raw.clone(),
                        reason,
                    });
                }
            }
        }

        resolution
    }

    /// Resolve a single root to its target list.
    ///
    /// Entries of the root that cannot be read are kept as failures in the
    /// result; only a root that cannot be listed at all is an error.
    pub fn resolve_root(&self, root: &Root) -> Result<ResolvedRoot, CensusError> {
        if let Some(host) = root.host() {
            if !self.cache.is_reachable(host) {
                return Err(CensusError::RootUnreachable {
                    host: host.to_string(),
                });
            }
        }

        let metadata = fs::metadata(&root.path).map_err(|e| CensusError::io(&root.path, e))?;
        if !metadata.is_dir() {
            return Err(CensusError::NotADirectory {
                path: root.path.clone(),
            });
        }

        let entries = fs::read_dir(&root.path).map_err(|e| CensusError::io(&root.path, e))?;
        let (mut targets, failures) = subdirectory_targets(&root.path, entries);
        targets.push(Target::root(&root.path));
        targets.sort();
        targets.dedup();

        Ok(ResolvedRoot {
            root: root.clone(),
            targets,
            failures,
        })
    }
}

/// Split the entries of `root` into subtree targets and failures.
fn subdirectory_targets(
    root: &Path,
    entries: impl IntoIterator<Item = io::Result<fs::DirEntry>>,
) -> (Vec<Target>, Vec<SubtreeFailure>) {
    let mut targets = Vec::new();
    let mut failures = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!("Unreadable entry under {}: {err}", root.display());
                failures.push(SubtreeFailure::from_io(root, root, &err));
                continue;
            }
        };

        // Un-followed metadata: a junction or symlink to a directory must
        // show up as a reparse point here, never as a directory.
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                debug!("No metadata for {}: {err}", entry.path().display());
                failures.push(SubtreeFailure::new(
                    root,
                    entry.path(),
                    err.to_string(),
                    FailureKind::MetadataError,
                ));
                continue;
            }
        };
        if is_reparse_point(&metadata) {
            debug!("Excluding reparse point {}", entry.path().display());
            continue;
        }
        if metadata.is_dir() {
            targets.push(Target::subtree(entry.path()));
        }
    }

    (targets, failures)
}
