//! A single scan worker: drains the queue into its private sink.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use treecensus_core::{
    CensusError, ExtensionFilter, FailureKind, FileRecord, SubtreeFailure, Target, TargetDepth,
};

use crate::progress::ScanStats;
use crate::queue::WorkQueue;
use crate::reachability::ReachabilityCache;
use crate::reparse::{NEEDS_METADATA, is_reparse_point};
use crate::sink::TempSink;

/// Read-only state shared by every worker of one root.
#[derive(Debug)]
pub struct WorkerContext<'a> {
    /// Identifier written into every record.
    pub root_id: &'a str,
    /// Extension filter strategy for the run.
    pub filter: &'a ExtensionFilter,
    /// Run-wide reachability cache.
    pub cache: &'a ReachabilityCache,
    /// Print each recorded path to stdout.
    pub echo_to_console: bool,
    /// Keep failure lines on disk for the run's error log.
    pub persist_errors: bool,
}

/// What a worker hands back to the coordinator once the queue is drained.
#[derive(Debug)]
pub struct WorkerReport {
    /// Worker index.
    pub worker: usize,
    /// Sink file, if it holds at least one row.
    pub sink: Option<PathBuf>,
    /// Error buffer file, if anything was written to it.
    pub errors: Option<PathBuf>,
    /// Worker counters.
    pub stats: ScanStats,
}

/// Scans targets taken from a [`WorkQueue`] into one [`TempSink`].
pub struct ScanWorker<'a> {
    id: usize,
    ctx: &'a WorkerContext<'a>,
    sink: TempSink,
    errors: ErrorBuffer,
    stats: ScanStats,
    echo: Option<Box<dyn Write + Send>>,
}

impl<'a> ScanWorker<'a> {
    /// Create a worker with its sink and error buffer paths.
    pub fn new(
        id: usize,
        ctx: &'a WorkerContext<'a>,
        sink_path: impl Into<PathBuf>,
        error_path: impl Into<PathBuf>,
    ) -> Result<Self, CensusError> {
        Ok(Self {
            id,
            ctx,
            sink: TempSink::create(sink_path)?,
            errors: ErrorBuffer::new(error_path, ctx.persist_errors),
            stats: ScanStats::new(),
            echo: ctx
                .echo_to_console
                .then(|| Box::new(io::stdout()) as Box<dyn Write + Send>),
        })
    }

    /// Take targets until the queue is drained, then close the sink.
    ///
    /// Scanning problems are recorded and skipped. Only a failure to write
    /// the worker's own sink or error buffer ends the worker early, in which
    /// case both files are deleted before the error is returned.
    pub fn run(mut self, queue: &WorkQueue) -> Result<WorkerReport, CensusError> {
        let start = Instant::now();
        let mut outcome = Ok(());
        while let Some(target) = queue.take() {
            outcome = self.scan_target(&target);
            if outcome.is_err() {
                break;
            }
        }
        self.stats.elapsed = start.elapsed();

        let Self {
            id,
            sink,
            errors,
            stats,
            ..
        } = self;

        if let Err(err) = outcome {
            sink.discard();
            errors.discard();
            return Err(err);
        }

        let sink = match sink.finish() {
            Ok(sink) => sink,
            Err(err) => {
                errors.discard();
                return Err(err);
            }
        };
        let errors = errors.finish()?;

        debug!(
            "Worker {id} done: {} target(s), {} file(s), {} failure(s)",
            stats.targets_scanned, stats.files, stats.failures
        );

        Ok(WorkerReport {
            worker: id,
            sink,
            errors,
            stats,
        })
    }

    /// Scan one target into the sink.
    fn scan_target(&mut self, target: &Target) -> Result<(), CensusError> {
        if target.is_network() && !self.ctx.cache.is_path_reachable(&target.path.to_string_lossy())
        {
            return self.skip_target(target, FailureKind::Unreachable, "host unreachable");
        }

        match fs::symlink_metadata(&target.path) {
            Err(err) => {
                let failure = SubtreeFailure::from_io(&target.path, &target.path, &err);
                self.stats.targets_skipped += 1;
                return self.record(failure);
            }
            Ok(metadata) if is_reparse_point(&metadata) || !metadata.is_dir() => {
                debug!("Worker {} skipping non-directory {}", self.id, target.path.display());
                self.stats.targets_skipped += 1;
                return Ok(());
            }
            Ok(_) => {}
        }

        debug!("Worker {} scanning {}", self.id, target.path.display());

        let filter = self.ctx.filter;
        for entry_result in walker(target, filter) {
            let mut entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().unwrap_or(target.path.as_path()).to_path_buf();
                    self.record(walk_failure(target, &path, &err))?;
                    continue;
                }
            };

            // A directory that could not be listed carries the error itself.
            if let Some(err) = entry.read_children_error.take() {
                let path = entry.path();
                self.record(walk_failure(target, &path, &err))?;
                if entry.depth == 0 {
                    self.stats.targets_skipped += 1;
                }
                continue;
            }
            if entry.depth == 0 {
                self.stats.targets_scanned += 1;
                continue;
            }
            if entry.file_type.is_dir() || entry.file_type.is_symlink() {
                continue;
            }
            if !filter.prunes_at_source() && !filter.matches_name(entry.file_name()) {
                continue;
            }

            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    self.record(SubtreeFailure::new(
                        &target.path,
                        &path,
                        err.to_string(),
                        FailureKind::MetadataError,
                    ))?;
                    continue;
                }
            };
            if NEEDS_METADATA && is_reparse_point(&metadata) {
                continue;
            }

            let size = metadata.len();
            self.sink
                .append(&FileRecord::new(self.ctx.root_id, &path, size))?;
            self.stats.record_file(size);

            self.echo(&path);
        }

        Ok(())
    }

    /// Print a recorded path. Echo stops for this worker once stdout
    /// refuses a write, e.g. a closed pipe.
    fn echo(&mut self, path: &Path) {
        let Some(out) = self.echo.as_mut() else {
            return;
        };
        if let Err(err) = writeln!(out, "{}", path.display()) {
            debug!("Worker {} stops echoing: {err}", self.id);
            self.echo = None;
        }
    }

    /// Record a target that was not scanned at all.
    fn skip_target(
        &mut self,
        target: &Target,
        kind: FailureKind,
        message: &str,
    ) -> Result<(), CensusError> {
        warn!("Skipping {}: {message}", target.path.display());
        self.stats.targets_skipped += 1;
        self.record(SubtreeFailure::new(&target.path, &target.path, message, kind))
    }

    fn record(&mut self, failure: SubtreeFailure) -> Result<(), CensusError> {
        debug!("Worker {}: {}", self.id, failure.to_log_line());
        self.stats.failures += 1;
        self.errors.record(&failure)
    }
}

/// Classify a listing error under `target`.
fn walk_failure(target: &Target, path: &Path, err: &jwalk::Error) -> SubtreeFailure {
    let kind = match err.io_error().map(|e| e.kind()) {
        Some(io::ErrorKind::PermissionDenied) => FailureKind::PermissionDenied,
        Some(io::ErrorKind::NotFound) => FailureKind::Missing,
        _ => FailureKind::ReadError,
    };
    SubtreeFailure::new(&target.path, path, err.to_string(), kind)
}

/// Build the walker for one target.
///
/// The target itself is yielded at depth 0 so a failure to list it is
/// seen. Reparse points are dropped while each directory is read, so they
/// are neither yielded nor descended into. A single-extension filter drops
/// non-matching files at the same point.
fn walker(target: &Target, filter: &ExtensionFilter) -> WalkDir {
    let max_depth = match target.depth {
        TargetDepth::Shallow => 1,
        TargetDepth::Recursive => usize::MAX,
    };
    let source_filter = filter.prunes_at_source().then(|| filter.clone());

    WalkDir::new(&target.path)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .max_depth(max_depth)
        .process_read_dir(move |_depth, _path, _state, children| {
            children.retain(|child| match child {
                Ok(entry) => keep_entry(entry, source_filter.as_ref()),
                Err(_) => true,
            });
        })
}

fn keep_entry(entry: &jwalk::DirEntry<((), ())>, source_filter: Option<&ExtensionFilter>) -> bool {
    if entry.file_type.is_symlink() {
        return false;
    }
    if NEEDS_METADATA && entry.metadata().is_ok_and(|m| is_reparse_point(&m)) {
        return false;
    }
    match source_filter {
        Some(filter) if !entry.file_type.is_dir() => filter.matches_name(entry.file_name()),
        _ => true,
    }
}

/// Worker-local failure buffer, backed by a file when failures are kept.
struct ErrorBuffer {
    path: PathBuf,
    persist: bool,
    writer: Option<BufWriter<File>>,
}

impl ErrorBuffer {
    fn new(path: impl Into<PathBuf>, persist: bool) -> Self {
        Self {
            path: path.into(),
            persist,
            writer: None,
        }
    }

    fn record(&mut self, failure: &SubtreeFailure) -> Result<(), CensusError> {
        if !self.persist {
            return Ok(());
        }
        if self.writer.is_none() {
            let file = File::create(&self.path).map_err(|e| CensusError::io(&self.path, e))?;
            self.writer = Some(BufWriter::new(file));
        }
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", failure.to_log_line())
                .map_err(|e| CensusError::io(&self.path, e))?;
        }
        Ok(())
    }

    fn finish(self) -> Result<Option<PathBuf>, CensusError> {
        match self.writer {
            Some(mut writer) => {
                writer.flush().map_err(|e| CensusError::io(&self.path, e))?;
                Ok(Some(self.path))
            }
            None => Ok(None),
        }
    }

    fn discard(self) {
        if let Some(writer) = self.writer {
            drop(writer);
            let _ = fs::remove_file(&self.path);
        }
    }
}
