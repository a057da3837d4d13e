//! Fixed-size worker pool for one root.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use crossbeam_channel::unbounded;
use tracing::{info, warn};

use treecensus_core::{CensusError, ExtensionFilter, Root, Target};

use crate::progress::ScanStats;
use crate::queue::WorkQueue;
use crate::reachability::ReachabilityCache;
use crate::worker::{ScanWorker, WorkerContext, WorkerReport};

/// Pool settings, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of workers per root.
    pub workers: usize,
    /// Directory holding sinks and error buffers.
    pub temp_dir: PathBuf,
    /// Print each recorded path to stdout.
    pub echo_to_console: bool,
    /// Keep failure lines on disk for the run's error log.
    pub persist_errors: bool,
}

/// What a finished scan phase hands to the assembler.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Non-empty sinks, in worker order.
    pub sinks: Vec<PathBuf>,
    /// Non-empty error buffers, in worker order.
    pub error_buffers: Vec<PathBuf>,
    /// Counters merged across workers.
    pub stats: ScanStats,
}

/// Runs a pool of [`ScanWorker`]s over one root's targets.
///
/// The queue and the reachability cache are the only state the workers
/// share. Sinks and error buffers stay private to their worker until its
/// [`WorkerReport`] arrives on the completion channel.
pub struct ScanPool<'a> {
    cache: &'a ReachabilityCache,
    filter: &'a ExtensionFilter,
    options: PoolOptions,
}

impl<'a> ScanPool<'a> {
    /// Create a pool sharing the run's cache and filter.
    pub fn new(
        cache: &'a ReachabilityCache,
        filter: &'a ExtensionFilter,
        options: PoolOptions,
    ) -> Self {
        Self {
            cache,
            filter,
            options,
        }
    }

    /// Scan every target of `root` exactly once.
    ///
    /// Per-target problems are recorded by the workers. An error is
    /// returned only if a worker could not write its own files or died;
    /// every temp file of this root is then removed.
    pub fn run(&self, root: &Root, targets: &[Target]) -> Result<PoolOutcome, CensusError> {
        let start = Instant::now();
        let tag = root.tag();
        let root_id = root.id();

        // More workers than targets would only create empty sinks.
        let workers = self.options.workers.max(1).min(targets.len().max(1));
        let queue = WorkQueue::closed(targets.iter().cloned());

        let sink_paths: Vec<PathBuf> = (0..workers)
            .map(|id| self.options.temp_dir.join(format!("{tag}.w{id}.csv")))
            .collect();
        let error_paths: Vec<PathBuf> = (0..workers)
            .map(|id| self.options.temp_dir.join(format!("{tag}.w{id}.errors.log")))
            .collect();

        let ctx = WorkerContext {
            root_id: &root_id,
            filter: self.filter,
            cache: self.cache,
            echo_to_console: self.options.echo_to_console,
            persist_errors: self.options.persist_errors,
        };

        info!(
            "Scanning {} target(s) of {} with {workers} worker(s)",
            targets.len(),
            root.path.display()
        );

        let (report_tx, report_rx) = unbounded::<(usize, Result<WorkerReport, CensusError>)>();

        let joined: Result<Vec<usize>, CensusError> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let queue = queue.clone();
                let report_tx = report_tx.clone();
                let ctx = &ctx;
                let sink_path = &sink_paths[id];
                let error_path = &error_paths[id];

                let handle = thread::Builder::new()
                    .name(format!("census-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        let result = ScanWorker::new(id, ctx, sink_path, error_path)
                            .and_then(|worker| worker.run(&queue));
                        let _ = report_tx.send((id, result));
                    })
                    .map_err(|e| CensusError::io(&self.options.temp_dir, e))?;
                handles.push((id, handle));
            }

            Ok(handles
                .into_iter()
                .filter_map(|(id, handle)| handle.join().err().map(|_| id))
                .collect())
        });
        drop(report_tx);

        let mut outcome = PoolOutcome::default();
        let mut failure = match joined {
            Ok(panicked) => panicked
                .first()
                .map(|&worker| CensusError::WorkerPanicked { worker }),
            Err(err) => Some(err),
        };

        let mut reports: Vec<WorkerReport> = Vec::with_capacity(workers);
        for (id, result) in report_rx.iter() {
            match result {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!("Worker {id} failed: {err}");
                    failure.get_or_insert(err);
                }
            }
        }

        if let Some(err) = failure {
            remove_all(sink_paths.iter().chain(error_paths.iter()));
            return Err(err);
        }

        reports.sort_by_key(|r| r.worker);
        for report in reports {
            outcome.stats.merge(&report.stats);
            outcome.sinks.extend(report.sink);
            outcome.error_buffers.extend(report.errors);
        }
        outcome.stats.elapsed = start.elapsed();

        Ok(outcome)
    }
}

/// Best-effort removal of temp files.
pub fn remove_all<'p>(paths: impl IntoIterator<Item = &'p PathBuf>) {
    for path in paths {
        if path.exists() {
            if let Err(err) = fs::remove_file(path) {
                warn!("Could not remove {}: {err}", path.display());
            }
        }
    }
}
