//! Orchestration of one census run.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, warn};

use treecensus_archive::{ErrorLog, ZipAssembler, write_targets};
use treecensus_core::{
    CensusConfig, CensusError, ExtensionFilter, RECORD_HEADER, RootTag, SubtreeFailure,
};
use treecensus_scan::{
    HostProbe, PoolOptions, ReachabilityCache, ResolvedRoot, RootResolver, ScanPool, TcpProbe,
    remove_all,
};

use crate::context::RunContext;
use crate::summary::{RootOutcome, RootReport, RunSummary};

/// A configured census, ready to run.
///
/// Roots are processed one at a time. Each root's failure, whether at
/// resolution, scanning or assembly, is reported in the summary and never
/// stops the other roots.
pub struct Census {
    config: CensusConfig,
    filter: ExtensionFilter,
    cache: ReachabilityCache,
}

impl Census {
    /// Create a census that probes network hosts over TCP.
    pub fn new(config: CensusConfig) -> Result<Self, CensusError> {
        let probe = TcpProbe::new(config.probe_port, config.probe_timeout);
        Self::with_probe(config, probe)
    }

    /// Create a census with a custom reachability probe.
    ///
    /// Fails with [`CensusError::InvalidConfig`] when no root is usable or
    /// the extension list is malformed.
    pub fn with_probe(
        config: CensusConfig,
        probe: impl HostProbe + 'static,
    ) -> Result<Self, CensusError> {
        config.parsed_roots()?;
        if config.throttle == 0 {
            return Err(CensusError::invalid_config("throttle must be at least 1"));
        }
        let filter = config.extension_filter()?;
        Ok(Self {
            config,
            filter,
            cache: ReachabilityCache::new(probe),
        })
    }

    /// The run configuration.
    pub fn config(&self) -> &CensusConfig {
        &self.config
    }

    /// Run the census.
    pub fn run(&self) -> Result<RunSummary, CensusError> {
        self.run_with(|_| {})
    }

    /// Run the census, calling `on_root` as each root finishes.
    ///
    /// Only failures that affect the whole run are returned as errors:
    /// creating the run directory or writing the target audit.
    pub fn run_with(&self, mut on_root: impl FnMut(&RootReport)) -> Result<RunSummary, CensusError> {
        let start = Instant::now();
        let roots = self.config.parsed_roots()?;
        let ctx = RunContext::create(&self.config.output_dir, self.config.temp_dir.as_deref())?;
        let mut error_log = ErrorLog::new(ctx.error_log_path(), self.config.verbose_errors);

        info!("Resolving {} root(s)", roots.len());
        let resolution = RootResolver::new(&self.cache).resolve(&roots);

        let mut reports = Vec::with_capacity(roots.len());
        for skipped in &resolution.skipped {
            log_incident(&mut error_log, |log| {
                log.record_root(skipped.raw.trim(), &skipped.reason)
            });
            let report = RootReport::skipped(skipped.raw.trim(), &skipped.reason);
            on_root(&report);
            reports.push(report);
        }
        log_failures(
            &mut error_log,
            resolution.roots.iter().flat_map(|r| &r.failures),
        );

        let targets_file = ctx.targets_path(self.config.targets_file.as_deref());
        let audit = resolution.audit_paths();
        write_targets(&targets_file, &audit)?;
        info!(
            "Wrote {} target(s) to {}",
            audit.len(),
            targets_file.display()
        );

        let pool = ScanPool::new(
            &self.cache,
            &self.filter,
            PoolOptions {
                workers: self.config.workers(),
                temp_dir: ctx.temp_dir.clone(),
                echo_to_console: self.config.echo_to_console,
                persist_errors: self.config.verbose_errors,
            },
        );
        let assembler = ZipAssembler::new();
        let mut tags = HashSet::new();

        for resolved in &resolution.roots {
            let tag = unique_tag(resolved.root.tag(), &mut tags);
            let report = self.census_root(resolved, tag, &pool, &assembler, &ctx, &mut error_log);
            on_root(&report);
            reports.push(report);
        }

        log_incident(&mut error_log, ErrorLog::flush);
        ctx.finish();

        let summary = RunSummary {
            started: ctx.started,
            elapsed: start.elapsed(),
            run_dir: ctx.run_dir.clone(),
            targets_file,
            targets: audit.len(),
            error_log: error_log
                .has_entries()
                .then(|| error_log.path().to_path_buf()),
            roots: reports,
        };
        info!(
            "Census finished: {} archive(s), {} row(s) in {:.2}s",
            summary.archived(),
            summary.total_rows(),
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Scan one resolved root and assemble its archive.
    fn census_root(
        &self,
        resolved: &ResolvedRoot,
        tag: RootTag,
        pool: &ScanPool<'_>,
        assembler: &ZipAssembler,
        ctx: &RunContext,
        error_log: &mut ErrorLog,
    ) -> RootReport {
        let root = &resolved.root;
        let mut report = RootReport {
            root: root.raw.trim().to_string(),
            tag: Some(tag.to_string()),
            targets: resolved.targets.len(),
            stats: None,
            outcome: RootOutcome::Failed {
                reason: String::new(),
            },
        };

        let outcome = match pool.run(root, &resolved.targets) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Scan of {} failed: {err}", root.path.display());
                log_incident(error_log, |log| log.record_root(&report.root, &err));
                report.outcome = RootOutcome::Failed {
                    reason: err.to_string(),
                };
                return report;
            }
        };

        for buffer in &outcome.error_buffers {
            log_incident(error_log, |log| log.merge_buffer(buffer).map(|_| ()));
        }
        report.stats = Some(outcome.stats.clone());

        match assembler.assemble_root(&ctx.run_dir, &tag, RECORD_HEADER, &outcome.sinks) {
            Ok(archive) => {
                info!(
                    "Archived {} row(s) of {} to {}",
                    archive.rows,
                    root.path.display(),
                    archive.path.display()
                );
                report.outcome = RootOutcome::Archived {
                    archive: archive.path,
                    rows: archive.rows,
                };
            }
            Err(err) => {
                warn!("Assembly of {} failed: {err}", root.path.display());
                remove_all(&outcome.sinks);
                log_incident(error_log, |log| log.record_root(&report.root, &err));
                report.outcome = RootOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        }

        report
    }
}

/// Give colliding tags a numeric suffix so no archive overwrites another.
fn unique_tag(tag: RootTag, used: &mut HashSet<RootTag>) -> RootTag {
    let mut candidate = tag.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = tag.with_suffix(n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Log entries of resolved roots that could not be inspected.
fn log_failures<'a>(log: &mut ErrorLog, failures: impl IntoIterator<Item = &'a SubtreeFailure>) {
    for failure in failures {
        let line = failure.to_log_line();
        warn!("{line}");
        log_incident(log, |log| log.record(&line));
    }
}

/// Error log writes never abort the run.
fn log_incident(
    log: &mut ErrorLog,
    write: impl FnOnce(&mut ErrorLog) -> Result<(), CensusError>,
) {
    if let Err(err) = write(log) {
        warn!("Could not write {}: {err}", log.path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use treecensus_core::FailureKind;

    struct Down;

    impl HostProbe for Down {
        fn probe(&self, _host: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_unique_tag() {
        let mut used = HashSet::new();
        let a = unique_tag(RootTag::derive("/a/b", false), &mut used);
        let b = unique_tag(RootTag::derive("/a_b", false), &mut used);
        let c = unique_tag(RootTag::derive("a/b", false), &mut used);

        assert_eq!(a.as_str(), "a_b");
        assert_eq!(b.as_str(), "a_b_2");
        assert_eq!(c.as_str(), "a_b_3");
    }

    #[test]
    fn test_rejects_config_without_roots() {
        let config = CensusConfig::new(["  ", ""]);
        assert!(matches!(
            Census::with_probe(config, Down),
            Err(CensusError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_throttle() {
        let mut config = CensusConfig::new(["/data"]);
        config.throttle = 0;
        assert!(Census::with_probe(config, Down).is_err());
    }

    #[test]
    fn test_resolution_failures_reach_error_log() {
        let out = TempDir::new().unwrap();
        let path = out.path().join("errors.log");
        let mut log = ErrorLog::new(&path, true);
        let failures = [SubtreeFailure::new(
            "/data",
            "/data/broken",
            "stale handle",
            FailureKind::MetadataError,
        )];

        log_failures(&mut log, &failures);
        log.flush().unwrap();

        assert!(log.has_entries());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[metadata error]"));
        assert!(text.contains("broken"));
    }
}
