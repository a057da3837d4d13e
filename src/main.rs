//! treecensus - inventory every file under local and network roots.
//!
//! Usage:
//!   treecensus C:\Data \\fileserver\share          Census two roots
//!   treecensus -t 16 -e exe,dll \\fileserver\apps   Only executables, 16 workers
//!   treecensus --roots-file roots.txt -o D:\census  Roots from a file
//!   treecensus --help                              Show help

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use treecensus::{Census, CensusConfig, DEFAULT_THROTTLE, RootOutcome, RootReport};

#[derive(Parser)]
#[command(
    name = "treecensus",
    version,
    about = "Memory-bounded file census of local and network roots",
    long_about = "treecensus lists every file under the given roots with its size.\n\n\
                  Each root becomes <RootTag>.zip holding <RootTag>.csv \
                  (Root,Path,SizeBytes) in a timestamped run directory, next \
                  to targets.csv and, with --verbose-errors, errors.log."
)]
struct Cli {
    /// Roots to scan: local directories or UNC shares (\\host\share)
    #[arg(required_unless_present = "roots_file")]
    roots: Vec<String>,

    /// Read additional roots from a file, one per line
    #[arg(long, value_name = "FILE")]
    roots_file: Option<PathBuf>,

    /// Scan workers per root
    #[arg(short, long, default_value_t = DEFAULT_THROTTLE)]
    throttle: usize,

    /// Only keep files with these extensions (e.g. "exe,dll")
    #[arg(short = 'e', long, value_delimiter = ',', value_name = "EXT")]
    include_ext: Vec<String>,

    /// Print each matched path as it is found
    #[arg(long)]
    echo_to_console: bool,

    /// Write every skipped root and failed subtree to errors.log
    #[arg(long)]
    verbose_errors: bool,

    /// Where to write the target audit (defaults to <run>/targets.csv)
    #[arg(long, value_name = "FILE")]
    target_file: Option<PathBuf>,

    /// Directory that receives the timestamped run directory
    #[arg(short, long, default_value = "census", value_name = "DIR")]
    output_dir: PathBuf,

    /// Directory for temporary sinks (defaults to <run>/tmp)
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Reachability probe timeout in milliseconds
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    probe_timeout_ms: u64,

    /// Write the run summary as JSON
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut roots = cli.roots;
    if let Some(path) = &cli.roots_file {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read roots file {}", path.display()))?;
        roots.extend(text.lines().map(str::to_string));
    }

    let config = CensusConfig::builder()
        .roots(roots)
        .throttle(cli.throttle)
        .include_ext(cli.include_ext)
        .echo_to_console(cli.echo_to_console)
        .verbose_errors(cli.verbose_errors)
        .targets_file(cli.target_file)
        .output_dir(cli.output_dir)
        .temp_dir(cli.temp_dir)
        .probe_timeout(Duration::from_millis(cli.probe_timeout_ms))
        .build()
        .wrap_err("Invalid configuration")?;

    let census = Census::new(config).wrap_err("Invalid configuration")?;
    let summary = census.run_with(print_status).wrap_err("Census failed")?;

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} root(s), {} archive(s), {} row(s) in {:.2}s",
        summary.roots.len(),
        summary.archived(),
        summary.total_rows(),
        summary.elapsed.as_secs_f64()
    );
    println!(" Targets: {}", summary.targets_file.display());
    println!(" Output:  {}", summary.run_dir.display());
    match &summary.error_log {
        Some(path) => println!(" Errors were logged to {}", path.display()),
        None if census.config().verbose_errors => println!(" No errors logged."),
        None => {
            let failures: u64 = summary
                .roots
                .iter()
                .filter_map(|r| r.stats.as_ref())
                .map(|s| s.failures)
                .sum();
            if failures > 0 || summary.has_failures() {
                println!(" Some items failed; rerun with --verbose-errors for details.");
            } else {
                println!(" No errors.");
            }
        }
    }
    println!("{}", "─".repeat(60));

    if let Some(path) = &cli.summary_json {
        summary
            .write_json(path)
            .wrap_err_with(|| format!("Failed to write summary to {}", path.display()))?;
    }

    if summary.archived() == 0 {
        bail!("No root produced an archive");
    }

    Ok(())
}

/// One status line per finished root.
fn print_status(report: &RootReport) {
    match &report.outcome {
        RootOutcome::Archived { archive, rows } => {
            let (bytes, secs) = report
                .stats
                .as_ref()
                .map(|s| (s.bytes, s.elapsed.as_secs_f64()))
                .unwrap_or_default();
            println!(
                "[OK]      {} - {rows} file(s), {} in {secs:.2}s -> {}",
                report.root,
                format_size(bytes),
                archive.display()
            );
        }
        RootOutcome::Failed { reason } => {
            println!("[FAILED]  {} - {reason}", report.root);
        }
        RootOutcome::Skipped { reason } => {
            println!("[SKIPPED] {} - {reason}", report.root);
        }
    }
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("treecensus=debug,warn")
        } else {
            EnvFilter::new("treecensus=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(verbose)
        .init();
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
