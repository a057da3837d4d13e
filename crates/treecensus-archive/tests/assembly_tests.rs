//! End-to-end tests from resolution through archive assembly.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use treecensus_archive::{ErrorLog, TARGETS_FILE_NAME, ZipAssembler, write_targets};
use treecensus_core::{CensusError, ExtensionFilter, RECORD_HEADER, Root};
use treecensus_scan::{HostProbe, PoolOptions, ReachabilityCache, RootResolver, ScanPool};

struct NoNetwork;

impl HostProbe for NoNetwork {
    fn probe(&self, _host: &str) -> bool {
        false
    }
}

/// Returns the single entry's name and content.
fn read_archive(path: &Path) -> (String, String) {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    let mut entry = archive.by_index(0).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    (entry.name().to_string(), content)
}

/// Resolve, scan and assemble every root into `out`.
fn census(roots: &[&str], filter: &ExtensionFilter, out: &Path) -> Vec<(Root, u64)> {
    let cache = ReachabilityCache::new(NoNetwork);
    let roots: Vec<Root> = roots.iter().filter_map(|r| Root::parse(r)).collect();
    let resolution = RootResolver::new(&cache).resolve(&roots);
    write_targets(&out.join(TARGETS_FILE_NAME), &resolution.audit_paths()).unwrap();

    let temp = out.join("tmp");
    fs::create_dir_all(&temp).unwrap();
    let options = PoolOptions {
        workers: 3,
        temp_dir: temp,
        echo_to_console: false,
        persist_errors: false,
    };
    let pool = ScanPool::new(&cache, filter, options);
    let assembler = ZipAssembler::new();

    resolution
        .roots
        .iter()
        .map(|resolved| {
            let outcome = pool.run(&resolved.root, &resolved.targets).unwrap();
            let archive = assembler
                .assemble_root(out, &resolved.root.tag(), RECORD_HEADER, &outcome.sinks)
                .unwrap();
            assert_eq!(archive.rows, outcome.stats.files);
            (resolved.root.clone(), archive.rows)
        })
        .collect()
}

fn data_rows(content: &str) -> Vec<(String, String, u64)> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        ["Root", "Path", "SizeBytes"]
    );
    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[1].to_string(), r[2].parse().unwrap())
        })
        .collect()
}

#[test]
fn test_empty_root_yields_header_only_archive() {
    let empty = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let results = census(
        &[empty.path().to_str().unwrap()],
        &ExtensionFilter::All,
        out.path(),
    );
    assert_eq!(results.len(), 1);
    let (root, rows) = &results[0];
    assert_eq!(*rows, 0);

    let targets = fs::read_to_string(out.path().join(TARGETS_FILE_NAME)).unwrap();
    let lines: Vec<&str> = targets.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Path");
    assert_eq!(lines[1], format!("\"{}\"", root.id()));

    let tag = root.tag();
    let (name, content) = read_archive(&out.path().join(tag.archive_name()));
    assert_eq!(name, tag.entry_name());
    assert_eq!(content, "Root,Path,SizeBytes\n");
}

#[test]
fn test_exe_filter_keeps_two_rows() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "x".repeat(10)).unwrap();
    fs::write(dir.path().join("b.exe"), "x".repeat(20)).unwrap();
    fs::write(dir.path().join("c.exe"), "x".repeat(5)).unwrap();
    let out = TempDir::new().unwrap();

    let filter = ExtensionFilter::from_extensions(["exe"]).unwrap();
    let results = census(&[dir.path().to_str().unwrap()], &filter, out.path());
    let (root, rows) = &results[0];
    assert_eq!(*rows, 2);

    let (_, content) = read_archive(&out.path().join(root.tag().archive_name()));
    let mut found: Vec<(String, u64)> = data_rows(&content)
        .into_iter()
        .map(|(r, path, size)| {
            assert_eq!(r, root.id());
            let name = Path::new(&path).file_name().unwrap().to_string_lossy().into_owned();
            (name, size)
        })
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![("b.exe".to_string(), 20), ("c.exe".to_string(), 5)]
    );
}

#[test]
fn test_unreachable_unc_root_is_skipped() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    for i in 0..3 {
        fs::write(dir.path().join(format!("f{i}.dat")), "data").unwrap();
    }
    fs::write(dir.path().join("sub").join("g.dat"), "data").unwrap();
    fs::write(dir.path().join("sub").join("h.dat"), "data").unwrap();
    let out = TempDir::new().unwrap();

    let unc = r"\\fileserver\share";
    let results = census(
        &[unc, dir.path().to_str().unwrap()],
        &ExtensionFilter::All,
        out.path(),
    );
    assert_eq!(results.len(), 1);
    let (root, rows) = &results[0];
    assert_eq!(*rows, 5);

    let targets = fs::read_to_string(out.path().join(TARGETS_FILE_NAME)).unwrap();
    assert!(!targets.contains("fileserver"));
    assert_eq!(targets.lines().count(), 3);

    let archives: Vec<PathBuf> = fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "zip"))
        .collect();
    assert_eq!(archives, vec![out.path().join(root.tag().archive_name())]);
}

#[test]
fn test_unreachable_root_logs_one_line() {
    let out = TempDir::new().unwrap();
    let cache = ReachabilityCache::new(NoNetwork);
    let roots = vec![Root::parse(r"\\fileserver\share\dept").unwrap()];
    let resolution = RootResolver::new(&cache).resolve(&roots);
    assert!(resolution.roots.is_empty());
    assert_eq!(resolution.skipped.len(), 1);

    let log_path = out.path().join("errors.log");
    let mut log = ErrorLog::new(&log_path, true);
    for skipped in &resolution.skipped {
        log.record_root(&skipped.raw, &skipped.reason).unwrap();
    }
    drop(log);

    let text = fs::read_to_string(&log_path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains(r"\\fileserver\share\dept"));
}

#[test]
fn test_existing_archive_is_replaced() {
    let out = TempDir::new().unwrap();
    let sink = out.path().join("w0.csv");
    fs::write(&sink, "\"r\",\"r/a\",1\n\"r\",\"r/b\",2\n").unwrap();
    let archive = out.path().join("r.zip");
    fs::write(&archive, "not a zip").unwrap();

    let rows = ZipAssembler::new()
        .assemble(&archive, "r.csv", RECORD_HEADER, &[sink.clone()])
        .unwrap();
    assert_eq!(rows, 2);
    assert!(!sink.exists());

    let (name, content) = read_archive(&archive);
    assert_eq!(name, "r.csv");
    assert_eq!(content, "Root,Path,SizeBytes\n\"r\",\"r/a\",1\n\"r\",\"r/b\",2\n");
}

#[test]
fn test_sinks_concatenate_in_order() {
    let out = TempDir::new().unwrap();
    let first = out.path().join("w0.csv");
    let second = out.path().join("w1.csv");
    fs::write(&first, "\"r\",\"one\",1\n").unwrap();
    // A sink without its final newline still yields separate rows.
    fs::write(&second, "\"r\",\"two\nlines\",2").unwrap();

    let archive = out.path().join("r.zip");
    let rows = ZipAssembler::new()
        .assemble(&archive, "r.csv", RECORD_HEADER, &[first, second])
        .unwrap();
    assert_eq!(rows, 2);

    let (_, content) = read_archive(&archive);
    let parsed = data_rows(&content);
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].1, "one");
    assert_eq!(parsed[1].1, "two\nlines");
}

#[test]
fn test_missing_sink_removes_partial_archive() {
    let out = TempDir::new().unwrap();
    let present = out.path().join("w0.csv");
    fs::write(&present, "\"r\",\"a\",1\n").unwrap();
    let missing = out.path().join("w1.csv");
    let archive = out.path().join("r.zip");

    let result =
        ZipAssembler::new().assemble(&archive, "r.csv", RECORD_HEADER, &[present.clone(), missing]);
    assert!(matches!(result, Err(CensusError::NotFound { .. })));
    assert!(!archive.exists());
    assert!(present.exists());
}
