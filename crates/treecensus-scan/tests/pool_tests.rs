//! Integration tests for resolving and scanning a root with the worker pool.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use treecensus_scan::{
    CensusError, ExtensionFilter, HostProbe, PoolOptions, ReachabilityCache, Root, RootResolver,
    ScanPool,
};

struct NoNetwork;

impl HostProbe for NoNetwork {
    fn probe(&self, _host: &str) -> bool {
        false
    }
}

/// Root with files at several depths.
fn create_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(root.join("top.txt"), "1234").unwrap();
    fs::write(root.join("setup.EXE"), "123456").unwrap();
    for sub in ["alpha", "beta", "gamma"] {
        fs::create_dir_all(root.join(sub).join("nested").join("deeper")).unwrap();
        fs::write(root.join(sub).join("readme.md"), "hello").unwrap();
        fs::write(root.join(sub).join("tool.exe"), "x".repeat(20)).unwrap();
        fs::write(root.join(sub).join("nested").join("data.bin"), "x".repeat(100)).unwrap();
        fs::write(
            root.join(sub).join("nested").join("deeper").join("a.exe"),
            "x".repeat(7),
        )
        .unwrap();
    }
    fs::create_dir(root.join("empty")).unwrap();
    dir
}

/// Resolve and scan `root` and return every recorded (path, size).
fn scan(root: &Path, workers: usize, filter: &ExtensionFilter) -> BTreeSet<(String, u64)> {
    let cache = ReachabilityCache::new(NoNetwork);
    let root = Root::parse(root.to_str().unwrap()).unwrap();
    let targets = RootResolver::new(&cache).resolve_root(&root).unwrap().targets;

    let temp = TempDir::new().unwrap();
    let options = PoolOptions {
        workers,
        temp_dir: temp.path().to_path_buf(),
        echo_to_console: false,
        persist_errors: false,
    };
    let outcome = ScanPool::new(&cache, filter, options)
        .run(&root, &targets)
        .unwrap();

    let rows = read_sinks(&outcome.sinks);
    assert_eq!(rows.len() as u64, outcome.stats.files);
    rows.into_iter()
        .map(|(row_root, path, size)| {
            assert_eq!(row_root, root.id());
            (path, size)
        })
        .collect()
}

fn read_sinks(sinks: &[PathBuf]) -> Vec<(String, String, u64)> {
    let mut rows = Vec::new();
    for sink in sinks {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(sink)
            .unwrap();
        for record in reader.records() {
            let record = record.unwrap();
            rows.push((
                record[0].to_string(),
                record[1].to_string(),
                record[2].parse().unwrap(),
            ));
        }
    }
    rows
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_every_file_exactly_once() {
    let tree = create_tree();
    let rows = scan(tree.path(), 4, &ExtensionFilter::All);

    // 2 files at the root, 4 per subdirectory.
    assert_eq!(rows.len(), 14);
    let paths: BTreeSet<&str> = rows.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths.len(), rows.len());

    let sizes: u64 = rows.iter().map(|(_, s)| s).sum();
    assert_eq!(sizes, 4 + 6 + 3 * (5 + 20 + 100 + 7));
}

#[test]
fn test_worker_count_does_not_change_results() {
    let tree = create_tree();
    let one = scan(tree.path(), 1, &ExtensionFilter::All);
    let many = scan(tree.path(), 8, &ExtensionFilter::All);
    assert_eq!(one, many);
}

#[test]
fn test_single_extension_matches_filtered_full_scan() {
    let tree = create_tree();
    let full = scan(tree.path(), 3, &ExtensionFilter::All);
    let filter = ExtensionFilter::from_extensions(["exe"]).unwrap();
    assert!(filter.prunes_at_source());
    let filtered = scan(tree.path(), 3, &filter);

    let expected: BTreeSet<(String, u64)> = full
        .into_iter()
        .filter(|(path, _)| file_name(path).to_lowercase().ends_with(".exe"))
        .collect();
    assert_eq!(filtered, expected);
    assert_eq!(filtered.len(), 7);
}

#[test]
fn test_extension_set() {
    let tree = create_tree();
    let filter = ExtensionFilter::from_extensions([".md", "BIN"]).unwrap();
    let rows = scan(tree.path(), 2, &filter);

    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|(path, _)| {
        let name = file_name(path);
        name.ends_with(".md") || name.ends_with(".bin")
    }));
}

#[test]
fn test_empty_root_produces_no_sinks() {
    let dir = TempDir::new().unwrap();
    let cache = ReachabilityCache::new(NoNetwork);
    let root = Root::parse(dir.path().to_str().unwrap()).unwrap();
    let targets = RootResolver::new(&cache).resolve_root(&root).unwrap().targets;
    assert_eq!(targets.len(), 1);

    let temp = TempDir::new().unwrap();
    let options = PoolOptions {
        workers: 4,
        temp_dir: temp.path().to_path_buf(),
        echo_to_console: false,
        persist_errors: true,
    };
    let filter = ExtensionFilter::All;
    let outcome = ScanPool::new(&cache, &filter, options)
        .run(&root, &targets)
        .unwrap();

    assert!(outcome.sinks.is_empty());
    assert!(outcome.error_buffers.is_empty());
    assert_eq!(outcome.stats.targets_scanned, 1);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_temp_dir_fails_the_root() {
    let tree = create_tree();
    let cache = ReachabilityCache::new(NoNetwork);
    let root = Root::parse(tree.path().to_str().unwrap()).unwrap();
    let targets = RootResolver::new(&cache).resolve_root(&root).unwrap().targets;

    let options = PoolOptions {
        workers: 2,
        temp_dir: tree.path().join("no").join("such").join("dir"),
        echo_to_console: false,
        persist_errors: false,
    };
    let filter = ExtensionFilter::All;
    let result = ScanPool::new(&cache, &filter, options).run(&root, &targets);
    assert!(matches!(
        result,
        Err(CensusError::NotFound { .. } | CensusError::Io { .. })
    ));
}

#[cfg(unix)]
#[test]
fn test_symlinked_subtrees_never_appear() {
    let tree = create_tree();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret.exe"), "zzz").unwrap();
    std::os::unix::fs::symlink(outside.path(), tree.path().join("link")).unwrap();
    std::os::unix::fs::symlink(outside.path(), tree.path().join("alpha").join("link")).unwrap();

    let rows = scan(tree.path(), 4, &ExtensionFilter::All);
    assert_eq!(rows.len(), 14);
    assert!(rows.iter().all(|(path, _)| !path.contains("secret")));
}
