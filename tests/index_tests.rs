use fanout_pool::{crawl, index_tree, FileRecord, IndexError, MemoryStore, PoolConfig, PoolError, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fanout_pool=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

fn write_file(path: &Path, len: usize) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, vec![b'x'; len]).unwrap();
}

/// Builds a small tree and returns it with the expected records, sorted.
fn sample_tree() -> (TempDir, Vec<FileRecord>) {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();

  let files: &[(&str, usize)] = &[
    ("top.txt", 3),
    ("a/one.bin", 10),
    ("a/two.bin", 0),
    ("a/deep/er/three.log", 42),
    ("b/four", 7),
  ];
  for (relative, len) in files {
    write_file(&root.join(relative), *len);
  }
  fs::create_dir_all(root.join("empty/nested")).unwrap();

  let mut expected: Vec<FileRecord> = files
    .iter()
    .map(|(relative, len)| FileRecord::new(root.join(relative), *len as u64))
    .collect();
  expected.sort();
  (dir, expected)
}

#[test]
fn test_crawl_finds_every_regular_file() {
  setup_tracing_for_test();
  let (dir, expected) = sample_tree();

  for workers in [1, 4] {
    let found = crawl(dir.path(), PoolConfig::new(workers).with_name("crawl")).unwrap();
    assert_eq!(found, expected, "workers = {}", workers);
  }
}

#[cfg(unix)]
#[test]
fn test_crawl_skips_symlinks() {
  setup_tracing_for_test();
  let (dir, expected) = sample_tree();
  let root = dir.path();

  std::os::unix::fs::symlink(root.join("a"), root.join("link-to-dir")).unwrap();
  std::os::unix::fs::symlink(root.join("top.txt"), root.join("b/link-to-file")).unwrap();

  let found = crawl(root, PoolConfig::new(3)).unwrap();
  assert_eq!(found, expected);
}

#[cfg(unix)]
#[test]
fn test_symlink_root_is_not_followed() {
  setup_tracing_for_test();
  let (dir, _) = sample_tree();
  let link = dir.path().join("root-link");
  std::os::unix::fs::symlink(dir.path().join("a"), &link).unwrap();

  assert_eq!(crawl(&link, PoolConfig::new(2)).unwrap(), Vec::new());
}

#[test]
fn test_crawl_of_single_file_root() {
  setup_tracing_for_test();
  let (dir, _) = sample_tree();
  let file = dir.path().join("b/four");

  let found = crawl(&file, PoolConfig::new(2)).unwrap();
  assert_eq!(found, vec![FileRecord::new(file, 7)]);
}

#[test]
fn test_crawl_missing_root_is_invalid_argument() {
  setup_tracing_for_test();
  let dir = tempfile::tempdir().unwrap();
  let missing: PathBuf = dir.path().join("does-not-exist");

  let result = crawl(&missing, PoolConfig::new(2));
  assert!(matches!(result, Err(PoolError::InvalidArgument(_))));
}

#[test]
fn test_crawl_zero_workers_is_invalid_argument() {
  setup_tracing_for_test();
  let (dir, _) = sample_tree();
  assert!(matches!(
    crawl(dir.path(), PoolConfig::new(0)),
    Err(PoolError::InvalidArgument(_))
  ));
}

#[test]
fn test_index_tree_stores_every_file() {
  setup_tracing_for_test();
  let (dir, expected) = sample_tree();
  let mut store = MemoryStore::new();

  let summary = index_tree(dir.path(), PoolConfig::new(4), &mut store, 2).unwrap();

  assert_eq!(summary.files, 5);
  assert_eq!(summary.stored, 5);
  assert_eq!(summary.bytes, 62);
  assert_eq!(store.records(), expected);
  // Five records in batches of two commit three transactions.
  assert_eq!(store.commits(), 3);
}

#[test]
fn test_reindex_updates_sizes_in_place() {
  setup_tracing_for_test();
  let (dir, _) = sample_tree();
  let mut store = MemoryStore::new();
  index_tree(dir.path(), PoolConfig::new(2), &mut store, 10).unwrap();

  write_file(&dir.path().join("top.txt"), 100);
  index_tree(dir.path(), PoolConfig::new(2), &mut store, 10).unwrap();

  assert_eq!(store.len(), 5);
  assert_eq!(store.size_of(dir.path().join("top.txt")), Some(100));
}

#[test]
fn test_index_tree_surfaces_rejected_batch() {
  setup_tracing_for_test();
  let (dir, _) = sample_tree();
  let mut store = MemoryStore::with_rejection(|record| record.path.ends_with("four"));

  let result = index_tree(dir.path(), PoolConfig::new(2), &mut store, 1);
  assert!(matches!(
    result,
    Err(IndexError::Store(StoreError::BatchRejected { .. }))
  ));
  // Batches before the rejected record stay committed.
  assert!(store.size_of(dir.path().join("a/one.bin")).is_some());
  assert_eq!(store.size_of(dir.path().join("b/four")), None);
}

#[test]
fn test_index_tree_rejects_zero_batch_size() {
  setup_tracing_for_test();
  let (dir, _) = sample_tree();
  let mut store = MemoryStore::new();

  assert_eq!(
    index_tree(dir.path(), PoolConfig::new(2), &mut store, 0),
    Err(IndexError::Store(StoreError::InvalidBatchSize))
  );
  assert!(store.is_empty());
}
