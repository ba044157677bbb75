//! Boundary to the record store that receives crawl results.

use crate::error::StoreError;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// One regular file found by a crawl.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileRecord {
  pub path: PathBuf,
  pub size: u64,
}

impl FileRecord {
  pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
    Self {
      path: path.into(),
      size,
    }
  }
}

/// A transactional, upsert-capable sink for [`FileRecord`]s.
pub trait RecordStore {
  /// Upserts `records` keyed by path (insert, or update the size on
  /// conflict), committing one transaction per `batch_size` records.
  ///
  /// Batches are applied in order. A failing batch is rolled back on its own;
  /// batches committed before it stay committed and later batches are not
  /// attempted. Returns the number of records committed.
  fn insert_many(&mut self, records: &[FileRecord], batch_size: usize) -> Result<usize, StoreError>;
}

type RejectRule = Box<dyn Fn(&FileRecord) -> bool + Send + Sync>;

/// In-memory [`RecordStore`] with per-batch commit semantics.
///
/// An optional rejection rule makes a batch fail when any of its records
/// matches, which rolls back just that batch.
#[derive(Default)]
pub struct MemoryStore {
  rows: BTreeMap<PathBuf, u64>,
  commits: usize,
  reject: Option<RejectRule>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store that fails any batch containing a record matching `rule`.
  pub fn with_rejection<F>(rule: F) -> Self
  where
    F: Fn(&FileRecord) -> bool + Send + Sync + 'static,
  {
    Self {
      reject: Some(Box::new(rule)),
      ..Self::default()
    }
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Stored size for `path`, if present.
  pub fn size_of(&self, path: impl AsRef<Path>) -> Option<u64> {
    self.rows.get(path.as_ref()).copied()
  }

  /// Number of committed transactions.
  pub fn commits(&self) -> usize {
    self.commits
  }

  /// All stored rows, ordered by path.
  pub fn records(&self) -> Vec<FileRecord> {
    self
      .rows
      .iter()
      .map(|(path, size)| FileRecord::new(path.clone(), *size))
      .collect()
  }
}

impl fmt::Debug for MemoryStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryStore")
      .field("rows", &self.rows.len())
      .field("commits", &self.commits)
      .field("has_reject_rule", &self.reject.is_some())
      .finish()
  }
}

impl RecordStore for MemoryStore {
  fn insert_many(&mut self, records: &[FileRecord], batch_size: usize) -> Result<usize, StoreError> {
    if batch_size == 0 {
      return Err(StoreError::InvalidBatchSize);
    }

    let mut committed = 0;
    for (batch, chunk) in records.chunks(batch_size).enumerate() {
      // Staged rows are the open transaction; dropping them is the rollback.
      let mut staged = BTreeMap::new();
      for record in chunk {
        if self.reject.as_ref().is_some_and(|rule| rule(record)) {
          warn!(batch, path = %record.path.display(), "Record rejected. Rolling back batch.");
          return Err(StoreError::BatchRejected {
            batch,
            reason: format!("record {} was rejected", record.path.display()),
          });
        }
        staged.insert(record.path.clone(), record.size);
      }

      self.rows.extend(staged);
      self.commits += 1;
      committed += chunk.len();
      debug!(batch, rows = chunk.len(), "Committed batch.");
    }
    Ok(committed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn records(count: usize) -> Vec<FileRecord> {
    (0..count)
      .map(|i| FileRecord::new(format!("/data/file-{:03}", i), i as u64 * 10))
      .collect()
  }

  #[test]
  fn test_commits_in_batches() {
    let mut store = MemoryStore::new();
    assert_eq!(store.insert_many(&records(10), 4), Ok(10));
    assert_eq!(store.len(), 10);
    assert_eq!(store.commits(), 3);
  }

  #[test]
  fn test_upsert_updates_size_on_conflict() {
    let mut store = MemoryStore::new();
    store.insert_many(&[FileRecord::new("/a", 1)], 10).unwrap();
    store
      .insert_many(&[FileRecord::new("/a", 5), FileRecord::new("/b", 2)], 10)
      .unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.size_of("/a"), Some(5));
    assert_eq!(store.size_of("/b"), Some(2));
  }

  #[test]
  fn test_failed_batch_rolls_back_only_itself() {
    let mut store = MemoryStore::with_rejection(|record| record.path.ends_with("file-005"));
    let result = store.insert_many(&records(10), 4);

    assert!(matches!(result, Err(StoreError::BatchRejected { batch: 1, .. })));
    // Batch 0 (files 0..4) committed; batch 1 rolled back; batch 2 never ran.
    assert_eq!(store.len(), 4);
    assert_eq!(store.commits(), 1);
    assert_eq!(store.size_of("/data/file-004"), None);
    assert_eq!(store.size_of("/data/file-003"), Some(30));
  }

  #[test]
  fn test_zero_batch_size_is_rejected() {
    let mut store = MemoryStore::new();
    assert_eq!(store.insert_many(&records(1), 0), Err(StoreError::InvalidBatchSize));
    assert!(store.is_empty());
  }
}
