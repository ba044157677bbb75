//! Parallel directory crawl built on [`WorkQueue`] fan-out.

use crate::config::PoolConfig;
use crate::error::{IndexError, PoolError, StoreError};
use crate::store::{FileRecord, RecordStore};
use crate::sync_cell::SynchronizedCell;
use crate::work_queue::{WorkQueue, WorkQueueHandle};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, trace, warn};

/// Totals reported by [`index_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
  pub files: usize,
  pub bytes: u64,
  pub stored: usize,
}

/// Finds every regular file under `root` without following symlinks.
///
/// Each directory is one work item; its handler pushes the directory's
/// non-symlink children back into the same queue. Entries that cannot be read
/// are logged and skipped. Records are returned sorted by path.
///
/// # Errors
/// `PoolError::InvalidArgument` if `root` cannot be read or the config has no
/// workers, `PoolError::WorkerSpawn` if a thread cannot be started.
pub fn crawl(root: impl AsRef<Path>, config: PoolConfig) -> Result<Vec<FileRecord>, PoolError> {
  let root = root.as_ref();
  fs::symlink_metadata(root).map_err(|io_error| {
    PoolError::InvalidArgument(format!("cannot read crawl root {}: {}", root.display(), io_error))
  })?;

  let found = Arc::new(SynchronizedCell::new(Vec::new()));
  let queue = {
    let found = found.clone();
    WorkQueue::with_config(
      move |handle: &WorkQueueHandle<PathBuf>, path: PathBuf| visit(handle, &found, path),
      config,
    )?
  };

  queue.push(root.to_path_buf());
  queue.wait();
  info!(
    root = %root.display(),
    visited = queue.serviced_count(),
    "Crawl finished."
  );
  drop(queue);

  let mut records = match Arc::try_unwrap(found) {
    Ok(cell) => cell.into_inner(),
    Err(shared) => shared.acquire_shared().to_vec(),
  };
  records.sort();
  Ok(records)
}

fn visit(handle: &WorkQueueHandle<PathBuf>, found: &SynchronizedCell<Vec<FileRecord>>, path: PathBuf) {
  let metadata = match fs::symlink_metadata(&path) {
    Ok(metadata) => metadata,
    Err(io_error) => {
      warn!(path = %path.display(), "Cannot stat entry: {}", io_error);
      return;
    }
  };

  let file_type = metadata.file_type();
  if file_type.is_dir() {
    let entries = match fs::read_dir(&path) {
      Ok(entries) => entries,
      Err(io_error) => {
        warn!(path = %path.display(), "Cannot read directory: {}", io_error);
        return;
      }
    };

    let mut children = Vec::new();
    for entry in entries {
      match entry {
        Ok(entry) => match entry.file_type() {
          Ok(child_type) if child_type.is_symlink() => {
            trace!(path = %entry.path().display(), "Skipping symlink.");
          }
          Ok(_) => children.push(entry.path()),
          Err(io_error) => {
            warn!(path = %entry.path().display(), "Cannot read entry type: {}", io_error);
          }
        },
        Err(io_error) => warn!(dir = %path.display(), "Cannot read directory entry: {}", io_error),
      }
    }
    trace!(dir = %path.display(), children = children.len(), "Discovered directory entries.");
    handle.push_many(children);
  } else if file_type.is_file() {
    found.acquire_exclusive().push(FileRecord::new(path, metadata.len()));
  }
}

/// Crawls `root` and upserts every file found into `store` in transactions
/// of `batch_size` records.
///
/// # Errors
/// Crawl errors as [`IndexError::Pool`], store errors as [`IndexError::Store`].
/// A zero `batch_size` is rejected before crawling.
pub fn index_tree<S>(
  root: impl AsRef<Path>,
  config: PoolConfig,
  store: &mut S,
  batch_size: usize,
) -> Result<IndexSummary, IndexError>
where
  S: RecordStore + ?Sized,
{
  if batch_size == 0 {
    return Err(StoreError::InvalidBatchSize.into());
  }

  let records = crawl(root, config)?;
  let bytes: u64 = records.iter().map(|record| record.size).sum();
  let stored = store.insert_many(&records, batch_size)?;
  info!(files = records.len(), bytes, stored, "Index stored.");

  Ok(IndexSummary {
    files: records.len(),
    bytes,
    stored,
  })
}
