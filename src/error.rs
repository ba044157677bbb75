use std::any::Any;

use thiserror::Error;

/// Errors that can occur within the `fanout_pool` pools and queues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Callable is empty (default-constructed, moved-from or reset)")]
  InvalidState,

  #[error("Submitted task panicked: {0}")]
  TaskPanicked(String),

  #[error("Task result channel error (task was dropped before producing a result): {0}")]
  ResultChannelError(String),

  #[error("Failed to spawn worker thread: {0}")]
  WorkerSpawn(String),
}

/// Errors reported by a `RecordStore`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
  #[error("Batch size must be at least 1")]
  InvalidBatchSize,

  #[error("Batch {batch} rejected and rolled back: {reason}")]
  BatchRejected { batch: usize, reason: String },
}

/// Errors from indexing a directory tree into a `RecordStore`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
  #[error(transparent)]
  Pool(#[from] PoolError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
