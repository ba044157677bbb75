use crate::error::PoolError;

use std::num::NonZeroUsize;
use std::thread;

pub(crate) const DEFAULT_POOL_NAME: &str = "pool";
pub(crate) const DEFAULT_QUEUE_NAME: &str = "work-queue";

/// Construction parameters shared by `ThreadPool` and `WorkQueue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
  /// Number of worker threads. Must be at least one.
  pub workers: usize,
  /// Log label and worker thread-name prefix (`"{name}-{index}"`).
  pub name: String,
  /// Stack size for worker threads; the platform default when `None`.
  pub stack_size: Option<usize>,
}

impl PoolConfig {
  /// A configuration with `workers` threads and the default name.
  pub fn new(workers: usize) -> Self {
    Self {
      workers,
      name: DEFAULT_POOL_NAME.to_string(),
      stack_size: None,
    }
  }

  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers;
    self
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_stack_size(mut self, bytes: usize) -> Self {
    self.stack_size = Some(bytes);
    self
  }

  pub(crate) fn validate(&self) -> Result<(), PoolError> {
    if self.workers == 0 {
      return Err(PoolError::InvalidArgument(format!(
        "'{}' needs at least one worker thread",
        self.name
      )));
    }
    Ok(())
  }

  pub(crate) fn thread_builder(&self, index: usize) -> thread::Builder {
    let builder = thread::Builder::new().name(format!("{}-{}", self.name, index));
    match self.stack_size {
      Some(bytes) => builder.stack_size(bytes),
      None => builder,
    }
  }
}

impl Default for PoolConfig {
  /// One worker per available hardware thread.
  fn default() -> Self {
    Self::new(hardware_concurrency())
  }
}

/// Number of hardware threads, falling back to one when it cannot be queried.
pub fn hardware_concurrency() -> usize {
  thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
