//! Handler-driven queue whose handler may feed new items back into it.
//!
//! Termination detection relies on one ordering: a worker records an item as
//! serviced only after the handler call for that item has returned, and every
//! push the handler made during that call has already incremented `pushed`
//! under the same mutex. So `serviced == pushed` with an empty queue cannot
//! hold while some handler still has children left to push.

use crate::config::{PoolConfig, DEFAULT_QUEUE_NAME};
use crate::error::PoolError;
use crate::task_queue::TaskQueue;

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info};

/// A cloneable, reference-counted handle to a [`WorkQueue`].
///
/// Handlers receive one on every call and use it to push follow-up items.
/// The handle keeps the queue state alive, so it can never dangle; items
/// pushed after the owning `WorkQueue` has been dropped are discarded with a
/// warning.
pub struct WorkQueueHandle<T> {
  queue: Arc<TaskQueue<T>>,
}

impl<T> Clone for WorkQueueHandle<T> {
  fn clone(&self) -> Self {
    Self {
      queue: self.queue.clone(),
    }
  }
}

impl<T> fmt::Debug for WorkQueueHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("WorkQueueHandle").field(&self.queue).finish()
  }
}

impl<T: Send + 'static> WorkQueueHandle<T> {
  /// Enqueues one item and wakes one idle worker.
  pub fn push(&self, item: T) {
    self.queue.push(item);
  }

  /// Enqueues a batch atomically and wakes every worker.
  /// Returns the number of items enqueued.
  pub fn push_many<I>(&self, items: I) -> usize
  where
    I: IntoIterator<Item = T>,
  {
    self.queue.push_many(items)
  }

  pub fn pushed_count(&self) -> u64 {
    self.queue.pushed()
  }

  pub fn serviced_count(&self) -> u64 {
    self.queue.serviced()
  }

  pub fn queued_count(&self) -> usize {
    self.queue.queued()
  }

  /// Returns `true` once the owning `WorkQueue` has begun stopping its workers.
  pub fn is_stopped(&self) -> bool {
    self.queue.is_stopping()
  }
}

/// A fixed set of workers that feed items of type `T` to one handler.
///
/// The handler is called as `handler(&handle, item)` and may push further
/// items through `handle` (fan-out). [`wait`](Self::wait) returns once the
/// queue is empty and every pushed item, including those pushed by handlers,
/// has been handled. Handler panics are caught at the worker boundary,
/// logged, and the item still counts as serviced.
///
/// Dropping the queue waits for it to drain, then stops and joins the workers.
/// The queue must not be dropped from inside its own handler, since the item
/// being handled keeps the drain from ever finishing.
pub struct WorkQueue<T: Send + 'static> {
  handle: WorkQueueHandle<T>,
  workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkQueue<T> {
  /// Starts `workers` threads serving `handler`.
  ///
  /// # Errors
  /// `PoolError::InvalidArgument` if `workers` is zero,
  /// `PoolError::WorkerSpawn` if a thread cannot be started.
  pub fn new<H>(handler: H, workers: usize) -> Result<Self, PoolError>
  where
    H: Fn(&WorkQueueHandle<T>, T) + Send + Sync + 'static,
  {
    Self::with_config(handler, PoolConfig::new(workers).with_name(DEFAULT_QUEUE_NAME))
  }

  pub fn with_config<H>(handler: H, config: PoolConfig) -> Result<Self, PoolError>
  where
    H: Fn(&WorkQueueHandle<T>, T) + Send + Sync + 'static,
  {
    config.validate()?;
    let handle = WorkQueueHandle {
      queue: Arc::new(TaskQueue::new(&config.name)),
    };
    let handler = Arc::new(handler);

    let workers = handle.queue.spawn_workers(&config, |index| {
      let handle = handle.clone();
      let handler = handler.clone();
      move || handle.queue.run_worker(index, |item| handler(&handle, item))
    })?;
    info!(name = %config.name, workers = config.workers, "WorkQueue started.");

    Ok(Self { handle, workers })
  }

  /// A new handle to this queue, e.g. for producers on other threads.
  pub fn handle(&self) -> WorkQueueHandle<T> {
    self.handle.clone()
  }

  pub fn name(&self) -> &str {
    self.handle.queue.name()
  }

  /// Number of worker threads.
  pub fn size(&self) -> usize {
    self.workers.len()
  }

  pub fn push(&self, item: T) {
    self.handle.push(item);
  }

  pub fn push_many<I>(&self, items: I) -> usize
  where
    I: IntoIterator<Item = T>,
  {
    self.handle.push_many(items)
  }

  pub fn pushed_count(&self) -> u64 {
    self.handle.pushed_count()
  }

  pub fn serviced_count(&self) -> u64 {
    self.handle.serviced_count()
  }

  /// Number of handler calls that panicked.
  pub fn panicked_count(&self) -> u64 {
    self.handle.queue.panicked()
  }

  /// Blocks until the queue is empty and every pushed item has been handled,
  /// including items pushed by handlers while this call was waiting.
  ///
  /// Must not be called from inside the handler.
  pub fn wait(&self) {
    self.handle.queue.wait();
  }
}

impl<T: Send + 'static> fmt::Debug for WorkQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkQueue")
      .field("size", &self.workers.len())
      .field("queue", &self.handle.queue)
      .finish()
  }
}

impl<T: Send + 'static> Drop for WorkQueue<T> {
  fn drop(&mut self) {
    debug!(name = %self.name(), "WorkQueue dropped. Draining before stopping workers.");
    self.handle.queue.wait();
    self.handle.queue.shutdown(mem::take(&mut self.workers));
    info!(name = %self.name(), serviced = self.serviced_count(), "WorkQueue stopped.");
  }
}
