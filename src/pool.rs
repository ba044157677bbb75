use crate::config::PoolConfig;
use crate::error::{panic_message, PoolError};
use crate::handle::TaskHandle;
use crate::task::{Task, TaskId};
use crate::task_queue::TaskQueue;

use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use futures::channel::oneshot;
use tracing::{debug, error, info, trace};

/// A fixed-size pool of OS threads draining one FIFO queue of tasks.
///
/// Tasks are either fire-and-forget ([`submit`](Self::submit)) or return a
/// [`TaskHandle`] ([`submit_with_result`](Self::submit_with_result)). Every
/// task runs exactly once, on exactly one worker. A panicking task never takes
/// its worker down: fire-and-forget panics are logged and counted, and
/// handle-backed panics are delivered through the handle.
///
/// Dropping the pool first waits for the queue to drain, then stops and joins
/// every worker. The pool must not be dropped from one of its own tasks (for
/// example by releasing the last `Arc<ThreadPool>` there): the running task is
/// still unserviced, so the drain never finishes.
pub struct ThreadPool {
  queue: Arc<TaskQueue<Task>>,
  workers: Vec<JoinHandle<()>>,
  next_task_id: AtomicU64,
}

impl ThreadPool {
  /// Starts a pool with `workers` threads.
  ///
  /// # Errors
  /// `PoolError::InvalidArgument` if `workers` is zero,
  /// `PoolError::WorkerSpawn` if a thread cannot be started.
  pub fn new(workers: usize) -> Result<Self, PoolError> {
    Self::with_config(PoolConfig::new(workers))
  }

  /// Starts a pool with one worker per hardware thread.
  pub fn with_default_workers() -> Result<Self, PoolError> {
    Self::with_config(PoolConfig::default())
  }

  pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
    config.validate()?;
    let queue = Arc::new(TaskQueue::new(&config.name));
    let workers = queue.spawn_workers(&config, |index| {
      let queue = queue.clone();
      move || queue.run_worker(index, execute_task)
    })?;
    info!(pool_name = %config.name, workers = config.workers, "ThreadPool started.");

    Ok(Self {
      queue,
      workers,
      next_task_id: AtomicU64::new(0),
    })
  }

  pub fn name(&self) -> &str {
    self.queue.name()
  }

  /// Number of worker threads.
  pub fn size(&self) -> usize {
    self.workers.len()
  }

  /// Total number of tasks ever submitted.
  pub fn pushed_count(&self) -> u64 {
    self.queue.pushed()
  }

  /// Total number of tasks that have finished running, panicked or not.
  pub fn serviced_count(&self) -> u64 {
    self.queue.serviced()
  }

  /// Number of tasks waiting for a worker.
  pub fn queued_count(&self) -> usize {
    self.queue.queued()
  }

  /// Number of fire-and-forget tasks that panicked.
  pub fn panicked_count(&self) -> u64 {
    self.queue.panicked()
  }

  /// Queues a fire-and-forget task.
  pub fn submit<F>(&self, f: F)
  where
    F: FnOnce() + Send + 'static,
  {
    let task_id = self.next_task_id();
    trace!(pool_name = %self.name(), %task_id, "Submitting task.");
    self.queue.push(Task::new(task_id, f));
  }

  /// Queues a task and returns a handle to its result. Never blocks.
  ///
  /// A panic inside `f` is captured and surfaced by the handle as
  /// `PoolError::TaskPanicked`; it does not count towards
  /// [`panicked_count`](Self::panicked_count).
  pub fn submit_with_result<F, R>(&self, f: F) -> TaskHandle<R>
  where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
  {
    let task_id = self.next_task_id();
    let (result_tx, result_rx) = oneshot::channel::<Result<R, PoolError>>();

    trace!(pool_name = %self.name(), %task_id, "Submitting task with result.");
    self.queue.push(Task::new(task_id, move || {
      let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(%task_id, panic = %message, "Task panicked during execution.");
        PoolError::TaskPanicked(message)
      });
      if result_tx.send(outcome).is_err() {
        trace!(%task_id, "Result receiver for task was dropped. Task outcome discarded.");
      }
    }));

    TaskHandle {
      task_id,
      result_receiver: result_rx,
    }
  }

  /// Blocks until every task submitted before this call has finished.
  ///
  /// Submissions racing with this call from other threads may or may not be
  /// awaited. Calling `wait` from inside one of this pool's tasks deadlocks.
  pub fn wait(&self) {
    self.queue.wait();
  }

  /// Drains the queue, then stops and joins the workers. Equivalent to
  /// dropping the pool.
  pub fn shutdown(self) {
    drop(self);
  }

  fn next_task_id(&self) -> TaskId {
    self.next_task_id.fetch_add(1, Ordering::Relaxed)
  }
}

fn execute_task(task: Task) {
  let Task { task_id, mut func } = task;
  trace!(%task_id, "Executing task.");
  if let Err(invoke_error) = func.invoke() {
    error!(%task_id, "Task could not be executed: {}", invoke_error);
  }
}

impl fmt::Debug for ThreadPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadPool")
      .field("size", &self.workers.len())
      .field("queue", &self.queue)
      .finish()
  }
}

impl Drop for ThreadPool {
  fn drop(&mut self) {
    debug!(pool_name = %self.name(), "ThreadPool dropped. Draining queue before stopping workers.");
    self.queue.wait();
    self.queue.shutdown(mem::take(&mut self.workers));
    info!(pool_name = %self.name(), serviced = self.queue.serviced(), "ThreadPool stopped.");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn test_zero_workers_is_invalid() {
    assert!(matches!(ThreadPool::new(0), Err(PoolError::InvalidArgument(_))));
  }

  #[test]
  fn test_wait_on_empty_pool_returns() {
    let pool = ThreadPool::new(2).unwrap();
    pool.wait();
    assert_eq!(pool.pushed_count(), 0);
    assert_eq!(pool.serviced_count(), 0);
  }

  #[test]
  fn test_task_ids_are_sequential() {
    let pool = ThreadPool::new(1).unwrap();
    let first = pool.submit_with_result(|| ());
    let second = pool.submit_with_result(|| ());
    assert_eq!(first.id(), 0);
    assert_eq!(second.id(), 1);
    pool.wait();
  }

  #[test]
  fn test_drop_drains_pending_tasks() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
      let pool = ThreadPool::new(2).unwrap();
      for _ in 0..50 {
        let counter = counter.clone();
        pool.submit(move || {
          counter.fetch_add(1, Ordering::SeqCst);
        });
      }
    }
    assert_eq!(counter.load(Ordering::SeqCst), 50);
  }

  #[test]
  fn test_worker_threads_are_named() {
    let pool = ThreadPool::with_config(PoolConfig::new(1).with_name("named")).unwrap();
    let name = pool
      .submit_with_result(|| std::thread::current().name().map(str::to_string))
      .get()
      .unwrap();
    assert_eq!(name.as_deref(), Some("named-0"));
  }
}
