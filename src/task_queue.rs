use crate::config::PoolConfig;
use crate::error::{panic_message, PoolError};

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, info_span, trace, warn};

const PUSH_LOG_INTERVAL: u64 = 10_000;

/// Queue contents and the two completion counters.
///
/// All three live behind one mutex so that the idle predicate
/// (`queue` empty and `serviced == pushed`) is always read atomically.
struct QueueState<T> {
  items: VecDeque<T>,
  pushed: u64,
  serviced: u64,
  panicked: u64,
}

impl<T> QueueState<T> {
  fn is_idle(&self) -> bool {
    self.items.is_empty() && self.serviced == self.pushed
  }
}

/// The shared core of both `ThreadPool` and `WorkQueue`: a FIFO of items,
/// the pushed/serviced counters, and the wake-up signals for workers and
/// for `wait()` callers.
pub(crate) struct TaskQueue<T> {
  name: String,
  state: Mutex<QueueState<T>>,
  has_work: Condvar,
  work_done: Condvar,
  stop: AtomicBool,
}

impl<T> fmt::Debug for TaskQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("TaskQueue")
      .field("name", &self.name)
      .field("queued", &state.items.len())
      .field("pushed", &state.pushed)
      .field("serviced", &state.serviced)
      .field("stopping", &self.stop.load(Ordering::Relaxed))
      .finish()
  }
}

impl<T> TaskQueue<T> {
  pub(crate) fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      state: Mutex::new(QueueState {
        items: VecDeque::new(),
        pushed: 0,
        serviced: 0,
        panicked: 0,
      }),
      has_work: Condvar::new(),
      work_done: Condvar::new(),
      stop: AtomicBool::new(false),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  /// Enqueues one item and wakes a single idle worker.
  pub(crate) fn push(&self, item: T) {
    let mut state = self.state.lock();
    if self.stop.load(Ordering::Acquire) {
      warn!(name = %self.name, "Push: queue is stopped, item discarded.");
      return;
    }
    state.items.push_back(item);
    state.pushed += 1;
    if state.pushed % PUSH_LOG_INTERVAL == 0 {
      debug!(name = %self.name, pushed = state.pushed, "Push milestone reached.");
    }
    self.has_work.notify_one();
  }

  /// Enqueues a whole batch under a single lock acquisition and wakes every
  /// worker. Returns the number of items enqueued.
  ///
  /// The iterator is drained before the lock is taken, so it may panic or
  /// call back into this queue without leaving a partial batch behind.
  pub(crate) fn push_many<I>(&self, items: I) -> usize
  where
    I: IntoIterator<Item = T>,
  {
    let batch: Vec<T> = items.into_iter().collect();
    let mut state = self.state.lock();
    if self.stop.load(Ordering::Acquire) {
      warn!(name = %self.name, "PushMany: queue is stopped, batch discarded.");
      return 0;
    }
    let added = batch.len();
    if added == 0 {
      return 0;
    }
    state.items.extend(batch);

    let previous = state.pushed;
    state.pushed += added as u64;
    if previous / PUSH_LOG_INTERVAL != state.pushed / PUSH_LOG_INTERVAL {
      debug!(name = %self.name, pushed = state.pushed, "Push milestone reached.");
    }
    trace!(name = %self.name, batch = added, "Batch enqueued, waking all workers.");
    self.has_work.notify_all();
    added
  }

  pub(crate) fn pushed(&self) -> u64 {
    self.state.lock().pushed
  }

  pub(crate) fn serviced(&self) -> u64 {
    self.state.lock().serviced
  }

  pub(crate) fn queued(&self) -> usize {
    self.state.lock().items.len()
  }

  pub(crate) fn panicked(&self) -> u64 {
    self.state.lock().panicked
  }

  /// Blocks until the queue is empty and every pushed item has been serviced.
  ///
  /// Must not be called from inside a worker of this same queue: the calling
  /// item is itself unserviced until it returns, so the predicate can never
  /// become true.
  pub(crate) fn wait(&self) {
    let mut state = self.state.lock();
    debug!(
      name = %self.name,
      pushed = state.pushed,
      queued = state.items.len(),
      serviced = state.serviced,
      "Waiting for queue to drain."
    );
    while !state.is_idle() {
      self.work_done.wait(&mut state);
    }
    debug!(name = %self.name, serviced = state.serviced, "Queue drained.");
  }

  /// Raises the stop flag and wakes every worker. The flag is stored while
  /// holding the queue mutex so a worker between its predicate check and its
  /// condvar wait cannot miss the broadcast.
  pub(crate) fn request_stop(&self) {
    let _state = self.state.lock();
    self.stop.store(true, Ordering::Release);
    self.has_work.notify_all();
  }

  pub(crate) fn is_stopping(&self) -> bool {
    self.stop.load(Ordering::Acquire)
  }

  /// Blocks until an item is available or a stop is requested.
  /// Returns `None` once the worker should exit.
  fn next_item(&self) -> Option<T> {
    let mut state = self.state.lock();
    loop {
      if self.stop.load(Ordering::Acquire) {
        return None;
      }
      if let Some(item) = state.items.pop_front() {
        return Some(item);
      }
      self.has_work.wait(&mut state);
    }
  }

  /// Records completion of one dequeued item. Runs strictly after the
  /// item's handler has returned, so every push the handler made is already
  /// counted in `pushed`.
  fn complete(&self, panicked: bool) {
    let mut state = self.state.lock();
    state.serviced += 1;
    if panicked {
      state.panicked += 1;
    }
    if state.is_idle() {
      self.work_done.notify_all();
    }
  }

  /// Worker body: dequeue, run `service` outside the lock, record completion.
  /// Panics from `service` are caught here and never escape the worker.
  pub(crate) fn run_worker<F>(&self, worker: usize, mut service: F)
  where
    F: FnMut(T),
  {
    let _span = info_span!("worker", name = %self.name, worker).entered();
    info!("Worker started.");
    while let Some(item) = self.next_item() {
      let outcome = catch_unwind(AssertUnwindSafe(|| service(item)));
      if let Err(payload) = &outcome {
        error!(
          panic = %panic_message(payload.as_ref()),
          "Work item panicked; worker continues."
        );
      }
      self.complete(outcome.is_err());
    }
    info!("Stop requested. Worker exiting.");
  }

  /// Spawns `config.workers` named threads, each running `body(index)`.
  /// If the OS refuses a thread, the workers already started are stopped and
  /// joined before the error is returned.
  pub(crate) fn spawn_workers<B, W>(
    &self,
    config: &PoolConfig,
    mut body: B,
  ) -> Result<Vec<JoinHandle<()>>, PoolError>
  where
    B: FnMut(usize) -> W,
    W: FnOnce() + Send + 'static,
  {
    let mut workers = Vec::with_capacity(config.workers);
    for index in 0..config.workers {
      debug!(name = %self.name, index, "Starting worker.");
      match config.thread_builder(index).spawn(body(index)) {
        Ok(handle) => workers.push(handle),
        Err(spawn_error) => {
          error!(name = %self.name, index, "Failed to spawn worker thread: {}", spawn_error);
          self.shutdown(workers);
          return Err(PoolError::WorkerSpawn(spawn_error.to_string()));
        }
      }
    }
    Ok(workers)
  }

  /// Broadcasts the stop signal and joins every worker. In-flight items
  /// finish first; workers never abandon an item midway.
  pub(crate) fn shutdown(&self, workers: Vec<JoinHandle<()>>) {
    self.request_stop();
    for handle in workers {
      let thread_name = handle.thread().name().unwrap_or("unnamed").to_string();
      debug!(name = %self.name, worker = %thread_name, "Joining worker.");
      if handle.join().is_err() {
        error!(name = %self.name, worker = %thread_name, "Worker thread terminated abnormally.");
      }
    }
  }

  #[cfg(test)]
  fn lock_state(&self) -> parking_lot::MutexGuard<'_, QueueState<T>> {
    self.state.lock()
  }
}
