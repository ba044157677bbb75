use crate::callable::MoveOnlyCallable;

use std::fmt;

/// Identifier of a task, unique within the pool that issued it.
pub type TaskId = u64;

/// Internal representation of a task queued on a `ThreadPool`.
pub(crate) struct Task {
  pub(crate) task_id: TaskId,
  pub(crate) func: MoveOnlyCallable<()>,
}

impl Task {
  pub(crate) fn new<F>(task_id: TaskId, f: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    Self {
      task_id,
      func: MoveOnlyCallable::new(f),
    }
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("task_id", &self.task_id)
      .field("func", &self.func)
      .finish()
  }
}
