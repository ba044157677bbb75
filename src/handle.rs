use crate::error::PoolError;
use crate::task::TaskId;

use futures::channel::oneshot;
use futures::executor::block_on;

/// A handle to a task submitted with `ThreadPool::submit_with_result`.
///
/// Holds the receiving end of the task's one-shot result slot. The slot is
/// written exactly once by the worker that runs the task.
#[derive(Debug)]
pub struct TaskHandle<R: Send + 'static> {
  pub(crate) task_id: TaskId,
  pub(crate) result_receiver: oneshot::Receiver<Result<R, PoolError>>,
}

impl<R: Send + 'static> TaskHandle<R> {
  /// Returns the pool-local ID of this task.
  pub fn id(&self) -> TaskId {
    self.task_id
  }

  /// Blocks the calling thread until the task has run and returns its result.
  ///
  /// Calling this from a worker of the same pool can deadlock if every other
  /// worker is busy or blocked the same way.
  ///
  /// # Errors
  /// Returns `PoolError::TaskPanicked` if the task panicked, with the panic message.
  /// Returns `PoolError::ResultChannelError` if the task was dropped without running.
  pub fn get(self) -> Result<R, PoolError> {
    block_on(self.await_result())
  }

  /// Awaits the task's result without blocking an executor thread.
  ///
  /// # Errors
  /// Same as [`get`](Self::get).
  pub async fn await_result(self) -> Result<R, PoolError> {
    let task_id = self.task_id;
    match self.result_receiver.await {
      Ok(task_outcome_result) => task_outcome_result,
      Err(canceled) => {
        tracing::warn!(%task_id, "Result channel receive error: {}", canceled);
        Err(PoolError::ResultChannelError(format!(
          "Task (id: {}) result channel unexpectedly closed: {}",
          task_id, canceled
        )))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dropped_sender_yields_channel_error() {
    let (result_tx, result_rx) = oneshot::channel::<Result<u32, PoolError>>();
    let handle = TaskHandle {
      task_id: 7,
      result_receiver: result_rx,
    };
    drop(result_tx);
    assert!(matches!(handle.get(), Err(PoolError::ResultChannelError(_))));
  }

  #[test]
  fn test_sent_outcome_is_returned() {
    let (result_tx, result_rx) = oneshot::channel();
    let handle = TaskHandle {
      task_id: 0,
      result_receiver: result_rx,
    };
    result_tx.send(Ok("done".to_string())).unwrap();
    assert_eq!(handle.get(), Ok("done".to_string()));
  }
}
