use fanout_pool::{PoolError, ThreadPool};
use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let pool = ThreadPool::new(1).expect("Failed to start pool");

  let handle = pool.submit_with_result(|| -> String {
    info!("Panicking Task: About to panic!");
    panic!("This task is designed to panic!");
  });
  let task_id = handle.id();
  info!("Panicking task {} submitted. Awaiting result...", task_id);

  match handle.get() {
    Ok(result) => info!("Task {} completed with UNEXPECTED result: {}", task_id, result),
    Err(PoolError::TaskPanicked(message)) => {
      info!("Task {} correctly resulted in TaskPanicked: {}", task_id, message);
    }
    Err(e) => info!("Task {} resulted in unexpected error: {:?}", task_id, e),
  }

  pool.submit(|| panic!("Fire-and-forget task panics too."));
  pool.wait();
  info!("Fire-and-forget panics counted: {}", pool.panicked_count());

  let survivor = pool.submit_with_result(|| "still serving".to_string());
  info!("Worker after panics: {:?}", survivor.get());

  info!("Shutting down pool.");
  pool.shutdown();
  info!("--- Task Panic Example Finished ---");
}
