use fanout_pool::{PoolConfig, ThreadPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Basic ThreadPool Usage Example ---");

  let pool = ThreadPool::with_config(PoolConfig::new(4).with_name("basic")).expect("Failed to start pool");

  let counter = Arc::new(AtomicUsize::new(0));
  for _ in 0..100 {
    let counter = counter.clone();
    pool.submit(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });
  }

  let handles: Vec<_> = (1..=5u64)
    .map(|n| pool.submit_with_result(move || (1..=n).product::<u64>()))
    .collect();
  for handle in handles {
    let task_id = handle.id();
    match handle.get() {
      Ok(factorial) => info!("Task {} computed {}", task_id, factorial),
      Err(e) => info!("Task {} failed: {}", task_id, e),
    }
  }

  pool.wait();
  info!(
    "Counter: {}. Pushed: {}, serviced: {}.",
    counter.load(Ordering::SeqCst),
    pool.pushed_count(),
    pool.serviced_count()
  );

  info!("Shutting down pool.");
  pool.shutdown();
  info!("--- Basic ThreadPool Usage Example Finished ---");
}
