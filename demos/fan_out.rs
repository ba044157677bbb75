use fanout_pool::{SynchronizedCell, WorkQueue, WorkQueueHandle};
use std::sync::Arc;
use tracing::info;

/// Collatz steps: every even item `n` also schedules `n / 2`, every odd item
/// above one schedules `3n + 1`.
fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();
  info!("--- WorkQueue Fan-out Example ---");

  let steps = Arc::new(SynchronizedCell::new(0u64));
  let queue = {
    let steps = steps.clone();
    WorkQueue::new(
      move |handle: &WorkQueueHandle<u64>, n: u64| {
        *steps.acquire_exclusive() += 1;
        match n {
          0 | 1 => {}
          even if even % 2 == 0 => handle.push(even / 2),
          odd => handle.push(3 * odd + 1),
        }
      },
      4,
    )
    .expect("Failed to start work queue")
  };

  let seeded = queue.push_many(1..=1000);
  info!("Seeded {} starting values.", seeded);
  queue.wait();

  info!(
    "Total Collatz steps for 1..=1000: {} (pushed {}, serviced {}).",
    *steps.acquire_shared(),
    queue.pushed_count(),
    queue.serviced_count()
  );
  info!("--- WorkQueue Fan-out Example Finished ---");
}
