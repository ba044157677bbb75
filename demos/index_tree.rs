use fanout_pool::{index_tree, MemoryStore, PoolConfig};
use std::env;
use tracing::{error, info};

/// Indexes the directory given as the first argument (default: the current
/// directory) into an in-memory store.
fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();
  info!("--- Index Tree Example ---");

  let root = env::args().nth(1).unwrap_or_else(|| ".".to_string());
  let mut store = MemoryStore::new();

  match index_tree(&root, PoolConfig::default().with_name("indexer"), &mut store, 500) {
    Ok(summary) => {
      info!(
        "Indexed {} files ({} bytes) under {} in {} commits.",
        summary.files,
        summary.bytes,
        root,
        store.commits()
      );
      for record in store.records().iter().take(10) {
        info!("  {} ({} bytes)", record.path.display(), record.size);
      }
    }
    Err(e) => error!("Indexing {} failed: {}", root, e),
  }
  info!("--- Index Tree Example Finished ---");
}
