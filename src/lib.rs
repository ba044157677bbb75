//! Fixed-size OS-thread pools with future-returning submission, and a
//! self-feeding work queue whose handlers may push further items into the
//! queue they are served from.
//!
//! The crate also ships the pieces those two build on (a type-erased move-only
//! callable and a reader/writer-guarded cell) and a parallel directory
//! crawler that feeds a transactional [`RecordStore`].

mod callable;
mod config;
mod error;
mod handle;
mod index;
mod pool;
mod store;
mod sync_cell;
mod task;
mod task_queue;
mod work_queue;

pub use callable::MoveOnlyCallable;
pub use config::{hardware_concurrency, PoolConfig};
pub use error::{IndexError, PoolError, StoreError};
pub use handle::TaskHandle;
pub use index::{crawl, index_tree, IndexSummary};
pub use pool::ThreadPool;
pub use store::{FileRecord, MemoryStore, RecordStore};
pub use sync_cell::{ExclusiveAccess, SharedAccess, SynchronizedCell};
pub use task::TaskId;
pub use work_queue::{WorkQueue, WorkQueueHandle};
