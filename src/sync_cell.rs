//! Reader/writer-guarded owner of a value shared between workers.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Owns a `T` and hands out scoped access to it.
///
/// Any number of [`SharedAccess`] handles may coexist; an [`ExclusiveAccess`]
/// handle excludes every other handle. Acquisition blocks until compatible
/// access is available. Handles release on drop, including while unwinding
/// from a panic, and a panic never poisons the cell.
///
/// Handles are not reentrant: acquiring exclusive access while the same
/// thread already holds any handle on the same cell deadlocks.
pub struct SynchronizedCell<T> {
  inner: RwLock<T>,
}

/// Mutable, exclusive access to the value in a [`SynchronizedCell`].
pub struct ExclusiveAccess<'a, T> {
  guard: RwLockWriteGuard<'a, T>,
}

/// Read-only access to the value in a [`SynchronizedCell`].
pub struct SharedAccess<'a, T> {
  guard: RwLockReadGuard<'a, T>,
}

impl<T> SynchronizedCell<T> {
  pub fn new(value: T) -> Self {
    Self {
      inner: RwLock::new(value),
    }
  }

  /// Blocks until no other handle is outstanding, then grants mutable access.
  pub fn acquire_exclusive(&self) -> ExclusiveAccess<'_, T> {
    ExclusiveAccess {
      guard: self.inner.write(),
    }
  }

  /// Blocks until no exclusive handle is outstanding, then grants read access.
  pub fn acquire_shared(&self) -> SharedAccess<'_, T> {
    SharedAccess {
      guard: self.inner.read(),
    }
  }

  /// Non-blocking variant of [`acquire_exclusive`](Self::acquire_exclusive).
  pub fn try_acquire_exclusive(&self) -> Option<ExclusiveAccess<'_, T>> {
    self.inner.try_write().map(|guard| ExclusiveAccess { guard })
  }

  /// Non-blocking variant of [`acquire_shared`](Self::acquire_shared).
  pub fn try_acquire_shared(&self) -> Option<SharedAccess<'_, T>> {
    self.inner.try_read().map(|guard| SharedAccess { guard })
  }

  /// Mutable access without locking; the borrow checker already proves
  /// there is no other handle.
  pub fn get_mut(&mut self) -> &mut T {
    self.inner.get_mut()
  }

  pub fn into_inner(self) -> T {
    self.inner.into_inner()
  }
}

impl<T: Default> Default for SynchronizedCell<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}

impl<T: fmt::Debug> fmt::Debug for SynchronizedCell<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.inner.try_read() {
      Some(guard) => f.debug_struct("SynchronizedCell").field("value", &*guard).finish(),
      None => f.debug_struct("SynchronizedCell").field("value", &"<locked>").finish(),
    }
  }
}

impl<T> Deref for ExclusiveAccess<'_, T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.guard
  }
}

impl<T> DerefMut for ExclusiveAccess<'_, T> {
  fn deref_mut(&mut self) -> &mut T {
    &mut self.guard
  }
}

impl<T> Deref for SharedAccess<'_, T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.guard
  }
}

impl<T: fmt::Debug> fmt::Debug for ExclusiveAccess<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("ExclusiveAccess").field(&*self.guard).finish()
  }
}

impl<T: fmt::Debug> fmt::Debug for SharedAccess<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("SharedAccess").field(&*self.guard).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::panic::{catch_unwind, AssertUnwindSafe};
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::{Arc, Barrier};
  use std::thread;
  use std::time::Duration;

  #[test]
  fn test_many_shared_handles_coexist() {
    let cell = Arc::new(SynchronizedCell::new(vec![1, 2, 3]));
    let readers = 4;
    let barrier = Arc::new(Barrier::new(readers));

    let handles: Vec<_> = (0..readers)
      .map(|_| {
        let cell = cell.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
          let access = cell.acquire_shared();
          // Every reader holds its handle here at the same time.
          barrier.wait();
          access.len()
        })
      })
      .collect();

    for handle in handles {
      assert_eq!(handle.join().unwrap(), 3);
    }
  }

  #[test]
  fn test_exclusive_waits_for_shared_release() {
    let cell = Arc::new(SynchronizedCell::new(0_u32));
    let written = Arc::new(AtomicBool::new(false));

    let reader = cell.acquire_shared();
    assert!(cell.try_acquire_exclusive().is_none());

    let writer = {
      let cell = cell.clone();
      let written = written.clone();
      thread::spawn(move || {
        *cell.acquire_exclusive() += 1;
        written.store(true, Ordering::SeqCst);
      })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!written.load(Ordering::SeqCst));
    assert_eq!(*reader, 0);
    drop(reader);

    writer.join().unwrap();
    assert!(written.load(Ordering::SeqCst));
    assert_eq!(*cell.acquire_shared(), 1);
  }

  #[test]
  fn test_shared_waits_for_exclusive_release() {
    let cell = SynchronizedCell::new(String::new());
    let mut writer = cell.acquire_exclusive();
    writer.push_str("done");
    assert!(cell.try_acquire_shared().is_none());
    drop(writer);
    assert_eq!(&*cell.try_acquire_shared().unwrap(), "done");
  }

  #[test]
  fn test_release_on_panic_unblocks_next_waiter() {
    let cell = Arc::new(SynchronizedCell::new(Vec::<u32>::new()));

    let outcome = catch_unwind(AssertUnwindSafe(|| {
      let mut access = cell.acquire_exclusive();
      access.push(1);
      panic!("writer failed while holding the cell");
    }));
    assert!(outcome.is_err());

    let other = {
      let cell = cell.clone();
      thread::spawn(move || cell.acquire_exclusive().push(2))
    };
    other.join().unwrap();
    assert_eq!(*cell.acquire_shared(), vec![1, 2]);
  }

  #[test]
  fn test_concurrent_writers_serialize() {
    let cell = Arc::new(SynchronizedCell::new(0_u64));
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let cell = cell.clone();
        thread::spawn(move || {
          for _ in 0..1_000 {
            *cell.acquire_exclusive() += 1;
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    let cell = Arc::try_unwrap(cell).unwrap();
    assert_eq!(cell.into_inner(), 8_000);
  }
}
