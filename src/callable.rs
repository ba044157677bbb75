//! Type-erased, move-only, zero-argument callable.
//!
//! [`MoveOnlyCallable`] stores any `FnOnce() -> R + Send + 'static` behind one
//! uniform owning type. Closures that fit in a three-word buffer (with no
//! stricter alignment than `usize`) are stored inline; anything larger is
//! boxed and only the box pointer is kept in the buffer. Either way exactly one
//! owner of the captured state exists at a time, and the state is dropped
//! exactly once: by `invoke`, by `reset`, or by `Drop`.

use crate::error::PoolError;

use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr;

const INLINE_WORDS: usize = 3;

type InlineBuffer = MaybeUninit<[usize; INLINE_WORDS]>;

/// Per-closure-type operations. Rust values move bitwise, so only `invoke`
/// and `drop` need dispatching.
struct VTable<R> {
  invoke: unsafe fn(*mut u8) -> R,
  drop: unsafe fn(*mut u8),
  inline: bool,
}

impl<R> Clone for VTable<R> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<R> Copy for VTable<R> {}

struct InlineOps<F, R>(PhantomData<(F, fn() -> R)>);

impl<F: FnOnce() -> R, R> InlineOps<F, R> {
  const VTABLE: VTable<R> = VTable {
    invoke: Self::call,
    drop: Self::release,
    inline: true,
  };

  /// # Safety
  /// `storage` must hold a live `F` written by `MoveOnlyCallable::new`; the
  /// caller must not touch it again afterwards.
  unsafe fn call(storage: *mut u8) -> R {
    let f = unsafe { ptr::read(storage.cast::<F>()) };
    f()
  }

  /// # Safety
  /// Same contract as `call`.
  unsafe fn release(storage: *mut u8) {
    unsafe { ptr::drop_in_place(storage.cast::<F>()) }
  }
}

struct BoxedOps<F, R>(PhantomData<(F, fn() -> R)>);

impl<F: FnOnce() -> R, R> BoxedOps<F, R> {
  const VTABLE: VTable<R> = VTable {
    invoke: Self::call,
    drop: Self::release,
    inline: false,
  };

  /// # Safety
  /// `storage` must hold a pointer produced by `Box::into_raw` for an `F`;
  /// the caller must not touch it again afterwards.
  unsafe fn call(storage: *mut u8) -> R {
    let f = unsafe { Box::from_raw(ptr::read(storage.cast::<*mut F>())) };
    f()
  }

  /// # Safety
  /// Same contract as `call`.
  unsafe fn release(storage: *mut u8) {
    drop(unsafe { Box::from_raw(ptr::read(storage.cast::<*mut F>())) });
  }
}

fn fits_inline<F>() -> bool {
  mem::size_of::<F>() <= mem::size_of::<InlineBuffer>()
    && mem::align_of::<F>() <= mem::align_of::<InlineBuffer>()
}

/// An owning, move-only wrapper around a `FnOnce() -> R`.
///
/// The wrapper is either *empty* or holds exactly one closure. Invoking
/// consumes the closure and leaves the wrapper empty; invoking an empty
/// wrapper fails with [`PoolError::InvalidState`].
///
/// Ownership moves with ordinary Rust moves. [`take`](Self::take) is the
/// in-place variant: it moves the closure into a new wrapper and leaves the
/// source empty.
pub struct MoveOnlyCallable<R = ()> {
  storage: InlineBuffer,
  vtable: Option<VTable<R>>,
  // Suppresses the auto `Sync`/`Send` impls; `Send` is restored below.
  _marker: PhantomData<*mut ()>,
}

// SAFETY: every constructor requires the stored closure to be `Send`, and the
// wrapper hands out no shared access to it.
unsafe impl<R> Send for MoveOnlyCallable<R> {}

impl<R> MoveOnlyCallable<R> {
  /// Wraps `f`, storing it inline when it is small enough.
  pub fn new<F>(f: F) -> Self
  where
    F: FnOnce() -> R + Send + 'static,
  {
    let mut storage = InlineBuffer::uninit();
    let vtable = if fits_inline::<F>() {
      // SAFETY: `fits_inline` checked size and alignment against the buffer.
      unsafe { storage.as_mut_ptr().cast::<F>().write(f) };
      InlineOps::<F, R>::VTABLE
    } else {
      let raw = Box::into_raw(Box::new(f));
      // SAFETY: a thin pointer always fits the word-aligned buffer.
      unsafe { storage.as_mut_ptr().cast::<*mut F>().write(raw) };
      BoxedOps::<F, R>::VTABLE
    };

    Self {
      storage,
      vtable: Some(vtable),
      _marker: PhantomData,
    }
  }

  /// Returns `true` if no closure is held.
  pub fn is_empty(&self) -> bool {
    self.vtable.is_none()
  }

  /// Returns `true` if the held closure lives in the inline buffer rather
  /// than on the heap. `false` for an empty callable.
  pub fn is_inline(&self) -> bool {
    self.vtable.is_some_and(|vtable| vtable.inline)
  }

  /// Calls the held closure, consuming it.
  ///
  /// # Errors
  /// Returns [`PoolError::InvalidState`] if the callable is empty.
  pub fn invoke(&mut self) -> Result<R, PoolError> {
    let vtable = self.vtable.take().ok_or(PoolError::InvalidState)?;
    // SAFETY: `vtable` was present, so the buffer holds a live closure of the
    // type it was built for. Clearing `vtable` first means neither a panic in
    // the closure nor a later drop can release it a second time.
    Ok(unsafe { (vtable.invoke)(self.storage.as_mut_ptr().cast::<u8>()) })
  }

  /// Moves the held closure out into a new callable, leaving `self` empty.
  pub fn take(&mut self) -> Self {
    mem::take(self)
  }

  /// Drops the held closure without calling it. No-op when empty.
  pub fn reset(&mut self) {
    if let Some(vtable) = self.vtable.take() {
      // SAFETY: see `invoke`.
      unsafe { (vtable.drop)(self.storage.as_mut_ptr().cast::<u8>()) }
    }
  }
}

impl<R> Default for MoveOnlyCallable<R> {
  fn default() -> Self {
    Self {
      storage: InlineBuffer::uninit(),
      vtable: None,
      _marker: PhantomData,
    }
  }
}

impl<R> Drop for MoveOnlyCallable<R> {
  fn drop(&mut self) {
    self.reset();
  }
}

impl<R> fmt::Debug for MoveOnlyCallable<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MoveOnlyCallable")
      .field("empty", &self.is_empty())
      .field("inline", &self.is_inline())
      .finish()
  }
}
