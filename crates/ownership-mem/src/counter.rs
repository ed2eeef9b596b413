//! Non-atomic reference counter.
//!
//! Handles are single-threaded, so counts live in a plain `Cell` and every
//! update is a read-modify-write with no synchronization.

use std::cell::Cell;

/// A reference count stored in a `Cell<usize>`.
#[derive(Debug, Default)]
pub(crate) struct RefCount(Cell<usize>);

impl RefCount {
    #[inline]
    pub(crate) const fn new(initial: usize) -> Self {
        Self(Cell::new(initial))
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.0.get()
    }

    /// Increments the count, returning the new value.
    ///
    /// Overflow aborts the process: a wrapped count would free a live object.
    #[inline]
    pub(crate) fn increment(&self) -> usize {
        let val = self
            .0
            .get()
            .checked_add(1)
            .unwrap_or_else(|| std::process::abort());
        self.0.set(val);
        val
    }

    /// Decrements the count, returning the new value.
    #[inline]
    pub(crate) fn decrement(&self) -> usize {
        let val = self.0.get();
        debug_assert!(val > 0, "Decrementing zero reference count");
        self.0.set(val - 1);
        val - 1
    }
}
