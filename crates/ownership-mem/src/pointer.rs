//! Control block for a payload that lives in its own allocation.

use crate::block::{BlockRef, ControlBlock, Counts};
use crate::exclusive::Deleter;
use std::cell::UnsafeCell;
use std::ptr::NonNull;

/// Counts plus an owning pointer to a separately allocated object.
///
/// The object is handed to the deleter once the strong count drops to zero;
/// the deleter itself is dropped together with the block.
pub(crate) struct PointerControlBlock<T: ?Sized, D: Deleter<T>> {
    counts: Counts,
    object: NonNull<T>,
    deleter: UnsafeCell<D>,
}

impl<T, D> PointerControlBlock<T, D>
where
    T: ?Sized + 'static,
    D: Deleter<T> + 'static,
{
    /// Allocates a block that owns `object`.
    ///
    /// # Safety
    ///
    /// `object` must stay valid until `deleter` releases it, and `deleter`
    /// must be the correct way to release it.
    pub(crate) unsafe fn allocate(object: NonNull<T>, deleter: D) -> BlockRef {
        let block = Box::new(Self {
            counts: Counts::new(),
            object,
            deleter: UnsafeCell::new(deleter),
        });
        BlockRef::adopt(NonNull::new_unchecked(Box::into_raw(block)))
    }
}

impl<T: ?Sized, D: Deleter<T>> ControlBlock for PointerControlBlock<T, D> {
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn on_zero_strong(&self) {
        (*self.deleter.get()).delete(self.object);
    }

    fn kind(&self) -> &'static str {
        "pointer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusive::DefaultDelete;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_deleter_runs_once_at_zero_strong() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let object = NonNull::from(Box::leak(Box::new(7u32)));

        let deleter = move |ptr: NonNull<u32>| {
            seen.set(seen.get() + 1);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };

        let block = unsafe { PointerControlBlock::allocate(object, deleter) };
        block.incr_strong();
        unsafe { block.decr_strong() };
        assert_eq!(calls.get(), 0);
        unsafe { block.decr_strong() };
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_default_delete_runs_destructor() {
        struct Tracked(Rc<Cell<bool>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let object = NonNull::from(Box::leak(Box::new(Tracked(dropped.clone()))));
        let block = unsafe { PointerControlBlock::allocate(object, DefaultDelete) };

        block.incr_weak();
        unsafe { block.decr_strong() };
        assert!(dropped.get());
        assert_eq!(block.weak_count(), 1);
        unsafe { block.decr_weak() };
    }
}
