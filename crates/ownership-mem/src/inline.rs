//! Control block with the payload stored inside it.
//!
//! Used by the single-allocation factory: counts and payload share one heap
//! allocation, so the payload's memory is released only when the block is,
//! even though its destructor runs as soon as the strong count hits zero.

use crate::block::{BlockRef, ControlBlock, Counts};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

pub(crate) struct InlineControlBlock<T> {
    counts: Counts,
    slot: UnsafeCell<MaybeUninit<T>>,
}

impl<T: 'static> InlineControlBlock<T> {
    /// Allocates a block whose payload slot is still uninitialized.
    ///
    /// Dropping the returned box frees the storage without running `T`'s
    /// destructor.
    pub(crate) fn new_uninit() -> Box<Self> {
        Box::new(Self {
            counts: Counts::new(),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        })
    }

    /// Moves `value` into the slot and hands the block over to the handles.
    ///
    /// Returns the address of the payload and the block's first strong
    /// reference.
    pub(crate) fn emplace(mut self: Box<Self>, value: T) -> (NonNull<T>, BlockRef) {
        self.slot.get_mut().write(value);
        let raw = Box::into_raw(self);
        // SAFETY: `raw` is non-null and freshly released from its Box; both
        // pointers are derived from it without going through a reference.
        unsafe {
            let slot = UnsafeCell::raw_get(ptr::addr_of!((*raw).slot));
            let value = NonNull::new_unchecked(slot.cast::<T>());
            (value, BlockRef::adopt(NonNull::new_unchecked(raw)))
        }
    }
}

impl<T> ControlBlock for InlineControlBlock<T> {
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn on_zero_strong(&self) {
        ptr::drop_in_place(self.slot.get().cast::<T>());
    }

    fn kind(&self) -> &'static str {
        "inline"
    }
}
