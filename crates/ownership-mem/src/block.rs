//! Type-erased control block shared by strong and weak handles.
//!
//! A control block owns two counters and knows how to destroy its payload.
//! Handles never see the concrete block type: they hold a [`BlockRef`],
//! a pointer to `dyn ControlBlock`, and drive every lifecycle transition
//! through it.

use crate::counter::RefCount;
use std::cell::Cell;
use std::ptr::NonNull;

/// Strong and weak counts of a single control block.
#[derive(Debug)]
pub(crate) struct Counts {
    strong: RefCount,
    weak: RefCount,
    // Set while the payload destructor runs under a borrowed weak reference.
    destroying: Cell<bool>,
}

impl Counts {
    /// Counts for a block that was just handed to its first owner.
    pub(crate) const fn new() -> Self {
        Self {
            strong: RefCount::new(1),
            weak: RefCount::new(0),
            destroying: Cell::new(false),
        }
    }
}

/// Per-payload bookkeeping behind a [`BlockRef`].
///
/// Implementors only decide *how* the payload is destroyed. When it happens,
/// and when the block itself is freed, is decided by [`BlockRef`], which
/// owns every count transition (`incr_strong`, `decr_strong`, `incr_weak`,
/// `decr_weak`) and the final `on_zero_weak`.
pub(crate) trait ControlBlock {
    fn counts(&self) -> &Counts;

    /// Destroys the payload.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, when the strong count has reached zero.
    /// The payload must not be accessed afterwards.
    unsafe fn on_zero_strong(&self);

    /// Short label used in trace events.
    #[cfg_attr(not(feature = "trace"), allow(dead_code))]
    fn kind(&self) -> &'static str;
}

/// Pointer to a live, heap-allocated control block.
///
/// A `BlockRef` is `Copy`, but each copy held by a handle stands for exactly
/// one strong or one weak reference. The block stays allocated while
/// `strong + weak > 0`.
#[derive(Clone, Copy)]
pub(crate) struct BlockRef(NonNull<dyn ControlBlock>);

impl BlockRef {
    /// Takes over a block produced by `Box::into_raw`.
    ///
    /// # Safety
    ///
    /// `raw` must come from `Box::<B>::into_raw` and must not be used by the
    /// caller for anything but deriving payload pointers.
    pub(crate) unsafe fn adopt<B: ControlBlock + 'static>(raw: NonNull<B>) -> Self {
        let erased: NonNull<dyn ControlBlock> = raw;
        let this = Self(erased);
        lifecycle!(
            block = ?this.addr(),
            kind = this.block().kind(),
            "control block allocated"
        );
        this
    }

    #[inline]
    fn block(&self) -> &dyn ControlBlock {
        // SAFETY: a BlockRef is only held while the block is alive.
        unsafe { self.0.as_ref() }
    }

    /// Address of the block, for identity comparisons and diagnostics.
    #[inline]
    pub(crate) fn addr(self) -> *const () {
        self.0.as_ptr() as *const ()
    }

    #[inline]
    pub(crate) fn same_block(self, other: BlockRef) -> bool {
        std::ptr::addr_eq(self.0.as_ptr(), other.0.as_ptr())
    }

    #[inline]
    pub(crate) fn strong_count(self) -> usize {
        self.block().counts().strong.get()
    }

    /// Weak references held by handles, not counting the one borrowed while
    /// the payload is being destroyed.
    #[inline]
    pub(crate) fn weak_count(self) -> usize {
        let counts = self.block().counts();
        counts.weak.get() - usize::from(counts.destroying.get())
    }

    #[inline]
    pub(crate) fn incr_strong(self) {
        self.block().counts().strong.increment();
    }

    /// Adds a strong reference only if the payload is still alive.
    ///
    /// Returns `false` for an expired block, whose payload is already gone.
    #[inline]
    pub(crate) fn try_incr_strong(self) -> bool {
        let strong = &self.block().counts().strong;
        if strong.get() == 0 {
            return false;
        }
        strong.increment();
        true
    }

    #[inline]
    pub(crate) fn incr_weak(self) {
        self.block().counts().weak.increment();
    }

    /// Gives up one strong reference.
    ///
    /// Destroys the payload when the strong count reaches zero, and frees the
    /// block as well if no weak references remain.
    ///
    /// # Safety
    ///
    /// The caller must own one strong reference and must not use this
    /// `BlockRef` afterwards.
    pub(crate) unsafe fn decr_strong(self) {
        let counts = self.block().counts();
        if counts.strong.decrement() != 0 {
            return;
        }

        // The payload's destructor may drop the last weak handle to this very
        // block; the extra weak reference keeps the block allocated until the
        // destructor has returned.
        counts.weak.increment();
        counts.destroying.set(true);
        self.block().on_zero_strong();
        counts.destroying.set(false);
        lifecycle!(block = ?self.addr(), "payload destroyed");
        self.decr_weak();
    }

    /// Gives up one weak reference, freeing the block if it was the last
    /// reference of either kind.
    ///
    /// # Safety
    ///
    /// The caller must own one weak reference and must not use this
    /// `BlockRef` afterwards.
    pub(crate) unsafe fn decr_weak(self) {
        let counts = self.block().counts();
        if counts.weak.decrement() == 0 && counts.strong.get() == 0 {
            self.on_zero_weak();
        }
    }

    unsafe fn on_zero_weak(self) {
        lifecycle!(block = ?self.addr(), "control block freed");
        drop(Box::from_raw(self.0.as_ptr()));
    }
}
