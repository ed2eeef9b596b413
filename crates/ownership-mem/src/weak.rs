//! Weak references for cycle prevention.

use crate::block::BlockRef;
use crate::shared::SharedHandle;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

/// A weak (non-owning) reference to an object managed by [`SharedHandle`].
///
/// Weak handles do not keep the object alive, only its control block. They
/// can be upgraded to strong handles while the object still exists, which
/// lets back-references break ownership cycles.
///
/// # Example
///
/// ```
/// use ownership_mem::{SharedHandle, WeakHandle};
///
/// let handle = SharedHandle::new(42);
/// let weak = WeakHandle::from(&handle);
///
/// // Weak can check if still alive
/// assert!(!weak.expired());
/// assert_eq!(*weak.lock(), 42);
///
/// drop(handle);
///
/// // Now it's dead
/// assert!(weak.expired());
/// assert!(weak.lock().is_empty());
/// ```
pub struct WeakHandle<T: ?Sized> {
    ptr: Option<NonNull<T>>,
    block: Option<BlockRef>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> WeakHandle<T> {
    /// Creates an empty weak handle that observes nothing.
    #[inline]
    pub const fn new() -> Self {
        Self {
            ptr: None,
            block: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// Returns true if the observed object has been destroyed.
    ///
    /// An empty weak handle counts as expired.
    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Number of strong handles keeping the object alive.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, BlockRef::strong_count)
    }

    /// Number of weak handles observing the object, this one included.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, BlockRef::weak_count)
    }

    /// Upgrade to a strong handle, incrementing the strong count.
    ///
    /// Returns `None` if the handle is empty or the object is gone.
    pub fn upgrade(&self) -> Option<SharedHandle<T>> {
        let (ptr, block) = (self.ptr?, self.block?);
        if !block.try_incr_strong() {
            lifecycle!(block = ?block.addr(), "weak upgrade failed");
            return None;
        }
        Some(SharedHandle::from_parts(ptr, block))
    }

    /// Like [`upgrade`](Self::upgrade), but gives the empty handle instead
    /// of `None`.
    #[inline]
    pub fn lock(&self) -> SharedHandle<T> {
        self.upgrade().unwrap_or_default()
    }

    /// Stops observing, leaving this handle empty.
    pub fn reset(&mut self) {
        let mut previous = Self::new();
        previous.swap(self);
    }

    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns true if both handles observe objects kept alive by the same
    /// owner.
    pub fn shares_owner<U: ?Sized>(&self, other: &WeakHandle<U>) -> bool {
        match (self.block, other.block) {
            (Some(a), Some(b)) => a.same_block(b),
            _ => false,
        }
    }
}

impl<T: ?Sized> From<&SharedHandle<T>> for WeakHandle<T> {
    fn from(handle: &SharedHandle<T>) -> Self {
        let (Some(ptr), Some(block)) = (handle.as_ptr(), handle.block_ref()) else {
            return Self::new();
        };
        block.incr_weak();
        Self {
            ptr: Some(ptr),
            block: Some(block),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            block.incr_weak();
        }
        Self {
            ptr: self.ptr,
            block: self.block,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: this handle held one weak reference and gives it up.
            unsafe { block.decr_weak() }
        }
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("use_count", &self.use_count())
            .field("weak_count", &self.weak_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_weak_from_handle() {
        let handle = SharedHandle::new(42);
        let weak = WeakHandle::from(&handle);

        assert!(!weak.expired());
        assert_eq!(weak.use_count(), 1);
        assert_eq!(handle.weak_count(), 1);
        assert_eq!(weak.lock().get(), Some(&42));
    }

    #[test]
    fn test_weak_after_release() {
        let handle = SharedHandle::new(42);
        let weak = WeakHandle::from(&handle);

        drop(handle);

        assert!(weak.expired());
        assert_eq!(weak.use_count(), 0);
        assert_eq!(weak.weak_count(), 1);
        assert!(weak.lock().is_empty());
    }

    #[test]
    fn test_weak_upgrade() {
        let handle = SharedHandle::new(42);
        let weak = handle.downgrade();

        // Original use count = 1
        assert_eq!(handle.use_count(), 1);

        // Upgrade increments use count
        let upgraded = weak.upgrade().unwrap();
        assert_eq!(handle.use_count(), 2);

        // Release original
        drop(handle);
        assert_eq!(upgraded.use_count(), 1);

        // Value still alive via upgraded handle
        assert_eq!(*upgraded, 42);
    }

    #[test]
    fn test_weak_upgrade_after_release() {
        let handle = SharedHandle::new(42);
        let weak = handle.downgrade();

        drop(handle);

        // Cannot upgrade dead weak ref
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_empty_weak() {
        let weak: WeakHandle<u32> = WeakHandle::default();
        assert!(weak.is_empty());
        assert!(weak.expired());
        assert_eq!(weak.weak_count(), 0);
        assert!(weak.upgrade().is_none());

        let from_empty = WeakHandle::from(&SharedHandle::<u32>::empty());
        assert!(from_empty.is_empty());
    }

    #[test]
    fn test_clone_and_reset() {
        let handle = SharedHandle::new("value");
        let mut a = handle.downgrade();
        let b = a.clone();
        assert_eq!(handle.weak_count(), 2);
        assert!(a.shares_owner(&b));

        a.reset();
        assert!(a.is_empty());
        assert_eq!(handle.weak_count(), 1);
        drop(b);
        assert_eq!(handle.weak_count(), 0);
        assert!(handle.is_unique());
    }

    #[test]
    fn test_swap() {
        let first = SharedHandle::new(1);
        let second = SharedHandle::new(2);
        let mut a = first.downgrade();
        let mut b = second.downgrade();
        a.swap(&mut b);
        assert_eq!(*a.lock(), 2);
        assert_eq!(*b.lock(), 1);
    }

    #[test]
    fn test_weak_outlives_object() {
        struct Tracked(Rc<Cell<bool>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let handle = SharedHandle::new(Tracked(dropped.clone()));
        let weak = handle.downgrade();

        drop(handle);
        assert!(dropped.get());
        assert!(weak.expired());
    }

    #[test]
    fn test_self_referential_payload() {
        struct Node {
            me: RefCell<WeakHandle<Node>>,
        }

        let node = SharedHandle::new(Node {
            me: RefCell::new(WeakHandle::new()),
        });
        *node.me.borrow_mut() = node.downgrade();
        assert_eq!(node.weak_count(), 1);

        // Destroying the node drops the last weak handle to its own block.
        drop(node);
    }

    #[test]
    fn test_weak_count_seen_from_destructor() {
        struct Node {
            me: RefCell<WeakHandle<Node>>,
            seen: Rc<Cell<Option<usize>>>,
        }

        impl Drop for Node {
            fn drop(&mut self) {
                let me = self.me.borrow();
                self.seen.set(Some(me.weak_count()));
                assert!(me.expired());
            }
        }

        let seen = Rc::new(Cell::new(None));
        let node = SharedHandle::new(Node {
            me: RefCell::new(WeakHandle::new()),
            seen: seen.clone(),
        });
        *node.me.borrow_mut() = node.downgrade();

        drop(node);
        assert_eq!(seen.get(), Some(1));
    }

    #[test]
    fn test_parent_child_cycle_breaks() {
        struct Parent {
            children: RefCell<Vec<SharedHandle<Child>>>,
        }
        struct Child {
            parent: WeakHandle<Parent>,
        }

        let parent = SharedHandle::new(Parent {
            children: RefCell::new(Vec::new()),
        });
        let child = SharedHandle::new(Child {
            parent: parent.downgrade(),
        });
        parent.children.borrow_mut().push(child.clone());

        assert_eq!(child.use_count(), 2);
        assert!(!child.parent.expired());

        drop(parent);
        assert!(child.parent.expired());
        assert_eq!(child.use_count(), 1);
    }
}
