//! Shared ownership handle.

use crate::block::BlockRef;
use crate::error::{empty_deref, OwnershipError, Result};
use crate::exclusive::{DefaultDelete, Deleter, ExclusiveHandle};
use crate::factory::make_shared;
use crate::pointer::PointerControlBlock;
use crate::weak::WeakHandle;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

/// A reference-counted handle to a heap object.
///
/// Every clone shares one control block and adds one to its strong count.
/// The object is destroyed when the last `SharedHandle` goes away; the
/// control block lives on while [`WeakHandle`]s still observe it.
///
/// A handle may also be empty, owning and observing nothing.
///
/// # Example
///
/// ```
/// use ownership_mem::SharedHandle;
///
/// let data = SharedHandle::new(vec![1, 2, 3]);
/// let shared = data.clone();
///
/// assert_eq!(*shared, vec![1, 2, 3]);
/// assert_eq!(data.use_count(), 2);
/// ```
pub struct SharedHandle<T: ?Sized> {
    ptr: Option<NonNull<T>>,
    block: Option<BlockRef>,
    _owns: PhantomData<T>,
}

impl<T: 'static> SharedHandle<T> {
    /// Creates a handle through the single-allocation factory.
    #[inline]
    pub fn new(value: T) -> Self {
        make_shared(value)
    }
}

impl<T: ?Sized + 'static> SharedHandle<T> {
    /// Takes shared ownership of a boxed object.
    ///
    /// The box stays a separate allocation; a second one holds the counts.
    pub fn from_box(boxed: Box<T>) -> Self {
        let object = NonNull::from(Box::leak(boxed));
        // SAFETY: `object` came from a Box, which DefaultDelete releases.
        unsafe { Self::adopt(object, DefaultDelete) }
    }

    /// Takes shared ownership of a pointer produced by `Box::into_raw`.
    ///
    /// A null pointer gives the empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from `Box::into_raw`, and nothing else may
    /// release it.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::from_raw_with_deleter(ptr, DefaultDelete)
    }

    /// Takes shared ownership of `ptr`, released through `deleter` once the
    /// last strong handle is gone.
    ///
    /// A null pointer gives the empty handle and drops `deleter` unused.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid until `deleter` releases it, and nothing
    /// else may release it.
    pub unsafe fn from_raw_with_deleter<D>(ptr: *mut T, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        match NonNull::new(ptr) {
            Some(object) => Self::adopt(object, deleter),
            None => Self::empty(),
        }
    }

    /// Replaces the current ownership with ownership of `boxed`.
    pub fn reset_box(&mut self, boxed: Box<T>) {
        let mut previous = Self::from_box(boxed);
        previous.swap(self);
    }

    unsafe fn adopt<D: Deleter<T> + 'static>(object: NonNull<T>, deleter: D) -> Self {
        let block = PointerControlBlock::allocate(object, deleter);
        Self::from_parts(object, block)
    }
}

impl<T: ?Sized> SharedHandle<T> {
    /// The empty handle.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            ptr: None,
            block: None,
            _owns: PhantomData,
        }
    }

    /// Wraps a block reference the caller already accounted for as strong.
    #[inline]
    pub(crate) fn from_parts(ptr: NonNull<T>, block: BlockRef) -> Self {
        Self {
            ptr: Some(ptr),
            block: Some(block),
            _owns: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn block_ref(&self) -> Option<BlockRef> {
        self.block
    }

    /// Creates a handle that observes `ptr` but keeps `owner`'s object alive.
    ///
    /// Aliasing an empty owner gives the empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for as long as `owner`'s object is alive.
    pub unsafe fn alias<U: ?Sized>(owner: &SharedHandle<U>, ptr: NonNull<T>) -> Self {
        match owner.block {
            Some(block) => {
                block.incr_strong();
                Self::from_parts(ptr, block)
            }
            None => Self::empty(),
        }
    }

    /// Shares ownership while observing a part of the object.
    ///
    /// The returned handle counts as one more strong reference to the whole
    /// object, which is destroyed only once both handles are gone.
    ///
    /// ```
    /// use ownership_mem::SharedHandle;
    ///
    /// struct Config { name: String, retries: u32 }
    ///
    /// let config = SharedHandle::new(Config { name: "main".into(), retries: 3 });
    /// let name = config.project(|c| c.name.as_str());
    /// drop(config);
    /// assert_eq!(&*name, "main");
    /// ```
    pub fn project<U: ?Sized>(&self, f: impl FnOnce(&T) -> &U) -> SharedHandle<U> {
        let (Some(ptr), Some(block)) = (self.ptr, self.block) else {
            return SharedHandle::empty();
        };
        // SAFETY: this handle keeps the object alive.
        let target = NonNull::from(f(unsafe { ptr.as_ref() }));
        block.incr_strong();
        SharedHandle::from_parts(target, block)
    }

    /// Converts into a handle observing a related view of the object,
    /// without touching the counts.
    ///
    /// This is how a handle is upcast to a trait object; the object is
    /// still destroyed as the type it was created with.
    ///
    /// ```
    /// use ownership_mem::SharedHandle;
    /// use std::fmt::Debug;
    ///
    /// let value = SharedHandle::new(42_u32);
    /// let erased: SharedHandle<dyn Debug> = value.map(|v| v as &dyn Debug);
    /// assert_eq!(format!("{:?}", &*erased), "42");
    /// ```
    pub fn map<U: ?Sized>(mut self, f: impl FnOnce(&T) -> &U) -> SharedHandle<U> {
        let Some(ptr) = self.ptr else {
            return SharedHandle::empty();
        };
        // SAFETY: this handle keeps the object alive.
        let target = NonNull::from(f(unsafe { ptr.as_ref() }));
        match self.block.take() {
            Some(block) => SharedHandle::from_parts(target, block),
            None => SharedHandle::empty(),
        }
    }

    /// Upgrades `weak`, giving the empty handle if its object is gone.
    #[inline]
    pub fn from_weak(weak: &WeakHandle<T>) -> Self {
        weak.lock()
    }

    /// Creates a weak handle observing the same object.
    #[inline]
    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle::from(self)
    }

    /// Drops this handle's ownership, leaving it empty.
    pub fn reset(&mut self) {
        let mut previous = Self::empty();
        previous.swap(self);
    }

    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-empty handle keeps the object alive.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Number of strong handles sharing the object, zero when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, BlockRef::strong_count)
    }

    /// Number of weak handles observing the object, zero when empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, BlockRef::weak_count)
    }

    /// Returns true if this is the only strong handle and no weak handle
    /// observes the object.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.use_count() == 1 && self.weak_count() == 0
    }

    /// Returns true if both handles keep the same object alive, even when
    /// they observe different parts of it.
    pub fn shares_owner<U: ?Sized>(&self, other: &SharedHandle<U>) -> bool {
        match (self.block, other.block) {
            (Some(a), Some(b)) => a.same_block(b),
            _ => false,
        }
    }

    fn addr(&self) -> Option<*const ()> {
        self.ptr.map(|ptr| ptr.as_ptr() as *const ())
    }
}

impl<T: ?Sized> Clone for SharedHandle<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            block.incr_strong();
        }
        Self {
            ptr: self.ptr,
            block: self.block,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: this handle held one strong reference and gives it up.
            unsafe { block.decr_strong() }
        }
    }
}

impl<T: ?Sized> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for SharedHandle<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => empty_deref("SharedHandle"),
        }
    }
}

impl<T: ?Sized + 'static> From<Box<T>> for SharedHandle<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T, D> From<ExclusiveHandle<T, D>> for SharedHandle<T>
where
    T: ?Sized + 'static,
    D: Deleter<T> + 'static,
{
    /// Moves the object and its deleter under shared ownership.
    fn from(handle: ExclusiveHandle<T, D>) -> Self {
        let (ptr, deleter) = handle.into_raw_parts();
        match ptr {
            // SAFETY: the exclusive handle owned `object` and `deleter` is
            // how it was going to release it.
            Some(object) => unsafe { Self::adopt(object, deleter) },
            None => Self::empty(),
        }
    }
}

impl<T: ?Sized> TryFrom<&WeakHandle<T>> for SharedHandle<T> {
    type Error = OwnershipError;

    /// Upgrades `weak`, reporting why it could not be upgraded.
    fn try_from(weak: &WeakHandle<T>) -> Result<Self> {
        if weak.is_empty() {
            return Err(OwnershipError::Empty);
        }
        weak.upgrade().ok_or(OwnershipError::Expired)
    }
}

// Handles compare by the address they observe, not by control block, so an
// aliasing handle equals a handle created directly for the same sub-object.
impl<T: ?Sized, U: ?Sized> PartialEq<SharedHandle<U>> for SharedHandle<T> {
    #[inline]
    fn eq(&self, other: &SharedHandle<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for SharedHandle<T> {}

impl<T: ?Sized> Hash for SharedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("value", &self.get())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<T: ?Sized> fmt::Pointer for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.addr().unwrap_or(std::ptr::null());
        fmt::Pointer::fmt(&addr, f)
    }
}
