//! Exclusive ownership handle with a pluggable deletion policy.

use crate::error::empty_deref;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::ptr::{self, NonNull};

/// Releases an owned object.
///
/// Any `FnMut(NonNull<T>)` closure is a deleter, so one-off release logic
/// does not need a named type.
pub trait Deleter<T: ?Sized> {
    /// Releases the object behind `ptr`.
    ///
    /// # Safety
    ///
    /// The caller must own `ptr`, it must be releasable by this deleter, and
    /// it must not be used again.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Frees objects allocated through `Box`.
///
/// For slices the element count travels in the pointer itself, so the same
/// policy releases both single objects and `[T]` arrays.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

impl<T: ?Sized, F: FnMut(NonNull<T>)> Deleter<T> for F {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr)
    }
}

/// Sole owner of a heap object.
///
/// `ExclusiveHandle` cannot be cloned; moving it moves ownership. When the
/// handle is dropped or reset, its deleter runs exactly once on the owned
/// pointer, and not at all if the handle is empty.
///
/// # Example
///
/// ```
/// use ownership_mem::ExclusiveHandle;
///
/// let mut handle = ExclusiveHandle::new(String::from("owned"));
/// handle.push_str(" once");
/// assert_eq!(&*handle, "owned once");
///
/// let array = ExclusiveHandle::from_vec(vec![1, 2, 3]);
/// assert_eq!(array[1], 2);
/// ```
pub struct ExclusiveHandle<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    ptr: Option<NonNull<T>>,
    deleter: D,
    _owns: PhantomData<T>,
}

impl<T> ExclusiveHandle<T> {
    /// Moves `value` onto the heap and takes ownership of it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T> ExclusiveHandle<[T]> {
    /// Takes ownership of the vector's elements as a boxed slice.
    pub fn from_vec(values: Vec<T>) -> Self {
        Self::from_box(values.into_boxed_slice())
    }
}

impl<T: ?Sized> ExclusiveHandle<T> {
    pub fn from_box(boxed: Box<T>) -> Self {
        Self {
            ptr: Some(NonNull::from(Box::leak(boxed))),
            deleter: DefaultDelete,
            _owns: PhantomData,
        }
    }

    /// Takes ownership of a pointer produced by `Box::into_raw`.
    ///
    /// A null pointer gives an empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from `Box::into_raw`, and nothing else may
    /// release it.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::from_raw_with_deleter(ptr, DefaultDelete)
    }

    /// Gives the object back as a `Box`, or `None` for an empty handle.
    pub fn into_box(self) -> Option<Box<T>> {
        let (ptr, _) = self.into_raw_parts();
        // SAFETY: with DefaultDelete the pointer was always a Box.
        ptr.map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }

    /// Replaces the owned object with `boxed`, dropping the previous one.
    pub fn reset_box(&mut self, boxed: Box<T>) {
        // SAFETY: a fresh Box is exactly what DefaultDelete releases.
        unsafe { self.reset_raw(NonNull::from(Box::leak(boxed))) }
    }

    /// Converts into a handle over a related type, typically a trait object.
    ///
    /// ```
    /// use ownership_mem::ExclusiveHandle;
    /// use std::fmt::Display;
    ///
    /// let number = ExclusiveHandle::new(5_u8);
    /// let shown: ExclusiveHandle<dyn Display> = number.upcast(|b| b as Box<dyn Display>);
    /// assert_eq!(shown.to_string(), "5");
    /// ```
    pub fn upcast<U: ?Sized>(self, coerce: impl FnOnce(Box<T>) -> Box<U>) -> ExclusiveHandle<U> {
        match self.into_box() {
            Some(boxed) => ExclusiveHandle::from_box(coerce(boxed)),
            None => ExclusiveHandle::empty(),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> ExclusiveHandle<T, D> {
    /// A handle that owns nothing.
    pub fn empty() -> Self
    where
        D: Default,
    {
        Self {
            ptr: None,
            deleter: D::default(),
            _owns: PhantomData,
        }
    }

    /// Takes ownership of `ptr`, to be released through `deleter`.
    ///
    /// A null pointer gives an empty handle that still keeps `deleter`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid until `deleter` releases it, and nothing
    /// else may release it.
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: D) -> Self {
        Self {
            ptr: NonNull::new(ptr),
            deleter,
            _owns: PhantomData,
        }
    }

    /// Gives up ownership without running the deleter.
    ///
    /// The caller becomes responsible for releasing the returned pointer.
    #[must_use = "the released pointer leaks unless it is freed"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Releases the owned object, if any, leaving the handle empty.
    pub fn reset(&mut self) {
        if let Some(old) = self.ptr.take() {
            // SAFETY: the handle owned `old` and has just forgotten it.
            unsafe { self.deleter.delete(old) }
        }
    }

    /// Takes ownership of `ptr` and releases the previously owned object.
    ///
    /// The old object is released even when `ptr` has the same address, as
    /// every zero-sized `Box` does.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid until this handle's deleter releases it, and
    /// nothing else may release it. It must not be the object this handle
    /// currently owns.
    pub unsafe fn reset_raw(&mut self, ptr: NonNull<T>) {
        if let Some(old) = self.ptr.replace(ptr) {
            self.deleter.delete(old);
        }
    }

    /// Exchanges both the owned pointers and the deleters.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: the handle owns the object, so it is alive.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: exclusive ownership plus `&mut self` rules out aliases.
        self.ptr.map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    pub fn deleter_mut(&mut self) -> &mut D {
        &mut self.deleter
    }

    /// Splits the handle into its pointer and deleter without releasing.
    pub fn into_raw_parts(self) -> (Option<NonNull<T>>, D) {
        let mut this = ManuallyDrop::new(self);
        let ptr = this.ptr.take();
        // SAFETY: `this` is never dropped, so the deleter is moved out once.
        let deleter = unsafe { ptr::read(&this.deleter) };
        (ptr, deleter)
    }

    /// Converts the pointer to a related type, carrying the deleter along.
    ///
    /// # Safety
    ///
    /// `coerce` must return a pointer to the same object (an unsizing or
    /// upcasting conversion), and `D` must release it correctly as a `U`.
    pub unsafe fn cast<U: ?Sized>(
        self,
        coerce: impl FnOnce(NonNull<T>) -> NonNull<U>,
    ) -> ExclusiveHandle<U, D>
    where
        D: Deleter<U>,
    {
        let (ptr, deleter) = self.into_raw_parts();
        ExclusiveHandle {
            ptr: ptr.map(coerce),
            deleter,
            _owns: PhantomData,
        }
    }
}

impl<T, D: Deleter<[T]>> ExclusiveHandle<[T], D> {
    /// Number of owned elements, zero for an empty handle.
    pub fn len(&self) -> usize {
        self.get().map_or(0, <[T]>::len)
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for ExclusiveHandle<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for ExclusiveHandle<T, D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for ExclusiveHandle<T, D> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => empty_deref("ExclusiveHandle"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for ExclusiveHandle<T, D> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => empty_deref("ExclusiveHandle"),
        }
    }
}

impl<T, D: Deleter<[T]>> Index<usize> for ExclusiveHandle<[T], D> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &(**self)[index]
    }
}

impl<T, D: Deleter<[T]>> IndexMut<usize> for ExclusiveHandle<[T], D> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut (**self)[index]
    }
}

impl<T: ?Sized> From<Box<T>> for ExclusiveHandle<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for ExclusiveHandle<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveHandle")
            .field("value", &self.get())
            .finish()
    }
}
