//! Single-allocation construction of shared objects.
//!
//! The factory places the control block and the object in one heap
//! allocation. The object's storage is therefore only released together with
//! the block, after the last weak handle is gone.

use crate::inline::InlineControlBlock;
use crate::shared::SharedHandle;
use std::convert::Infallible;

/// Creates a [`SharedHandle`] owning `value`, using one allocation for both
/// the object and its counts.
///
/// ```
/// use ownership_mem::make_shared;
///
/// let handle = make_shared(String::from("hello"));
/// assert_eq!(handle.len(), 5);
/// assert_eq!(handle.use_count(), 1);
/// ```
#[inline]
pub fn make_shared<T: 'static>(value: T) -> SharedHandle<T> {
    make_shared_with(|| value)
}

/// Like [`make_shared`], but builds the object in place of the allocation
/// through `init`.
pub fn make_shared_with<T: 'static>(init: impl FnOnce() -> T) -> SharedHandle<T> {
    match try_make_shared_with(|| Ok::<_, Infallible>(init())) {
        Ok(handle) => handle,
        Err(never) => match never {},
    }
}

/// Like [`make_shared_with`], but `init` may fail.
///
/// The storage is allocated before `init` runs. If `init` returns an error
/// or panics, the storage is released and no destructor runs for the object
/// that was never built.
///
/// ```
/// use ownership_mem::try_make_shared_with;
///
/// let parsed = try_make_shared_with(|| "17".parse::<u32>()).unwrap();
/// assert_eq!(*parsed, 17);
///
/// assert!(try_make_shared_with(|| "x".parse::<u32>()).is_err());
/// ```
pub fn try_make_shared_with<T, E, F>(init: F) -> Result<SharedHandle<T>, E>
where
    T: 'static,
    F: FnOnce() -> Result<T, E>,
{
    let block = InlineControlBlock::new_uninit();
    let value = init()?;
    let (ptr, block) = block.emplace(value);
    Ok(SharedHandle::from_parts(ptr, block))
}
