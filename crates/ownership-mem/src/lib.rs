//! # Ownership-Mem
//!
//! Ownership handles for heap objects with an explicit, type-erased control
//! block.
//!
//! ## Features
//!
//! - **Exclusive handles**: Single owner with a pluggable deleter, including arrays
//! - **Shared handles**: Non-atomic strong/weak counting in a separate control block
//! - **Weak handles**: Non-owning observers that can be upgraded while the object lives
//! - **Single-allocation factory**: Object and counts in one heap allocation
//! - **Aliasing**: Shared ownership of an object while observing one of its parts
//! - **Upcasts**: Handles to trait objects that still destroy the concrete type
//!
//! Handles are single-threaded: none of them is `Send` or `Sync`.
//!
//! ## Quick Start
//!
//! ```rust
//! use ownership_mem::{make_shared, ExclusiveHandle, SharedHandle};
//!
//! let owned = ExclusiveHandle::new(String::from("hello"));
//! let shared: SharedHandle<String> = owned.into();
//! let weak = shared.downgrade();
//!
//! let also = make_shared(7_u32);
//! assert_eq!(*also, 7);
//!
//! assert_eq!(weak.lock().as_str(), "hello");
//! drop(shared); // Destroyed when the strong count hits 0
//! assert!(weak.expired());
//! ```
//!
//! ## Tracing
//!
//! With the default `trace` feature, control block transitions are reported
//! as `TRACE` events through the `tracing` crate.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

macro_rules! lifecycle {
    ($($arg:tt)+) => {
        #[cfg(feature = "trace")]
        tracing::trace!($($arg)+);
    };
}

mod block;
mod counter;
mod error;
mod exclusive;
mod factory;
mod inline;
mod pointer;
mod shared;
mod weak;

pub use error::{OwnershipError, Result};
pub use exclusive::{DefaultDelete, Deleter, ExclusiveHandle};
pub use factory::{make_shared, make_shared_with, try_make_shared_with};
pub use shared::SharedHandle;
pub use weak::WeakHandle;
