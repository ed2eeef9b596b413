//! Errors reported by fallible handle operations.

use thiserror::Error;

/// Reasons a handle operation could not be carried out.
///
/// Most misuse of a handle is a caller bug and is not reported here; this
/// covers the cases where the state of the object is the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// The handle does not own or observe any object.
    #[error("handle is empty")]
    Empty,

    /// The weak handle's object has already been destroyed.
    #[error("weak handle has expired")]
    Expired,
}

/// Result alias with [`OwnershipError`] as the default error.
pub type Result<T, E = OwnershipError> = std::result::Result<T, E>;

/// Reports a dereference of a handle that owns nothing.
///
/// This is a caller bug, not a recoverable condition.
#[cold]
#[track_caller]
#[allow(clippy::panic)]
pub(crate) fn empty_deref(handle: &str) -> ! {
    panic!("dereferenced an empty {handle}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(OwnershipError::Empty.to_string(), "handle is empty");
        assert_eq!(OwnershipError::Expired.to_string(), "weak handle has expired");
    }

    #[test]
    #[should_panic(expected = "dereferenced an empty SharedHandle")]
    fn test_empty_deref_message() {
        empty_deref("SharedHandle");
    }
}
