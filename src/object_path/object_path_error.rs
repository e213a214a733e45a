use std::error;
use std::fmt;

/// Error raised when an object path fails validation.
///
/// A valid object path starts with `/`, has non-empty elements over
/// `[A-Za-z0-9_]` separated by single slashes, and no trailing slash unless
/// it is the root path `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ObjectPathError;

impl fmt::Display for ObjectPathError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid D-Bus object path")
    }
}

impl error::Error for ObjectPathError {}
