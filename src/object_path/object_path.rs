use std::fmt;
use std::str::from_utf8_unchecked;

use super::{validate, ObjectPathBuf, ObjectPathError};

/// A validated object path.
///
/// * The path must begin with `/` and consist of elements separated by
///   slash characters.
/// * Each element must only contain the ASCII characters `[A-Za-z0-9_]`.
/// * No element may be the empty string, so multiple `/` characters cannot
///   occur in sequence and a trailing `/` is only allowed in the root path.
#[derive(PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectPath([u8]);

impl ObjectPath {
    /// The special `"/"` object path.
    pub const ROOT: &'static Self = Self::new_const(b"/");

    /// Construct a new object path, panicking if it is invalid.
    ///
    /// Intended for paths which are literals in the program text.
    #[track_caller]
    pub const fn new_const(path: &[u8]) -> &Self {
        if !validate(path) {
            panic!("Invalid D-Bus object path");
        }

        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Self::new_unchecked(path) }
    }

    /// Construct a new validated object path.
    ///
    /// # Errors
    ///
    /// Errors if the argument is not a valid object path.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::ObjectPath;
    ///
    /// assert!(ObjectPath::new("/org/foo/bar").is_ok());
    /// assert!(ObjectPath::new("/org//bar").is_err());
    /// assert!(ObjectPath::new("foo").is_err());
    /// ```
    pub fn new<P>(path: &P) -> Result<&Self, ObjectPathError>
    where
        P: ?Sized + AsRef<[u8]>,
    {
        let path = path.as_ref();

        if !validate(path) {
            return Err(ObjectPathError);
        }

        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Ok(Self::new_unchecked(path)) }
    }

    /// Construct a new unchecked object path.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the path is a valid object path.
    pub(super) const unsafe fn new_unchecked(path: &[u8]) -> &Self {
        &*(path as *const _ as *const Self)
    }

    /// Get the object path as a string.
    pub fn as_str(&self) -> &str {
        // SAFETY: Validation ensures that the path is ASCII.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Get the object path as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Debug for ObjectPath {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl AsRef<ObjectPath> for ObjectPath {
    #[inline]
    fn as_ref(&self) -> &ObjectPath {
        self
    }
}

impl AsRef<[u8]> for ObjectPath {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ToOwned for ObjectPath {
    type Owned = ObjectPathBuf;

    #[inline]
    fn to_owned(&self) -> Self::Owned {
        // SAFETY: Type ensures that it contains a valid path during
        // construction.
        unsafe { ObjectPathBuf::from_raw_vec(self.0.to_vec()) }
    }
}

impl PartialEq<str> for ObjectPath {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<ObjectPath> for str {
    #[inline]
    fn eq(&self, other: &ObjectPath) -> bool {
        self == other.as_str()
    }
}
