use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{validate, ObjectPath, ObjectPathError};

/// An owned [`ObjectPath`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectPathBuf(Vec<u8>);

impl ObjectPathBuf {
    /// Construct a new validated owned object path.
    ///
    /// # Errors
    ///
    /// Errors if the argument is not a valid object path.
    pub fn new<P>(path: &P) -> Result<Self, ObjectPathError>
    where
        P: ?Sized + AsRef<[u8]>,
    {
        let path = path.as_ref();

        if !validate(path) {
            return Err(ObjectPathError);
        }

        Ok(Self(path.to_vec()))
    }

    /// Construct from a vector known to hold a valid object path.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the bytes are a valid object path.
    pub(super) unsafe fn from_raw_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Deref for ObjectPathBuf {
    type Target = ObjectPath;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: Construction ensures the buffer holds a valid path.
        unsafe { ObjectPath::new_unchecked(&self.0) }
    }
}

impl AsRef<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn as_ref(&self) -> &ObjectPath {
        self
    }
}

impl Borrow<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn borrow(&self) -> &ObjectPath {
        self
    }
}

impl From<&ObjectPath> for ObjectPathBuf {
    #[inline]
    fn from(path: &ObjectPath) -> Self {
        path.to_owned()
    }
}

impl fmt::Display for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Debug for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl PartialEq<str> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &ObjectPath) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
