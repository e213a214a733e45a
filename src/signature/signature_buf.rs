use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{validate, Signature, SignatureError};

/// An owned [`Signature`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SignatureBuf(Vec<u8>);

impl SignatureBuf {
    /// Construct a new validated owned signature.
    ///
    /// # Errors
    ///
    /// Errors if the argument is not a valid signature.
    pub fn new<S>(signature: &S) -> Result<Self, SignatureError>
    where
        S: ?Sized + AsRef<[u8]>,
    {
        let bytes = signature.as_ref();
        validate(bytes)?;
        Ok(Self(bytes.to_vec()))
    }

    /// The empty signature.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Construct from a vector known to hold a valid signature.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the bytes are a valid signature, or
    /// empty.
    pub(crate) unsafe fn from_raw_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Deref for SignatureBuf {
    type Target = Signature;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: Construction ensures the buffer holds a valid signature.
        unsafe { Signature::new_unchecked(&self.0) }
    }
}

impl AsRef<Signature> for SignatureBuf {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl Borrow<[u8]> for SignatureBuf {
    #[inline]
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&Signature> for SignatureBuf {
    #[inline]
    fn from(signature: &Signature) -> Self {
        signature.to_owned()
    }
}

impl fmt::Display for SignatureBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Debug for SignatureBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl PartialEq<str> for SignatureBuf {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<Signature> for SignatureBuf {
    #[inline]
    fn eq(&self, other: &Signature) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
