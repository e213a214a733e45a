use std::fmt;
use std::str::from_utf8_unchecked;

use crate::proto::Type;

use super::{validate, Iter, SignatureBuf, SignatureError};

/// A validated D-Bus type signature.
///
/// A signature describes an ordered sequence of complete types over the
/// alphabet `y b n q i u x t d s o g v h a ( ) { }`.
#[derive(PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Signature([u8]);

impl Signature {
    /// The empty signature, describing a message without a body.
    ///
    /// Note that [`Signature::new`] rejects the empty string, since a
    /// signature read off the wire must describe at least one complete type.
    /// This constant is how the absence of a body is represented.
    pub const EMPTY: &'static Self = unsafe { Self::new_unchecked(b"") };

    /// The signature of a single string.
    pub const STRING: &'static Self = unsafe { Self::new_unchecked(b"s") };

    /// The signature of a single 32-bit unsigned integer.
    pub const UINT32: &'static Self = unsafe { Self::new_unchecked(b"u") };

    /// Construct a new validated signature.
    ///
    /// # Errors
    ///
    /// Errors if the argument is not a valid signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::Signature;
    ///
    /// let sig = Signature::new("a{sv}")?;
    /// assert_eq!(sig.to_string(), "a{sv}");
    /// assert!(Signature::new("a").is_err());
    /// # Ok::<_, wirebus::SignatureError>(())
    /// ```
    pub fn new<S>(signature: &S) -> Result<&Self, SignatureError>
    where
        S: ?Sized + AsRef<[u8]>,
    {
        let bytes = signature.as_ref();
        validate(bytes)?;
        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Ok(Self::new_unchecked(bytes)) }
    }

    /// Construct a new unchecked signature.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the bytes are a valid signature, or the
    /// empty slice.
    pub(crate) const unsafe fn new_unchecked(bytes: &[u8]) -> &Self {
        &*(bytes as *const _ as *const Signature)
    }

    /// Get the signature as a string.
    pub fn as_str(&self) -> &str {
        // SAFETY: Validation ensures the signature is ASCII.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Get the signature as a byte slice, without the trailing nul.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The length of the signature in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Test if the signature is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the complete types of the signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::Signature;
    ///
    /// let sig = Signature::new("sa{sv}(ii)")?;
    /// let types = sig.iter().map(|s| s.as_str()).collect::<Vec<_>>();
    /// assert_eq!(types, ["s", "a{sv}", "(ii)"]);
    /// # Ok::<_, wirebus::SignatureError>(())
    /// ```
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.0)
    }

    /// Test if the signature consists of exactly one complete type, as
    /// required inside a variant.
    pub fn is_single_complete_type(&self) -> bool {
        let mut iter = self.iter();
        iter.next().is_some() && iter.next().is_none()
    }

    /// The wire alignment of the first complete type.
    pub(crate) fn alignment(&self) -> usize {
        match self.0.first() {
            Some(&b) => Type::new(b).alignment(),
            None => 1,
        }
    }
}

impl fmt::Display for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Debug for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl AsRef<Signature> for Signature {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl AsRef<[u8]> for Signature {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ToOwned for Signature {
    type Owned = SignatureBuf;

    #[inline]
    fn to_owned(&self) -> Self::Owned {
        // SAFETY: Type ensures that it contains a valid signature during
        // construction.
        unsafe { SignatureBuf::from_raw_vec(self.0.to_vec()) }
    }
}

impl std::borrow::Borrow<Signature> for SignatureBuf {
    #[inline]
    fn borrow(&self) -> &Signature {
        self
    }
}

impl PartialEq<str> for Signature {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<Signature> for str {
    #[inline]
    fn eq(&self, other: &Signature) -> bool {
        self == other.as_str()
    }
}

impl<'a> IntoIterator for &'a Signature {
    type Item = &'a Signature;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
