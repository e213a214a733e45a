use std::fmt;

/// A byte slice which formats lossily as a string.
///
/// Used when surfacing protocol text that is expected to be ASCII but is
/// controlled by the peer.
#[repr(transparent)]
pub(crate) struct LossyStr([u8]);

impl LossyStr {
    #[inline]
    pub(crate) fn new(bytes: &[u8]) -> &LossyStr {
        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { &*(bytes as *const _ as *const LossyStr) }
    }
}

impl fmt::Display for LossyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for LossyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
