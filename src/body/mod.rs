//! The bidirectional codec for message bodies.
//!
//! Values are written and read with strict alignment: before a value of a
//! given type, the stream position is advanced to the next multiple of that
//! type's alignment, counted from the start of the message. Bodies always
//! begin on an 8-byte boundary, so encoding them against position zero is
//! equivalent.

#[cfg(test)]
mod tests;

pub use self::body_buf::BodyBuf;
mod body_buf;

pub use self::body::Body;
mod body;

/// The maximum length of an array in bytes.
pub(crate) const MAX_ARRAY_LENGTH: u32 = 1u32 << 26;
/// The maximum length of a body in bytes.
pub(crate) const MAX_BODY_LENGTH: u32 = 1u32 << 27;
/// The maximum number of open arrays and structs around a single value,
/// with a dict counting once for the array and once for the entry.
pub(crate) const MAX_VALUE_DEPTH: usize = 64;
