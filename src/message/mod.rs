//! Complete D-Bus messages and their wire representation.


pub use self::message::{Message, MessageKind};
mod message;

pub(crate) use self::codec::{decode, encode, frame_length, validate};
mod codec;

/// The maximum size of an encoded message in bytes, including the header.
pub(crate) const MAX_MESSAGE_LENGTH: usize = 1 << 27;

/// The length of the fixed part of the message header.
pub(crate) const FIXED_HEADER_LENGTH: usize = 16;

/// The protocol version spoken by this crate.
pub(crate) const PROTOCOL_VERSION: u8 = 1;
