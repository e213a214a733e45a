//! Low level constants for the D-Bus wire protocol.

raw_enum! {
    /// The endianness of a message.
    #[repr(u8)]
    pub enum Endianness {
        /// Little endian.
        LITTLE = b'l',
        /// Big endian.
        BIG = b'B',
    }
}

impl Endianness {
    /// Native endian.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::LITTLE;
    /// Native endian.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::BIG;
}

raw_enum! {
    /// The type of a message.
    #[repr(u8)]
    pub enum MessageType {
        /// Method call. This message type may prompt a reply.
        METHOD_CALL = 1,
        /// Method reply with returned data.
        METHOD_RETURN = 2,
        /// Error reply.
        ERROR = 3,
        /// Signal emission.
        SIGNAL = 4,
    }
}

raw_set! {
    /// Flags inside of a D-Bus message.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::Flags;
    ///
    /// let flags = Flags::EMPTY;
    /// assert!(!(flags & Flags::NO_REPLY_EXPECTED));
    ///
    /// let flags = Flags::EMPTY | Flags::NO_REPLY_EXPECTED;
    /// assert!(flags & Flags::NO_REPLY_EXPECTED);
    /// assert!(!(flags & Flags::NO_AUTO_START));
    /// ```
    #[repr(u8)]
    pub enum Flags {
        /// An empty set of flags.
        EMPTY = 0,
        /// This message does not expect method return replies or error
        /// replies, even if it is of a type that can have a reply; the reply
        /// should be omitted.
        NO_REPLY_EXPECTED = 1,
        /// The bus must not launch an owner for the destination name in
        /// response to this message.
        NO_AUTO_START = 2,
        /// The caller is prepared to wait for interactive authorization on
        /// the receiving side, which might take a considerable time to
        /// complete.
        ALLOW_INTERACTIVE_AUTHORIZATION = 4,
    }
}

raw_enum! {
    /// Keys of the message header field map.
    #[repr(u8)]
    pub(crate) enum Field {
        /// The object to send a call to, or the object a signal is emitted
        /// from.
        PATH = 1,
        /// The interface to invoke a method call on, or that a signal is
        /// emitted from. Optional for method calls, required for signals.
        INTERFACE = 2,
        /// The member, either the method name or signal name.
        MEMBER = 3,
        /// The name of the error that occurred, for errors.
        ERROR_NAME = 4,
        /// The serial number of the message this message is a reply to.
        REPLY_SERIAL = 5,
        /// The name of the connection this message is intended for.
        DESTINATION = 6,
        /// Unique name of the sending connection, controlled by the bus.
        SENDER = 7,
        /// The signature of the message body. If omitted, the body must be
        /// zero length.
        SIGNATURE = 8,
        /// The number of unix file descriptors accompanying the message
        /// out-of-band.
        UNIX_FDS = 9,
    }
}

raw_enum! {
    /// A single type code inside of a signature.
    #[repr(u8)]
    pub(crate) enum Type {
        /// 8-bit unsigned integer.
        BYTE = b'y',
        /// Boolean value, 0 is FALSE and 1 is TRUE. Everything else is
        /// invalid.
        BOOLEAN = b'b',
        /// 16-bit signed integer.
        INT16 = b'n',
        /// 16-bit unsigned integer.
        UINT16 = b'q',
        /// 32-bit signed integer.
        INT32 = b'i',
        /// 32-bit unsigned integer.
        UINT32 = b'u',
        /// 64-bit signed integer.
        INT64 = b'x',
        /// 64-bit unsigned integer.
        UINT64 = b't',
        /// IEEE 754 double.
        DOUBLE = b'd',
        /// UTF-8 string without interior nul bytes.
        STRING = b's',
        /// Name of an object instance.
        OBJECT_PATH = b'o',
        /// A type signature.
        SIGNATURE = b'g',
        /// Array of a single complete type.
        ARRAY = b'a',
        /// Start of a struct.
        OPEN_PAREN = b'(',
        /// End of a struct.
        CLOSE_PAREN = b')',
        /// Variant type; the type of the value is part of the value itself.
        VARIANT = b'v',
        /// Start of a dict entry.
        OPEN_BRACE = b'{',
        /// End of a dict entry.
        CLOSE_BRACE = b'}',
        /// Unix file descriptor, stored on the wire as an index into the
        /// out-of-band descriptor array.
        UNIX_FD = b'h',
    }
}

impl Type {
    /// The wire alignment of a value of this type.
    ///
    /// Container openers report the alignment of the container they start,
    /// so the alignment of a complete type is the alignment of its first
    /// type code.
    pub(crate) fn alignment(self) -> usize {
        match self {
            Self::BYTE | Self::SIGNATURE | Self::VARIANT => 1,
            Self::INT16 | Self::UINT16 => 2,
            Self::INT64 | Self::UINT64 | Self::DOUBLE => 8,
            Self::OPEN_PAREN | Self::OPEN_BRACE => 8,
            _ => 4,
        }
    }

    /// Test if the type is basic, i.e. permitted as a dict key.
    pub(crate) fn is_basic(self) -> bool {
        !matches!(
            self,
            Self::ARRAY
                | Self::VARIANT
                | Self::OPEN_PAREN
                | Self::CLOSE_PAREN
                | Self::OPEN_BRACE
                | Self::CLOSE_BRACE
        )
    }
}
