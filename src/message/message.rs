use std::num::NonZeroU32;

use crate::proto::{Flags, MessageType};
use crate::{ObjectPath, ObjectPathBuf, Result, SignatureBuf, Value};

/// The kind of a [`Message`], together with the header fields required for
/// that kind.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MessageKind {
    /// A method call.
    MethodCall {
        /// The path of the object being called.
        path: ObjectPathBuf,
        /// The member being called.
        member: String,
    },
    /// A reply to a method call.
    MethodReturn {
        /// The serial of the call this is a reply to.
        reply_serial: NonZeroU32,
    },
    /// An error reply.
    Error {
        /// The name of the error.
        error_name: String,
        /// The serial of the call this is a reply to.
        reply_serial: NonZeroU32,
    },
    /// A broadcast or unicast signal.
    Signal {
        /// The path of the object emitting the signal.
        path: ObjectPathBuf,
        /// The interface the signal belongs to.
        interface: String,
        /// The signal name.
        member: String,
    },
}

/// A complete D-Bus message.
///
/// Messages are immutable once constructed; the `with_` methods consume and
/// return the modified message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub(crate) kind: MessageKind,
    pub(crate) serial: Option<NonZeroU32>,
    pub(crate) flags: Flags,
    pub(crate) interface: Option<String>,
    pub(crate) destination: Option<String>,
    pub(crate) sender: Option<String>,
    pub(crate) signature: SignatureBuf,
    pub(crate) body: Vec<Value>,
}

impl Message {
    fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            serial: None,
            flags: Flags::EMPTY,
            interface: None,
            destination: None,
            sender: None,
            signature: SignatureBuf::empty(),
            body: Vec::new(),
        }
    }

    /// Construct a method call.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::{Message, MessageKind, ObjectPath};
    ///
    /// let m = Message::method_call(ObjectPath::new_const(b"/org/freedesktop/DBus"), "Hello")
    ///     .with_interface("org.freedesktop.DBus")
    ///     .with_destination("org.freedesktop.DBus");
    ///
    /// assert!(matches!(m.kind(), MessageKind::MethodCall { .. }));
    /// ```
    pub fn method_call(path: &ObjectPath, member: &str) -> Self {
        Self::new(MessageKind::MethodCall {
            path: path.to_owned(),
            member: member.to_owned(),
        })
    }

    /// Construct a method return replying to the given serial.
    pub fn method_return(reply_serial: NonZeroU32) -> Self {
        Self::new(MessageKind::MethodReturn { reply_serial })
    }

    /// Construct an error replying to the given serial.
    pub fn error(error_name: &str, reply_serial: NonZeroU32) -> Self {
        Self::new(MessageKind::Error {
            error_name: error_name.to_owned(),
            reply_serial,
        })
    }

    /// Construct a signal.
    pub fn signal(path: &ObjectPath, interface: &str, member: &str) -> Self {
        Self::new(MessageKind::Signal {
            path: path.to_owned(),
            interface: interface.to_owned(),
            member: member.to_owned(),
        })
    }

    /// The kind of the message.
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// The serial of the message.
    ///
    /// Present on received messages and on sent messages once the outbound
    /// loop has assigned one.
    pub fn serial(&self) -> Option<NonZeroU32> {
        self.serial
    }

    /// The flags of the message.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The interface of a method call, if any.
    ///
    /// For signals the interface lives in [`MessageKind::Signal`].
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// The destination of the message, if any.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// The sender of the message as filled in by the bus, if any.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// The signature of the body.
    pub fn signature(&self) -> &SignatureBuf {
        &self.signature
    }

    /// The decoded body of the message.
    pub fn body(&self) -> &[Value] {
        &self.body
    }

    /// Take the body out of the message.
    pub fn take_body(&mut self) -> Vec<Value> {
        self.signature = SignatureBuf::empty();
        std::mem::take(&mut self.body)
    }

    /// Modify the flags of the message.
    #[must_use]
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Modify the interface of the message.
    #[must_use]
    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_owned());
        self
    }

    /// Modify the destination of the message.
    #[must_use]
    pub fn with_destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_owned());
        self
    }

    /// Set the body of the message.
    ///
    /// The body signature is derived from the values.
    ///
    /// # Errors
    ///
    /// Errors if the values do not form an encodable body, such as nesting
    /// beyond the container depth limit.
    pub fn with_body(mut self, body: Vec<Value>) -> Result<Self> {
        self.signature = Value::signature_of(&body)?;
        self.body = body;
        Ok(self)
    }

    /// Test if the message wants a reply.
    pub(crate) fn expects_reply(&self) -> bool {
        matches!(self.kind, MessageKind::MethodCall { .. })
            && !(self.flags & Flags::NO_REPLY_EXPECTED)
    }

    pub(crate) fn message_type(&self) -> MessageType {
        match &self.kind {
            MessageKind::MethodCall { .. } => MessageType::METHOD_CALL,
            MessageKind::MethodReturn { .. } => MessageType::METHOD_RETURN,
            MessageKind::Error { .. } => MessageType::ERROR,
            MessageKind::Signal { .. } => MessageType::SIGNAL,
        }
    }
}
