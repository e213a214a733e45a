use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

use crate::proto::Field;
use crate::ObjectPathError;
use crate::SignatureBuf;
use crate::SignatureError;
use crate::Value;

/// Result alias using an [`Error`] as the error type by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised by this crate.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Self { kind }
    }

    #[inline]
    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The error used to complete every call still pending when a connection
    /// goes away.
    #[inline]
    pub(crate) fn disconnected(cause: Option<Arc<Error>>) -> Error {
        Self::new(ErrorKind::Disconnected(cause))
    }

    /// Test if the error indicates that the connection has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(&self.kind, ErrorKind::Disconnected(..))
    }

    /// Test if the error indicates that the call was cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(&self.kind, ErrorKind::Cancelled)
    }

    /// Access the error reply a peer answered a method call with, if that is
    /// what this error carries.
    #[inline]
    pub fn method_error(&self) -> Option<&MethodError> {
        match &self.kind {
            ErrorKind::Method(error) => Some(error),
            _ => None,
        }
    }
}

/// A well-formed `ERROR` message received in reply to a method call.
#[derive(Debug, Clone)]
pub struct MethodError {
    pub(crate) name: String,
    pub(crate) body: Arc<[Value]>,
}

impl MethodError {
    /// The error name, such as `org.freedesktop.DBus.Error.UnknownMethod`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The body of the error reply.
    ///
    /// By convention the first value is a human readable message.
    pub fn body(&self) -> &[Value] {
        &self.body
    }

    /// The conventional human readable message, if the error carries one.
    pub fn message(&self) -> Option<&str> {
        match self.body.first() {
            Some(Value::Str(message)) => Some(message),
            _ => None,
        }
    }
}

impl From<SignatureError> for Error {
    #[inline]
    fn from(error: SignatureError) -> Self {
        Self::new(ErrorKind::Signature(error))
    }
}

impl From<ObjectPathError> for Error {
    #[inline]
    fn from(error: ObjectPathError) -> Self {
        Self::new(ErrorKind::ObjectPath(error))
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::new(ErrorKind::Io(Arc::new(error)))
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Self {
        Self::new(ErrorKind::Utf8(error))
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(error) => error.fmt(f),
            ErrorKind::Signature(error) => error.fmt(f),
            ErrorKind::ObjectPath(error) => error.fmt(f),
            ErrorKind::Utf8(error) => error.fmt(f),
            ErrorKind::Method(error) => match error.message() {
                Some(message) => write!(f, "{}: {message}", error.name),
                None => write!(f, "{}", error.name),
            },
            ErrorKind::Disconnected(Some(cause)) => {
                write!(f, "Connection lost: {cause}")
            }
            ErrorKind::Disconnected(None) => write!(f, "Connection closed"),
            ErrorKind::Cancelled => write!(f, "Call cancelled"),
            ErrorKind::MissingBus => write!(f, "No bus address available"),
            ErrorKind::InvalidAddress => write!(f, "Invalid d-bus address"),
            ErrorKind::NoAvailableAddress => {
                write!(f, "No address in the list could be connected to")
            }
            ErrorKind::InvalidSasl => write!(f, "Invalid SASL message"),
            ErrorKind::InvalidSaslResponse => write!(f, "Unexpected SASL command"),
            ErrorKind::SaslLineTooLong => write!(f, "SASL line too long"),
            ErrorKind::AuthRejected => {
                write!(f, "Authentication rejected for every supported mechanism")
            }
            ErrorKind::MissingCookie => {
                write!(f, "No matching cookie in the keyring")
            }
            ErrorKind::FdsNotSupported => {
                write!(f, "Transport does not support unix fd passing")
            }
            ErrorKind::InvalidProtocol => write!(f, "Invalid protocol header"),
            ErrorKind::BufferUnderflow => write!(f, "Buffer underflow"),
            ErrorKind::NotNullTerminated => write!(f, "String is not nul terminated"),
            ErrorKind::StringContainsNull => write!(f, "String contains an interior nul byte"),
            ErrorKind::InvalidBoolean(value) => {
                write!(f, "Boolean wire value {value} is neither 0 nor 1")
            }
            ErrorKind::InvalidVariantSignature => {
                write!(f, "Variant signature is not a single complete type")
            }
            ErrorKind::TrailingBodyBytes => {
                write!(f, "Body contains bytes not covered by its signature")
            }
            ErrorKind::NonZeroPadding => write!(f, "Non-zero padding byte"),
            ErrorKind::ValueSignatureMismatch { expected, found } => {
                write!(f, "Value of signature {found} where {expected} was expected")
            }
            ErrorKind::DepthExceeded => {
                write!(f, "Exceeded maximum container depth (max is 64)")
            }
            ErrorKind::ArrayTooLong(length) => {
                write!(f, "Array of length {length} is too long (max is 67108864)")
            }
            ErrorKind::BodyTooLong(length) => {
                write!(f, "Body of length {length} is too long (max is 134217728)")
            }
            ErrorKind::MessageTooLong(length) => {
                write!(f, "Message of {length} bytes is too long (max is 134217728)")
            }
            ErrorKind::InvalidFdIndex(index) => {
                write!(f, "Fd index {index} has no matching descriptor")
            }
            ErrorKind::FdCountMismatch => {
                write!(f, "UNIX_FDS header does not match received descriptors")
            }
            ErrorKind::MissingHeader(field) => {
                write!(f, "Missing required {field:?} header")
            }
            ErrorKind::InvalidHeader(field) => {
                write!(f, "Header {field:?} has an invalid type or value")
            }
            ErrorKind::ZeroSerial => write!(f, "Zero in header serial"),
            ErrorKind::InvalidInterfaceName => write!(f, "Invalid interface name"),
            ErrorKind::InvalidMemberName => write!(f, "Invalid member name"),
            ErrorKind::InvalidErrorName => write!(f, "Invalid error name"),
            ErrorKind::InvalidBusName => write!(f, "Invalid bus name"),
            ErrorKind::AlreadyExported => {
                write!(f, "An interface is already exported at this location")
            }
            ErrorKind::NotAMethodCall => {
                write!(f, "Only method calls can expect a reply")
            }
            ErrorKind::NotABusConnection => {
                write!(f, "Not a message bus connection")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error.as_ref()),
            ErrorKind::Signature(error) => Some(error),
            ErrorKind::ObjectPath(error) => Some(error),
            ErrorKind::Utf8(error) => Some(error),
            ErrorKind::Disconnected(Some(cause)) => Some(cause.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ErrorKind {
    Io(Arc<io::Error>),
    Signature(SignatureError),
    ObjectPath(ObjectPathError),
    Utf8(Utf8Error),
    Method(MethodError),
    Disconnected(Option<Arc<Error>>),
    Cancelled,
    MissingBus,
    InvalidAddress,
    NoAvailableAddress,
    InvalidSasl,
    InvalidSaslResponse,
    SaslLineTooLong,
    AuthRejected,
    MissingCookie,
    FdsNotSupported,
    InvalidProtocol,
    BufferUnderflow,
    NotNullTerminated,
    StringContainsNull,
    InvalidBoolean(u32),
    InvalidVariantSignature,
    TrailingBodyBytes,
    NonZeroPadding,
    ValueSignatureMismatch {
        expected: SignatureBuf,
        found: SignatureBuf,
    },
    DepthExceeded,
    ArrayTooLong(u32),
    BodyTooLong(u32),
    MessageTooLong(usize),
    InvalidFdIndex(u32),
    FdCountMismatch,
    MissingHeader(Field),
    InvalidHeader(Field),
    ZeroSerial,
    InvalidInterfaceName,
    InvalidMemberName,
    InvalidErrorName,
    InvalidBusName,
    AlreadyExported,
    NotAMethodCall,
    NotABusConnection,
}
