use std::error;
use std::fmt;

/// Detailed errors raised when validation of a [`Signature`] fails.
///
/// [`Signature`]: crate::Signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureError {
    pub(super) kind: SignatureErrorKind,
}

impl SignatureError {
    #[inline]
    pub(crate) const fn new(kind: SignatureErrorKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SignatureErrorKind {
    Empty,
    UnknownTypeCode(u8),
    SignatureTooLong,
    MissingArrayElementType,
    StructEndedButNotStarted,
    DictEndedButNotStarted,
    StructStartedButNotEnded,
    DictStartedButNotEnded,
    StructHasNoFields,
    DictKeyMustBeBasicType,
    DictEntryHasWrongArity,
    DictEntryNotInsideArray,
    DepthExceeded,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SignatureErrorKind::Empty => {
                write!(f, "Signature is empty")
            }
            SignatureErrorKind::UnknownTypeCode(code) => {
                write!(f, "Unknown type code `{}`", code.escape_ascii())
            }
            SignatureErrorKind::SignatureTooLong => {
                write!(f, "Signature too long (max is 255)")
            }
            SignatureErrorKind::MissingArrayElementType => {
                write!(f, "Missing array element type")
            }
            SignatureErrorKind::StructEndedButNotStarted => {
                write!(f, "Struct ended but not started")
            }
            SignatureErrorKind::DictEndedButNotStarted => {
                write!(f, "Dict entry ended but not started")
            }
            SignatureErrorKind::StructStartedButNotEnded => {
                write!(f, "Struct started but not ended")
            }
            SignatureErrorKind::DictStartedButNotEnded => {
                write!(f, "Dict entry started but not ended")
            }
            SignatureErrorKind::StructHasNoFields => {
                write!(f, "Struct has no fields")
            }
            SignatureErrorKind::DictKeyMustBeBasicType => {
                write!(f, "Dict key must be a basic type")
            }
            SignatureErrorKind::DictEntryHasWrongArity => {
                write!(f, "Dict entry must have exactly a key and a value")
            }
            SignatureErrorKind::DictEntryNotInsideArray => {
                write!(f, "Dict entry must be an array element")
            }
            SignatureErrorKind::DepthExceeded => {
                write!(f, "Exceeded maximum container depth (max is 64)")
            }
        }
    }
}

impl error::Error for SignatureError {}
