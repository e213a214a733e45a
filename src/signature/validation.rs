use crate::proto::Type;

use super::{SignatureError, SignatureErrorKind, MAX_CONTAINER_DEPTH, MAX_SIGNATURE};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Array,
    Struct,
    Dict,
}

/// Validate a signature.
///
/// A valid signature is a non-empty sequence of complete types, at most 255
/// bytes long, with matched struct and dict-entry brackets, basic dict keys,
/// exactly two fields per dict entry, and container nesting bounded by
/// [`MAX_CONTAINER_DEPTH`].
pub(crate) fn validate(bytes: &[u8]) -> Result<(), SignatureError> {
    use SignatureErrorKind::*;

    if bytes.is_empty() {
        return Err(SignatureError::new(Empty));
    }

    if bytes.len() > MAX_SIGNATURE {
        return Err(SignatureError::new(SignatureTooLong));
    }

    // Open containers, innermost last. The counter tracks complete types
    // seen so far directly inside the container.
    let mut stack = Vec::<(Kind, u8)>::new();

    for &b in bytes {
        let t = Type::new(b);

        // `true` when the code is itself valid as a dict key.
        let key_ok = match t {
            Type::BYTE
            | Type::BOOLEAN
            | Type::INT16
            | Type::UINT16
            | Type::INT32
            | Type::UINT32
            | Type::INT64
            | Type::UINT64
            | Type::DOUBLE
            | Type::STRING
            | Type::OBJECT_PATH
            | Type::SIGNATURE
            | Type::UNIX_FD => true,
            Type::VARIANT => false,
            Type::ARRAY => {
                if stack.len() == MAX_CONTAINER_DEPTH {
                    return Err(SignatureError::new(DepthExceeded));
                }

                stack.push((Kind::Array, 0));
                continue;
            }
            Type::OPEN_PAREN => {
                if stack.len() == MAX_CONTAINER_DEPTH {
                    return Err(SignatureError::new(DepthExceeded));
                }

                stack.push((Kind::Struct, 0));
                continue;
            }
            Type::OPEN_BRACE => {
                if stack.len() == MAX_CONTAINER_DEPTH {
                    return Err(SignatureError::new(DepthExceeded));
                }

                if !matches!(stack.last(), Some((Kind::Array, _))) {
                    return Err(SignatureError::new(DictEntryNotInsideArray));
                }

                stack.push((Kind::Dict, 0));
                continue;
            }
            Type::CLOSE_PAREN => match stack.pop() {
                Some((Kind::Struct, 0)) => {
                    return Err(SignatureError::new(StructHasNoFields));
                }
                Some((Kind::Struct, _)) => false,
                Some((Kind::Array, _)) => {
                    return Err(SignatureError::new(MissingArrayElementType));
                }
                _ => {
                    return Err(SignatureError::new(StructEndedButNotStarted));
                }
            },
            Type::CLOSE_BRACE => match stack.pop() {
                Some((Kind::Dict, 2)) => false,
                Some((Kind::Dict, _)) => {
                    return Err(SignatureError::new(DictEntryHasWrongArity));
                }
                Some((Kind::Array, _)) => {
                    return Err(SignatureError::new(MissingArrayElementType));
                }
                _ => {
                    return Err(SignatureError::new(DictEndedButNotStarted));
                }
            },
            t => return Err(SignatureError::new(UnknownTypeCode(t.0))),
        };

        // A complete type just ended. It also completes every array wrapped
        // directly around it.
        let mut wrapped = false;

        while let Some((Kind::Array, _)) = stack.last() {
            stack.pop();
            wrapped = true;
        }

        if let Some((kind, n)) = stack.last_mut() {
            if *kind == Kind::Dict {
                match *n {
                    0 if wrapped || !key_ok => {
                        return Err(SignatureError::new(DictKeyMustBeBasicType));
                    }
                    2 => {
                        return Err(SignatureError::new(DictEntryHasWrongArity));
                    }
                    _ => {}
                }
            }

            *n += 1;
        }
    }

    match stack.pop() {
        Some((Kind::Array, _)) => Err(SignatureError::new(MissingArrayElementType)),
        Some((Kind::Struct, _)) => Err(SignatureError::new(StructStartedButNotEnded)),
        Some((Kind::Dict, _)) => Err(SignatureError::new(DictStartedButNotEnded)),
        None => Ok(()),
    }
}
