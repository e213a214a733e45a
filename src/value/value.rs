use crate::signature::{validate, SignatureBuf, SignatureError};
use crate::ObjectPathBuf;

use super::UnixFd;

/// A single D-Bus value, tagged by the type it was decoded against.
///
/// Aggregates carry the signatures of their element types so that empty
/// containers stay self-describing.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// An 8-bit unsigned integer (`y`).
    Byte(u8),
    /// A boolean (`b`).
    Bool(bool),
    /// A 16-bit signed integer (`n`).
    I16(i16),
    /// A 16-bit unsigned integer (`q`).
    U16(u16),
    /// A 32-bit signed integer (`i`).
    I32(i32),
    /// A 32-bit unsigned integer (`u`).
    U32(u32),
    /// A 64-bit signed integer (`x`).
    I64(i64),
    /// A 64-bit unsigned integer (`t`).
    U64(u64),
    /// An IEEE 754 double (`d`).
    F64(f64),
    /// A string without interior nul bytes (`s`).
    Str(String),
    /// An object path (`o`).
    Path(ObjectPathBuf),
    /// A type signature (`g`).
    Sig(SignatureBuf),
    /// A self-describing value (`v`).
    Variant(Box<Value>),
    /// A unix file descriptor (`h`).
    Fd(UnixFd),
    /// An array of a single complete element type (`a`), carrying the
    /// element signature.
    Array(SignatureBuf, Vec<Value>),
    /// A dictionary (`a{..}`), carrying the key and value signatures.
    Dict(SignatureBuf, SignatureBuf, Vec<(Value, Value)>),
    /// A struct with one or more fields (`(..)`).
    Struct(Vec<Value>),
}

impl Value {
    /// Wrap a value in a variant.
    pub fn variant(value: Value) -> Self {
        Self::Variant(Box::new(value))
    }

    /// Construct an array value, validating the element signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::Value;
    ///
    /// let strings = Value::array("s", vec![Value::Str("hi".into())])?;
    /// assert_eq!(strings.signature()?.as_str(), "as");
    ///
    /// let empty = Value::array("(ii)", vec![])?;
    /// assert_eq!(empty.signature()?.as_str(), "a(ii)");
    /// # Ok::<_, wirebus::SignatureError>(())
    /// ```
    pub fn array<S>(element: &S, values: Vec<Value>) -> Result<Self, SignatureError>
    where
        S: ?Sized + AsRef<[u8]>,
    {
        let element = SignatureBuf::new(element)?;
        Ok(Self::Array(element, values))
    }

    /// Construct a dictionary value, validating the key and value
    /// signatures.
    pub fn dict<K, V>(
        key: &K,
        value: &V,
        entries: Vec<(Value, Value)>,
    ) -> Result<Self, SignatureError>
    where
        K: ?Sized + AsRef<[u8]>,
        V: ?Sized + AsRef<[u8]>,
    {
        let key = SignatureBuf::new(key)?;
        let value = SignatureBuf::new(value)?;
        Ok(Self::Dict(key, value, entries))
    }

    /// The canonical signature of this single value.
    pub fn signature(&self) -> Result<SignatureBuf, SignatureError> {
        let mut out = Vec::new();
        self.append_signature(&mut out);
        validate(&out)?;
        // SAFETY: Just validated.
        Ok(unsafe { SignatureBuf::from_raw_vec(out) })
    }

    /// The canonical signature of a sequence of values, as carried in the
    /// `SIGNATURE` header of a message with this body.
    pub fn signature_of(values: &[Value]) -> Result<SignatureBuf, SignatureError> {
        if values.is_empty() {
            return Ok(SignatureBuf::empty());
        }

        let mut out = Vec::new();

        for value in values {
            value.append_signature(&mut out);
        }

        validate(&out)?;
        // SAFETY: Just validated.
        Ok(unsafe { SignatureBuf::from_raw_vec(out) })
    }

    fn append_signature(&self, out: &mut Vec<u8>) {
        match self {
            Value::Byte(..) => out.push(b'y'),
            Value::Bool(..) => out.push(b'b'),
            Value::I16(..) => out.push(b'n'),
            Value::U16(..) => out.push(b'q'),
            Value::I32(..) => out.push(b'i'),
            Value::U32(..) => out.push(b'u'),
            Value::I64(..) => out.push(b'x'),
            Value::U64(..) => out.push(b't'),
            Value::F64(..) => out.push(b'd'),
            Value::Str(..) => out.push(b's'),
            Value::Path(..) => out.push(b'o'),
            Value::Sig(..) => out.push(b'g'),
            Value::Variant(..) => out.push(b'v'),
            Value::Fd(..) => out.push(b'h'),
            Value::Array(element, _) => {
                out.push(b'a');
                out.extend_from_slice(element.as_bytes());
            }
            Value::Dict(key, value, _) => {
                out.extend_from_slice(b"a{");
                out.extend_from_slice(key.as_bytes());
                out.extend_from_slice(value.as_bytes());
                out.push(b'}');
            }
            Value::Struct(fields) => {
                out.push(b'(');

                for field in fields {
                    field.append_signature(out);
                }

                out.push(b')');
            }
        }
    }

    /// Access the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Access the value as a 32-bit unsigned integer.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(value) => Some(*value),
            _ => None,
        }
    }

    /// Access the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Access the inner value of a variant.
    pub fn as_variant(&self) -> Option<&Value> {
        match self {
            Value::Variant(value) => Some(value),
            _ => None,
        }
    }

}
