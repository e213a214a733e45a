use std::str::from_utf8;

use crate::error::ErrorKind;
use crate::proto::{Endianness, Type};
use crate::signature::complete_type_len;
use crate::utils::padding_to;
use crate::value::UnixFd;
use crate::{Error, ObjectPath, Result, Signature, Value};

use super::{MAX_ARRAY_LENGTH, MAX_VALUE_DEPTH};

/// A reader decoding values off an encoded body.
///
/// Every container read is bounded by its declared length, depth is capped,
/// and strings, paths, booleans and padding are validated as they are read.
pub struct Body<'a> {
    buf: &'a [u8],
    pos: usize,
    endianness: Endianness,
    fds: &'a [UnixFd],
}

impl<'a> Body<'a> {
    /// Construct a reader over an encoded body.
    ///
    /// `fds` holds the descriptors received out-of-band with the message,
    /// which values of type `h` index into.
    pub fn new(buf: &'a [u8], endianness: Endianness, fds: &'a [UnixFd]) -> Self {
        Self {
            buf,
            pos: 0,
            endianness,
            fds,
        }
    }

    /// The number of bytes not yet consumed.
    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Test if the reader has been fully consumed.
    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Decode the complete body against the given signature.
    ///
    /// Bytes not covered by the signature are an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::{Body, BodyBuf, Signature, Value};
    ///
    /// let mut buf = BodyBuf::new();
    /// buf.store(&Value::from("hello"))?;
    ///
    /// let values = Body::new(buf.as_bytes(), buf.endianness(), &[])
    ///     .load(Signature::new("s")?)?;
    /// assert_eq!(values, [Value::from("hello")]);
    /// # Ok::<_, wirebus::Error>(())
    /// ```
    pub fn load(mut self, signature: &Signature) -> Result<Vec<Value>> {
        let mut values = Vec::new();

        for ty in signature.iter() {
            values.push(self.load_value(ty, 0)?);
        }

        if !self.is_empty() {
            return Err(Error::new(ErrorKind::TrailingBodyBytes));
        }

        Ok(values)
    }

    /// Decode a sequence of values without requiring the buffer to be fully
    /// consumed, used for the header field array.
    pub(crate) fn load_partial(&mut self, signature: &Signature) -> Result<Vec<Value>> {
        let mut values = Vec::new();

        for ty in signature.iter() {
            values.push(self.load_value(ty, 0)?);
        }

        Ok(values)
    }

    /// Consume padding up to the given alignment, requiring it to be zero.
    fn align(&mut self, align: usize) -> Result<()> {
        let padding = padding_to(self.pos, align);
        let bytes = self.read_bytes(padding)?;

        if bytes.iter().any(|&b| b != 0) {
            return Err(Error::new(ErrorKind::NonZeroPadding));
        }

        Ok(())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let Some(bytes) = self.buf.get(self.pos..self.pos + n) else {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        };

        self.pos += n;
        Ok(bytes)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        self.align(2)?;
        let bytes = self.read_bytes(2)?;
        let bytes = [bytes[0], bytes[1]];

        Ok(match self.endianness {
            Endianness::BIG => u16::from_be_bytes(bytes),
            _ => u16::from_le_bytes(bytes),
        })
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        self.align(4)?;
        let bytes = self.read_bytes(4)?;
        let bytes = [bytes[0], bytes[1], bytes[2], bytes[3]];

        Ok(match self.endianness {
            Endianness::BIG => u32::from_be_bytes(bytes),
            _ => u32::from_le_bytes(bytes),
        })
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        self.align(8)?;
        let bytes = self.read_bytes(8)?;
        let mut raw = [0; 8];
        raw.copy_from_slice(bytes);

        Ok(match self.endianness {
            Endianness::BIG => u64::from_be_bytes(raw),
            _ => u64::from_le_bytes(raw),
        })
    }

    fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;

        if self.read_byte()? != 0 {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        if bytes.contains(&0) {
            return Err(Error::new(ErrorKind::StringContainsNull));
        }

        Ok(from_utf8(bytes)?)
    }

    fn read_signature(&mut self) -> Result<&'a Signature> {
        let len = self.read_byte()? as usize;
        let bytes = self.read_bytes(len)?;

        if self.read_byte()? != 0 {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        if bytes.is_empty() {
            return Ok(Signature::EMPTY);
        }

        Ok(Signature::new(bytes)?)
    }

    /// Decode one value against a single complete type.
    fn load_value(&mut self, signature: &Signature, depth: usize) -> Result<Value> {
        let bytes = signature.as_bytes();

        let Some(&code) = bytes.first() else {
            return Err(Error::new(ErrorKind::InvalidVariantSignature));
        };

        Ok(match Type::new(code) {
            Type::BYTE => Value::Byte(self.read_byte()?),
            Type::BOOLEAN => match self.read_u32()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                value => return Err(Error::new(ErrorKind::InvalidBoolean(value))),
            },
            Type::INT16 => Value::I16(self.read_u16()? as i16),
            Type::UINT16 => Value::U16(self.read_u16()?),
            Type::INT32 => Value::I32(self.read_u32()? as i32),
            Type::UINT32 => Value::U32(self.read_u32()?),
            Type::INT64 => Value::I64(self.read_u64()? as i64),
            Type::UINT64 => Value::U64(self.read_u64()?),
            Type::DOUBLE => Value::F64(f64::from_bits(self.read_u64()?)),
            Type::STRING => Value::Str(self.read_str()?.to_owned()),
            Type::OBJECT_PATH => {
                let path = self.read_str()?;
                Value::Path(ObjectPath::new(path)?.to_owned())
            }
            Type::SIGNATURE => Value::Sig(self.read_signature()?.to_owned()),
            Type::VARIANT => {
                let signature = self.read_signature()?;

                if !signature.is_single_complete_type() {
                    return Err(Error::new(ErrorKind::InvalidVariantSignature));
                }

                Value::variant(self.load_value(signature, depth)?)
            }
            Type::UNIX_FD => {
                let index = self.read_u32()?;

                let Some(fd) = self.fds.get(index as usize) else {
                    return Err(Error::new(ErrorKind::InvalidFdIndex(index)));
                };

                Value::Fd(fd.clone())
            }
            Type::ARRAY => {
                // SAFETY: A complete type out of a valid signature minus its
                // array marker is itself a valid signature.
                let element = unsafe { Signature::new_unchecked(&bytes[1..]) };

                if element.as_bytes().first() == Some(&b'{') {
                    self.load_dict(element, depth)?
                } else {
                    self.load_array(element, depth)?
                }
            }
            Type::OPEN_PAREN => {
                if depth + 1 > MAX_VALUE_DEPTH {
                    return Err(Error::new(ErrorKind::DepthExceeded));
                }

                // SAFETY: As above, the field list of a valid struct type is
                // a valid signature.
                let fields = unsafe { Signature::new_unchecked(&bytes[1..bytes.len() - 1]) };

                self.align(8)?;

                let mut values = Vec::new();

                for field in fields.iter() {
                    values.push(self.load_value(field, depth + 1)?);
                }

                Value::Struct(values)
            }
            _ => return Err(Error::new(ErrorKind::InvalidProtocol)),
        })
    }

    fn read_array_end(&mut self, element_alignment: usize) -> Result<usize> {
        let len = self.read_u32()?;

        if len > MAX_ARRAY_LENGTH {
            return Err(Error::new(ErrorKind::ArrayTooLong(len)));
        }

        self.align(element_alignment)?;

        let end = self.pos + len as usize;

        if end > self.buf.len() {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        }

        Ok(end)
    }

    fn load_array(&mut self, element: &Signature, depth: usize) -> Result<Value> {
        if depth + 1 > MAX_VALUE_DEPTH {
            return Err(Error::new(ErrorKind::DepthExceeded));
        }

        let end = self.read_array_end(element.alignment())?;
        let mut values = Vec::new();

        while self.pos < end {
            values.push(self.load_value(element, depth + 1)?);
        }

        if self.pos != end {
            return Err(Error::new(ErrorKind::TrailingBodyBytes));
        }

        Ok(Value::Array(element.to_owned(), values))
    }

    fn load_dict(&mut self, entry: &Signature, depth: usize) -> Result<Value> {
        if depth + 2 > MAX_VALUE_DEPTH {
            return Err(Error::new(ErrorKind::DepthExceeded));
        }

        let inner = entry.as_bytes();
        // Split `{KV}` into the key code and the value type.
        let Some(key_len) = complete_type_len(&inner[1..]) else {
            return Err(Error::new(ErrorKind::InvalidProtocol));
        };

        // SAFETY: Both halves of a valid dict entry type are themselves
        // valid signatures.
        let key_sig = unsafe { Signature::new_unchecked(&inner[1..1 + key_len]) };
        let value_sig =
            unsafe { Signature::new_unchecked(&inner[1 + key_len..inner.len() - 1]) };

        let end = self.read_array_end(8)?;
        let mut entries = Vec::new();

        while self.pos < end {
            self.align(8)?;
            let key = self.load_value(key_sig, depth + 2)?;
            let value = self.load_value(value_sig, depth + 2)?;
            entries.push((key, value));
        }

        if self.pos != end {
            return Err(Error::new(ErrorKind::TrailingBodyBytes));
        }

        Ok(Value::Dict(key_sig.to_owned(), value_sig.to_owned(), entries))
    }
}
