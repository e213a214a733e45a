use crate::error::ErrorKind;
use crate::proto::Endianness;
use crate::utils::padding_to;
use crate::value::UnixFd;
use crate::{Error, Result, Signature, Value};

use super::{MAX_ARRAY_LENGTH, MAX_VALUE_DEPTH};

/// A buffer encoding values with the alignment the wire format requires.
///
/// File descriptors encountered in the stored values are collected into a
/// per-buffer vector and replaced on the wire with their index.
pub struct BodyBuf {
    endianness: Endianness,
    buf: Vec<u8>,
    fds: Vec<UnixFd>,
}

impl BodyBuf {
    /// Construct a new buffer in the native byte order.
    pub fn new() -> Self {
        Self::with_endianness(Endianness::NATIVE)
    }

    /// Construct a new buffer with the given byte order.
    pub fn with_endianness(endianness: Endianness) -> Self {
        Self {
            endianness,
            buf: Vec::new(),
            fds: Vec::new(),
        }
    }

    /// The byte order of this buffer.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Test if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The file descriptors collected from stored values, in index order.
    pub fn fds(&self) -> &[UnixFd] {
        &self.fds
    }

    /// Deconstruct into encoded bytes and collected file descriptors.
    pub fn into_parts(self) -> (Vec<u8>, Vec<UnixFd>) {
        (self.buf, self.fds)
    }

    /// Store a single value, preceded by whatever padding its type
    /// requires.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::{BodyBuf, Value};
    ///
    /// let mut buf = BodyBuf::new();
    /// buf.store(&Value::Byte(1))?;
    /// buf.store(&Value::U32(2))?;
    /// assert_eq!(buf.len(), 8);
    /// # Ok::<_, wirebus::Error>(())
    /// ```
    pub fn store(&mut self, value: &Value) -> Result<()> {
        self.store_value(value, 0)
    }

    /// Store a sequence of values back to back.
    pub fn store_all(&mut self, values: &[Value]) -> Result<()> {
        for value in values {
            self.store_value(value, 0)?;
        }

        Ok(())
    }

    /// Append raw bytes without padding, used for the fixed message header.
    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Advance to the next multiple of `align` by appending zero bytes.
    pub(crate) fn align(&mut self, align: usize) {
        let padding = padding_to(self.buf.len(), align);
        self.buf.resize(self.buf.len() + padding, 0);
    }

    pub(crate) fn store_u16(&mut self, value: u16) {
        self.align(2);

        let bytes = match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        };

        self.buf.extend_from_slice(&bytes);
    }

    pub(crate) fn store_u32(&mut self, value: u32) {
        self.align(4);

        let bytes = match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        };

        self.buf.extend_from_slice(&bytes);
    }

    pub(crate) fn store_u64(&mut self, value: u64) {
        self.align(8);

        let bytes = match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        };

        self.buf.extend_from_slice(&bytes);
    }

    /// Write a `u32` in the buffer's byte order at an absolute position,
    /// used to fill in array length prefixes.
    fn patch_u32(&mut self, at: usize, value: u32) {
        let bytes = match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        };

        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    fn store_str(&mut self, string: &str) -> Result<()> {
        if string.as_bytes().contains(&0) {
            return Err(Error::new(ErrorKind::StringContainsNull));
        }

        self.store_u32(string.len() as u32);
        self.buf.extend_from_slice(string.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn store_signature(&mut self, signature: &Signature) {
        self.buf.push(signature.len() as u8);
        self.buf.extend_from_slice(signature.as_bytes());
        self.buf.push(0);
    }

    fn store_value(&mut self, value: &Value, depth: usize) -> Result<()> {
        match value {
            Value::Byte(value) => {
                self.buf.push(*value);
            }
            Value::Bool(value) => {
                self.store_u32(u32::from(*value));
            }
            Value::I16(value) => {
                self.store_u16(*value as u16);
            }
            Value::U16(value) => {
                self.store_u16(*value);
            }
            Value::I32(value) => {
                self.store_u32(*value as u32);
            }
            Value::U32(value) => {
                self.store_u32(*value);
            }
            Value::I64(value) => {
                self.store_u64(*value as u64);
            }
            Value::U64(value) => {
                self.store_u64(*value);
            }
            Value::F64(value) => {
                self.store_u64(value.to_bits());
            }
            Value::Str(value) => {
                self.store_str(value)?;
            }
            Value::Path(value) => {
                self.store_str(value.as_str())?;
            }
            Value::Sig(value) => {
                self.store_signature(value);
            }
            Value::Variant(value) => {
                let signature = value.signature()?;
                self.store_signature(&signature);
                self.store_value(value, depth)?;
            }
            Value::Fd(fd) => {
                let index = self.fds.len() as u32;
                self.fds.push(fd.clone());
                self.store_u32(index);
            }
            Value::Array(element, values) => {
                if depth + 1 > MAX_VALUE_DEPTH {
                    return Err(Error::new(ErrorKind::DepthExceeded));
                }

                self.store_u32(0);
                let patch = self.buf.len() - 4;

                self.align(element.alignment());
                let start = self.buf.len();

                for value in values {
                    let found = value.signature()?;

                    if found != **element {
                        return Err(Error::new(ErrorKind::ValueSignatureMismatch {
                            expected: element.clone(),
                            found,
                        }));
                    }

                    self.store_value(value, depth + 1)?;
                }

                self.finish_array(patch, start)?;
            }
            Value::Dict(key_sig, value_sig, entries) => {
                if depth + 2 > MAX_VALUE_DEPTH {
                    return Err(Error::new(ErrorKind::DepthExceeded));
                }

                self.store_u32(0);
                let patch = self.buf.len() - 4;

                self.align(8);
                let start = self.buf.len();

                for (key, value) in entries {
                    let found = key.signature()?;

                    if found != **key_sig {
                        return Err(Error::new(ErrorKind::ValueSignatureMismatch {
                            expected: key_sig.clone(),
                            found,
                        }));
                    }

                    let found = value.signature()?;

                    if found != **value_sig {
                        return Err(Error::new(ErrorKind::ValueSignatureMismatch {
                            expected: value_sig.clone(),
                            found,
                        }));
                    }

                    self.align(8);
                    self.store_value(key, depth + 2)?;
                    self.store_value(value, depth + 2)?;
                }

                self.finish_array(patch, start)?;
            }
            Value::Struct(fields) => {
                if depth + 1 > MAX_VALUE_DEPTH {
                    return Err(Error::new(ErrorKind::DepthExceeded));
                }

                self.align(8);

                for field in fields {
                    self.store_value(field, depth + 1)?;
                }
            }
        }

        Ok(())
    }

    /// Fill in the length prefix of an array whose elements ended at the
    /// current position.
    ///
    /// The length excludes the prefix itself and the padding up to the
    /// element alignment.
    fn finish_array(&mut self, patch: usize, start: usize) -> Result<()> {
        let len = self.buf.len() - start;

        if len > MAX_ARRAY_LENGTH as usize {
            return Err(Error::new(ErrorKind::ArrayTooLong(len as u32)));
        }

        self.patch_u32(patch, len as u32);
        Ok(())
    }
}

impl Default for BodyBuf {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
