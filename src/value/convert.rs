use crate::{ObjectPath, ObjectPathBuf, Signature, SignatureBuf};

use super::{UnixFd, Value};

macro_rules! from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    }
}

from_primitive! {
    u8 => Byte,
    bool => Bool,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f64 => F64,
    String => Str,
    ObjectPathBuf => Path,
    SignatureBuf => Sig,
    UnixFd => Fd,
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<&ObjectPath> for Value {
    #[inline]
    fn from(value: &ObjectPath) -> Self {
        Value::Path(value.to_owned())
    }
}

impl From<&Signature> for Value {
    #[inline]
    fn from(value: &Signature) -> Self {
        Value::Sig(value.to_owned())
    }
}
