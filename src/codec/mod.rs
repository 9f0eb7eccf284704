pub mod envelope;
pub mod method;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

pub use envelope::{
    decode_envelope, encode_error_envelope, encode_error_envelope_with_stacktrace,
    encode_success_envelope, Envelope,
};
pub use method::{decode_method_call, encode_method_call, MethodCall};

/// Size fields below this value fit in a single byte.
pub const SIZE_U16_MARKER: u8 = 254;

/// Marker for a 4-byte little-endian size field.
pub const SIZE_U32_MARKER: u8 = 255;

/// Largest byte length or element count a size field can carry.
pub const MAX_SIZE: usize = u32::MAX as usize;

/// Maximum container nesting accepted by the decoder.
pub const MAX_NESTING: usize = 64;

/// Standard codec value type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeCode {
    Null = 0,
    True = 1,
    False = 2,
    Int32 = 3,
    Int64 = 4,
    BigInt = 5,
    Float64 = 6,
    String = 7,
    Uint8List = 8,
    Int32List = 9,
    Int64List = 10,
    Float64List = 11,
    List = 12,
    Map = 13,
    Float32List = 14,
}

impl TypeCode {
    pub fn from_u8(v: u8) -> Result<Self, CodecError> {
        match v {
            0 => Ok(Self::Null),
            1 => Ok(Self::True),
            2 => Ok(Self::False),
            3 => Ok(Self::Int32),
            4 => Ok(Self::Int64),
            5 => Ok(Self::BigInt),
            6 => Ok(Self::Float64),
            7 => Ok(Self::String),
            8 => Ok(Self::Uint8List),
            9 => Ok(Self::Int32List),
            10 => Ok(Self::Int64List),
            11 => Ok(Self::Float64List),
            12 => Ok(Self::List),
            13 => Ok(Self::Map),
            14 => Ok(Self::Float32List),
            other => Err(CodecError::UnknownTypeCode(other)),
        }
    }
}

/// A value carried by the standard message codec.
///
/// Maps keep their wire order and may use any value as a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    /// Arbitrary-precision integer, carried as ASCII hex digits.
    BigInt(String),
    Double(f64),
    String(String),
    Uint8List(Bytes),
    Int32List(Vec<i32>),
    Int64List(Vec<i64>),
    Float32List(Vec<f32>),
    Float64List(Vec<f64>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn type_code(&self) -> TypeCode {
        match self {
            Value::Null => TypeCode::Null,
            Value::Bool(true) => TypeCode::True,
            Value::Bool(false) => TypeCode::False,
            Value::Int(_) => TypeCode::Int32,
            Value::Long(_) => TypeCode::Int64,
            Value::BigInt(_) => TypeCode::BigInt,
            Value::Double(_) => TypeCode::Float64,
            Value::String(_) => TypeCode::String,
            Value::Uint8List(_) => TypeCode::Uint8List,
            Value::Int32List(_) => TypeCode::Int32List,
            Value::Int64List(_) => TypeCode::Int64List,
            Value::Float32List(_) => TypeCode::Float32List,
            Value::Float64List(_) => TypeCode::Float64List,
            Value::List(_) => TypeCode::List,
            Value::Map(_) => TypeCode::Map,
        }
    }

    /// Name of the value's runtime type, as shown in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::BigInt(_) => "BigInt",
            Value::Double(_) => "double",
            Value::String(_) => "String",
            Value::Uint8List(_) => "Uint8List",
            Value::Int32List(_) => "Int32List",
            Value::Int64List(_) => "Int64List",
            Value::Float32List(_) => "Float32List",
            Value::Float64List(_) => "Float64List",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Append a variable-width size field.
///
/// One byte below 254, `254` plus a u16 up to `0xFFFF`, `255` plus a u32
/// above that. All multi-byte sizes are little-endian.
///
/// # Panics
///
/// If `size` exceeds [`MAX_SIZE`]; the wire format has no wider field.
pub fn write_size(buf: &mut BytesMut, size: usize) {
    assert!(size <= MAX_SIZE, "size {size} exceeds the 32-bit size field");
    if size < SIZE_U16_MARKER as usize {
        buf.put_u8(size as u8);
    } else if size <= 0xFFFF {
        buf.put_u8(SIZE_U16_MARKER);
        buf.put_u16_le(size as u16);
    } else {
        buf.put_u8(SIZE_U32_MARKER);
        buf.put_u32_le(size as u32);
    }
}

/// Pad with zero bytes until the absolute message offset is a multiple of `alignment`.
fn write_alignment(buf: &mut BytesMut, alignment: usize) {
    let rem = buf.len() % alignment;
    if rem != 0 {
        buf.put_bytes(0, alignment - rem);
    }
}

fn write_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    write_size(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

/// Append `value` to a message buffer.
///
/// `buf` must hold the whole message written so far: alignment of
/// floating-point and typed-array payloads is relative to its start.
///
/// # Panics
///
/// If a string, byte buffer, array or container is longer than
/// [`MAX_SIZE`].
pub fn write_value(buf: &mut BytesMut, value: &Value) {
    buf.put_u8(value.type_code() as u8);
    match value {
        Value::Null | Value::Bool(_) => {}
        Value::Int(v) => buf.put_i32_le(*v),
        Value::Long(v) => buf.put_i64_le(*v),
        Value::BigInt(hex) => write_bytes(buf, hex.as_bytes()),
        Value::Double(v) => {
            write_alignment(buf, 8);
            buf.put_f64_le(*v);
        }
        Value::String(s) => write_bytes(buf, s.as_bytes()),
        Value::Uint8List(bytes) => write_bytes(buf, bytes),
        Value::Int32List(items) => {
            write_size(buf, items.len());
            write_alignment(buf, 4);
            for v in items {
                buf.put_i32_le(*v);
            }
        }
        Value::Int64List(items) => {
            write_size(buf, items.len());
            write_alignment(buf, 8);
            for v in items {
                buf.put_i64_le(*v);
            }
        }
        Value::Float32List(items) => {
            write_size(buf, items.len());
            write_alignment(buf, 4);
            for v in items {
                buf.put_f32_le(*v);
            }
        }
        Value::Float64List(items) => {
            write_size(buf, items.len());
            write_alignment(buf, 8);
            for v in items {
                buf.put_f64_le(*v);
            }
        }
        Value::List(items) => {
            write_size(buf, items.len());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Map(entries) => {
            write_size(buf, entries.len());
            for (key, value) in entries {
                write_value(buf, key);
                write_value(buf, value);
            }
        }
    }
}

/// Encode a single value as a complete message.
///
/// Panics under the same length limit as [`write_value`].
pub fn encode_value(value: &Value) -> Bytes {
    let mut buf = BytesMut::new();
    write_value(&mut buf, value);
    buf.freeze()
}

/// Decode a complete message holding exactly one value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut reader = ValueReader::new(bytes);
    let value = reader.read_value()?;
    reader.finish()?;
    Ok(value)
}

/// Cursor over a standard-codec message.
///
/// Tracks the absolute offset so that aligned payloads decode the same way
/// they were written.
#[derive(Debug, Clone)]
pub struct ValueReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Reject any bytes left after the last value.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_size(&mut self) -> Result<usize, CodecError> {
        match self.read_u8()? {
            SIZE_U16_MARKER => Ok(self.take(2)?.get_u16_le() as usize),
            SIZE_U32_MARKER => Ok(self.take(4)?.get_u32_le() as usize),
            b => Ok(b as usize),
        }
    }

    fn read_alignment(&mut self, alignment: usize) -> Result<(), CodecError> {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.take(alignment - rem)?;
        }
        Ok(())
    }

    /// Fail before allocating when `count` elements of at least
    /// `min_element_len` bytes cannot fit in what is left.
    fn check_count(&self, count: usize, min_element_len: usize) -> Result<(), CodecError> {
        if count.saturating_mul(min_element_len) > self.remaining() {
            return Err(CodecError::SizeExceedsBuffer {
                count,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn read_sized_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_size()?;
        self.take(len)
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_sized_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Read `count` fixed-width elements after aligning to their width.
    fn read_array(&mut self, width: usize) -> Result<(usize, &'a [u8]), CodecError> {
        let count = self.read_size()?;
        self.read_alignment(width)?;
        let len = count.checked_mul(width).ok_or(CodecError::SizeExceedsBuffer {
            count,
            remaining: self.remaining(),
        })?;
        Ok((count, self.take(len)?))
    }

    pub fn read_value(&mut self) -> Result<Value, CodecError> {
        self.read_nested(0)
    }

    fn read_nested(&mut self, depth: usize) -> Result<Value, CodecError> {
        let code = TypeCode::from_u8(self.read_u8()?)?;
        let value = match code {
            TypeCode::Null => Value::Null,
            TypeCode::True => Value::Bool(true),
            TypeCode::False => Value::Bool(false),
            TypeCode::Int32 => Value::Int(self.take(4)?.get_i32_le()),
            TypeCode::Int64 => Value::Long(self.take(8)?.get_i64_le()),
            TypeCode::BigInt => Value::BigInt(self.read_string()?),
            TypeCode::Float64 => {
                self.read_alignment(8)?;
                Value::Double(self.take(8)?.get_f64_le())
            }
            TypeCode::String => Value::String(self.read_string()?),
            TypeCode::Uint8List => {
                Value::Uint8List(Bytes::copy_from_slice(self.read_sized_bytes()?))
            }
            TypeCode::Int32List => {
                let (count, mut data) = self.read_array(4)?;
                Value::Int32List((0..count).map(|_| data.get_i32_le()).collect())
            }
            TypeCode::Int64List => {
                let (count, mut data) = self.read_array(8)?;
                Value::Int64List((0..count).map(|_| data.get_i64_le()).collect())
            }
            TypeCode::Float32List => {
                let (count, mut data) = self.read_array(4)?;
                Value::Float32List((0..count).map(|_| data.get_f32_le()).collect())
            }
            TypeCode::Float64List => {
                let (count, mut data) = self.read_array(8)?;
                Value::Float64List((0..count).map(|_| data.get_f64_le()).collect())
            }
            TypeCode::List => {
                if depth >= MAX_NESTING {
                    return Err(CodecError::NestingTooDeep { max: MAX_NESTING });
                }
                let count = self.read_size()?;
                self.check_count(count, 1)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_nested(depth + 1)?);
                }
                Value::List(items)
            }
            TypeCode::Map => {
                if depth >= MAX_NESTING {
                    return Err(CodecError::NestingTooDeep { max: MAX_NESTING });
                }
                let count = self.read_size()?;
                self.check_count(count, 2)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_nested(depth + 1)?;
                    let value = self.read_nested(depth + 1)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
        };
        Ok(value)
    }
}
