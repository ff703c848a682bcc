//! Binary record wire format
//!
//! Every record begins with a 4-byte little-endian constructor tag followed by
//! its fields in declared order. Integers are little-endian, `int128`/`int256`
//! are raw 16/32-byte blocks, and byte strings are length-prefixed and padded
//! to a 4-byte boundary:
//!
//! ```text
//!  short form (len <= 253)            long form (len >= 254)
//! ┌─────┬──────────────┬─────────┐   ┌──────┬──────────────┬──────────────┬─────────┐
//! │ len │ data (len)   │ pad 0-3 │   │ 0xFE │ len (3, LE)  │ data (len)   │ pad 0-3 │
//! └─────┴──────────────┴─────────┘   └──────┴──────────────┴──────────────┴─────────┘
//! ```
//!
//! A vector is `0x1cb5c415`, a 4-byte element count, then `count` fixed-size
//! elements.

use crate::error::{ProtocolError, Result};
use std::ops::Index;

/// Constructor tag of the generic vector container
pub const VECTOR_CONSTRUCTOR: u32 = 0x1cb5_c415;

/// Largest byte string representable by the 3-byte long-form length
pub const MAX_BYTES_LEN: usize = 0x00ff_ffff;

/// Marker byte introducing the long-form length
const LONG_FORM_MARKER: u8 = 0xfe;

/// 128-bit opaque integer (nonces)
pub type Int128 = [u8; 16];

/// 256-bit opaque integer (new_nonce)
pub type Int256 = [u8; 32];

/// Size on the wire of a length-prefixed byte string of `len` bytes
pub fn bytes_encoded_len(len: usize) -> usize {
    let header = if len <= 253 { 1 } else { 4 };
    (header + len).div_ceil(4) * 4
}

/// Append-only record writer
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Write a constructor tag
    pub fn write_constructor(&mut self, constructor: u32) {
        self.write_u32(constructor);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_int128(&mut self, value: &Int128) {
        self.buf.extend_from_slice(value);
    }

    pub fn write_int256(&mut self, value: &Int256) {
        self.buf.extend_from_slice(value);
    }

    /// Write a length-prefixed, 4-byte aligned byte string
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let len = data.len();
        if len > MAX_BYTES_LEN {
            return Err(ProtocolError::malformed(format!(
                "Byte string too long: {len} bytes (max: {MAX_BYTES_LEN})"
            )));
        }

        let header = if len <= 253 {
            self.buf.push(len as u8);
            1
        } else {
            self.buf.push(LONG_FORM_MARKER);
            self.buf.extend_from_slice(&(len as u32).to_le_bytes()[..3]);
            4
        };
        self.buf.extend_from_slice(data);

        let padding = bytes_encoded_len(len) - header - len;
        self.buf.extend(std::iter::repeat(0u8).take(padding));
        Ok(())
    }

    /// Write a UTF-8 string using the byte-string encoding
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return the encoded bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over an encoded record
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(ProtocolError::malformed(format!(
                "Unexpected end of record at offset {}: need {} bytes, have {}",
                self.pos,
                len,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read the next tag without advancing
    pub fn peek_constructor(&self) -> Result<u32> {
        self.clone().read_u32()
    }

    pub fn read_constructor(&mut self) -> Result<u32> {
        self.read_u32()
    }

    /// Consume a tag, failing with `UnknownConstructor` if it differs from `expected`
    pub fn expect_constructor(&mut self, expected: u32) -> Result<()> {
        let constructor = self.read_constructor()?;
        if constructor != expected {
            return Err(ProtocolError::unknown_constructor(constructor));
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    pub fn read_int128(&mut self) -> Result<Int128> {
        self.take_array()
    }

    pub fn read_int256(&mut self) -> Result<Int256> {
        self.take_array()
    }

    /// Read a length-prefixed byte string and skip its alignment padding
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let first = self.take(1)?[0];
        let (header, len) = match first {
            LONG_FORM_MARKER => {
                let raw = self.take(3)?;
                (4, u32::from_le_bytes([raw[0], raw[1], raw[2], 0]) as usize)
            }
            0xff => {
                return Err(ProtocolError::malformed(format!(
                    "Invalid byte string marker at offset {}",
                    self.pos - 1
                )))
            }
            short => (1, short as usize),
        };

        let data = self.take(len)?;
        self.take(bytes_encoded_len(len) - header - len)?;
        Ok(data)
    }

    /// Read a byte string as UTF-8
    pub fn read_string(&mut self) -> Result<String> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ProtocolError::malformed(format!("Invalid UTF-8 string: {e}")))
    }
}

/// Wire format trait for tagged records
pub trait WireFormat: Sized {
    /// Write the record, constructor tag included
    fn write_to(&self, writer: &mut WireWriter) -> Result<()>;

    /// Read the record, constructor tag included
    fn read_from(reader: &mut WireReader<'_>) -> Result<Self>;

    /// Encode to binary format
    fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = WireWriter::with_capacity(self.encoded_size().unwrap_or(64));
        self.write_to(&mut writer)?;
        Ok(writer.into_inner())
    }

    /// Decode from binary format. Trailing bytes after the record are ignored.
    fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(data);
        Self::read_from(&mut reader)
    }

    /// Get the encoded size (if known without encoding)
    fn encoded_size(&self) -> Option<usize> {
        None
    }
}

/// Element type with a fixed encoded width, usable inside a [`Vector`]
pub trait FixedWire: Sized {
    /// Encoded width in bytes
    const SIZE: usize;

    fn write_fixed(&self, writer: &mut WireWriter);

    fn read_fixed(reader: &mut WireReader<'_>) -> Result<Self>;
}

impl FixedWire for i32 {
    const SIZE: usize = 4;
    fn write_fixed(&self, writer: &mut WireWriter) {
        writer.write_i32(*self);
    }
    fn read_fixed(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.read_i32()
    }
}

impl FixedWire for i64 {
    const SIZE: usize = 8;
    fn write_fixed(&self, writer: &mut WireWriter) {
        writer.write_i64(*self);
    }
    fn read_fixed(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.read_i64()
    }
}

impl FixedWire for f64 {
    const SIZE: usize = 8;
    fn write_fixed(&self, writer: &mut WireWriter) {
        writer.write_f64(*self);
    }
    fn read_fixed(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.read_f64()
    }
}

impl FixedWire for Int128 {
    const SIZE: usize = 16;
    fn write_fixed(&self, writer: &mut WireWriter) {
        writer.write_int128(self);
    }
    fn read_fixed(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.read_int128()
    }
}

/// Self-describing sequence of fixed-size elements
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T> {
    items: Vec<T>,
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: FixedWire> Vector<T> {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: T) {
        self.items.push(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_inner(self) -> Vec<T> {
        self.items
    }

    /// Encoded size of the vector starting at `offset` in `data`, without decoding
    /// its elements.
    pub fn read_size(data: &[u8], offset: usize) -> Result<usize> {
        let tail = data
            .get(offset..)
            .ok_or_else(|| ProtocolError::malformed("Vector offset past end of buffer"))?;
        let mut reader = WireReader::new(tail);
        let count = Self::read_header(&mut reader)?;
        Ok(8 + count * T::SIZE)
    }

    fn read_header(reader: &mut WireReader<'_>) -> Result<usize> {
        let constructor = reader.read_constructor()?;
        if constructor != VECTOR_CONSTRUCTOR {
            return Err(ProtocolError::malformed(format!(
                "Expected vector constructor, got {constructor:#010x}"
            )));
        }

        let count = reader.read_i32()?;
        let count = usize::try_from(count)
            .map_err(|_| ProtocolError::malformed(format!("Negative vector count: {count}")))?;
        let needed = count
            .checked_mul(T::SIZE)
            .ok_or_else(|| ProtocolError::malformed("Vector length overflow"))?;
        if needed > reader.remaining() {
            return Err(ProtocolError::malformed(format!(
                "Vector declares {} elements ({} bytes) but only {} bytes remain",
                count,
                needed,
                reader.remaining()
            )));
        }
        Ok(count)
    }
}

impl<T> From<Vec<T>> for Vector<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T: FixedWire> WireFormat for Vector<T> {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        let count = i32::try_from(self.items.len())
            .map_err(|_| ProtocolError::malformed("Vector too long"))?;
        writer.write_constructor(VECTOR_CONSTRUCTOR);
        writer.write_i32(count);
        for item in &self.items {
            item.write_fixed(writer);
        }
        Ok(())
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        let count = Self::read_header(reader)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::read_fixed(reader)?);
        }
        Ok(Self { items })
    }

    fn encoded_size(&self) -> Option<usize> {
        Some(8 + self.items.len() * T::SIZE)
    }
}
