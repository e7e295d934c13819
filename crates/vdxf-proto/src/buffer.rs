//! Cursor reader and exact-length writer.
//!
//! Serialization is two-pass: a record first measures itself, the writer is
//! allocated with exactly that many bytes, then the record writes
//! sequentially. The writer refuses to grow past the measured length and
//! [`Writer::finish`] refuses to hand out a buffer that was under-filled, so a
//! record whose measuring and writing passes disagree fails loudly instead of
//! producing truncated or padded output.
//!
//! Sequence primitives:
//!
//! - *var-slice*: CompactSize length, then that many bytes
//! - *vector*: CompactSize count, then that many var-slices
//! - *array*: CompactSize count, then that many fixed-size slices

use bytes::{BufMut, Bytes, BytesMut};
use num_bigint::BigUint;

use crate::{
    errors::{ProtocolError, Result},
    varint,
};

/// Encoded size of a var-slice carrying `len` bytes.
pub const fn var_slice_len(len: usize) -> usize {
    varint::compact_size_len(len as u64) + len
}

/// Encoded size of a vector of var-slices.
pub fn vector_len<T: AsRef<[u8]>>(items: &[T]) -> usize {
    varint::compact_size_len(items.len() as u64)
        + items.iter().map(|item| var_slice_len(item.as_ref().len())).sum::<usize>()
}

/// Encoded size of an array of `count` elements, each `element_len` bytes.
pub const fn array_len(count: usize, element_len: usize) -> usize {
    varint::compact_size_len(count as u64) + count * element_len
}

/// Sequential reader over an immutable buffer.
///
/// The offset only moves forward. Every primitive checks the remaining length
/// before touching the buffer and fails with [`ProtocolError::Truncated`]
/// instead of reading past the end.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Reader positioned at the start of `buf`.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes consumed so far.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read.
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Error unless every byte was consumed.
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }

    /// Read exactly `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.buf.len()).ok_or(
            ProtocolError::Truncated { needed: len, available: self.remaining() },
        )?;
        let slice = &self.buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Read exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize.
    pub fn read_compact_size(&mut self) -> Result<u64> {
        let (value, used) = varint::get_compact_size(&self.buf[self.offset..])?;
        self.offset += used;
        Ok(value)
    }

    /// Read a CompactSize used as an in-memory length or count.
    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_compact_size()?;
        usize::try_from(len).map_err(|_| ProtocolError::ValueOverflow { field: "length" })
    }

    /// Read an unbounded VarInt.
    pub fn read_varint(&mut self) -> Result<BigUint> {
        let (value, used) = varint::get_varint(&self.buf[self.offset..])?;
        self.offset += used;
        Ok(value)
    }

    /// Read a VarInt that must fit in a `u64`.
    pub fn read_varint_u64(&mut self, field: &'static str) -> Result<u64> {
        let (value, used) = varint::get_varint_u64(&self.buf[self.offset..], field)?;
        self.offset += used;
        Ok(value)
    }

    /// Read a VarInt that must fit in a `u32`.
    pub fn read_varint_u32(&mut self, field: &'static str) -> Result<u32> {
        let value = self.read_varint_u64(field)?;
        u32::try_from(value).map_err(|_| ProtocolError::ValueOverflow { field })
    }

    /// Read a length-prefixed slice.
    pub fn read_var_slice(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.read_slice(len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self, field: &'static str) -> Result<String> {
        let bytes = self.read_var_slice()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8 { field })
    }

    /// Read a count-prefixed sequence of var-slices.
    pub fn read_vector(&mut self) -> Result<Vec<&'a [u8]>> {
        let count = self.read_len()?;
        // Each element needs at least its one-byte length prefix.
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(self.read_var_slice()?);
        }
        Ok(items)
    }

    /// Read a count-prefixed sequence of `N`-byte elements.
    pub fn read_fixed_array<const N: usize>(&mut self) -> Result<Vec<[u8; N]>> {
        let count = self.read_len()?;
        let mut items = Vec::with_capacity(count.min(self.remaining() / N.max(1)));
        for _ in 0..count {
            items.push(self.read_array::<N>()?);
        }
        Ok(items)
    }
}

/// Sequential writer over a buffer of exactly the measured length.
#[derive(Debug)]
pub struct Writer {
    buf: BytesMut,
    expected: usize,
}

impl Writer {
    /// Writer that will accept exactly `len` bytes.
    pub fn with_exact_len(len: usize) -> Self {
        Self { buf: BytesMut::with_capacity(len), expected: len }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Hand out the buffer once it is exactly full.
    pub fn finish(self) -> Result<Bytes> {
        if self.buf.len() != self.expected {
            tracing::error!(
                expected = self.expected,
                actual = self.buf.len(),
                "Measured length disagrees with written length"
            );
            return Err(ProtocolError::LengthMismatch {
                expected: self.expected,
                actual: self.buf.len(),
            });
        }
        Ok(self.buf.freeze())
    }

    fn reserve(&self, n: usize) -> Result<()> {
        let after = self.buf.len() + n;
        if after > self.expected {
            tracing::error!(
                expected = self.expected,
                attempted = after,
                "Write past measured length"
            );
            return Err(ProtocolError::LengthMismatch { expected: self.expected, actual: after });
        }
        Ok(())
    }

    /// Write raw bytes with no prefix.
    pub fn write_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Write one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_slice(&[value])
    }

    /// Write a little-endian `u16`.
    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    /// Write a little-endian `u32`.
    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    /// Write a little-endian `u64`.
    pub fn write_u64_le(&mut self, value: u64) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    /// Write a CompactSize.
    pub fn write_compact_size(&mut self, value: u64) -> Result<()> {
        self.reserve(varint::compact_size_len(value))?;
        varint::put_compact_size(&mut self.buf, value);
        Ok(())
    }

    /// Write an unbounded VarInt.
    pub fn write_varint(&mut self, value: &BigUint) -> Result<()> {
        self.reserve(varint::varint_len(value))?;
        varint::put_varint(&mut self.buf, value);
        Ok(())
    }

    /// Write a VarInt from a machine word.
    pub fn write_varint_u64(&mut self, value: u64) -> Result<()> {
        self.reserve(varint::varint_len_u64(value))?;
        varint::put_varint_u64(&mut self.buf, value);
        Ok(())
    }

    /// Write a length-prefixed slice.
    pub fn write_var_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_compact_size(bytes.len() as u64)?;
        self.write_slice(bytes)
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_var_slice(value.as_bytes())
    }

    /// Write a count-prefixed sequence of var-slices.
    pub fn write_vector<T: AsRef<[u8]>>(&mut self, items: &[T]) -> Result<()> {
        self.write_compact_size(items.len() as u64)?;
        for item in items {
            self.write_var_slice(item.as_ref())?;
        }
        Ok(())
    }

    /// Write a count-prefixed sequence of fixed-size elements.
    pub fn write_fixed_array<const N: usize>(&mut self, items: &[[u8; N]]) -> Result<()> {
        self.write_compact_size(items.len() as u64)?;
        for item in items {
            self.write_slice(item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn sequence_primitives_round_trip() {
        let items: Vec<&[u8]> = vec![&b"ab"[..], &b""[..], &b"xyz"[..]];
        let keys = [[1u8; 4], [2u8; 4]];

        let len = 4 + var_slice_len(3) + vector_len(&items) + array_len(keys.len(), 4);
        let mut writer = Writer::with_exact_len(len);
        writer.write_u32_le(0xdead_beef).unwrap();
        writer.write_var_slice(b"abc").unwrap();
        writer.write_vector(&items).unwrap();
        writer.write_fixed_array(&keys).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u32_le().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_var_slice().unwrap(), b"abc");
        assert_eq!(reader.read_vector().unwrap(), items);
        assert_eq!(reader.read_fixed_array::<4>().unwrap(), keys.to_vec());
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn writer_refuses_overflow() {
        let mut writer = Writer::with_exact_len(2);
        writer.write_u8(1).unwrap();
        let err = writer.write_u16_le(7).unwrap_err();
        assert_eq!(err, ProtocolError::LengthMismatch { expected: 2, actual: 3 });
    }

    #[test]
    fn writer_refuses_underfill() {
        let mut writer = Writer::with_exact_len(4);
        writer.write_u8(1).unwrap();
        assert_eq!(
            writer.finish().unwrap_err(),
            ProtocolError::LengthMismatch { expected: 4, actual: 1 }
        );
    }

    #[test]
    fn reader_refuses_overrun() {
        let mut reader = Reader::new(&hex!("05616263"));
        let err = reader.read_var_slice().unwrap_err();
        assert_eq!(err, ProtocolError::Truncated { needed: 5, available: 3 });
    }

    #[test]
    fn reader_reports_trailing_bytes() {
        let mut reader = Reader::new(&hex!("0001"));
        reader.read_u8().unwrap();
        assert_eq!(reader.finish(), Err(ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn vector_count_larger_than_buffer() {
        // Count claims 200 entries; the buffer holds one.
        let mut reader = Reader::new(&hex!("c80100"));
        assert!(matches!(reader.read_vector(), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn invalid_utf8_names_field() {
        let mut reader = Reader::new(&hex!("02c328"));
        assert_eq!(
            reader.read_string("label"),
            Err(ProtocolError::InvalidUtf8 { field: "label" })
        );
    }
}
