//! Bounds-checked reader over the bytes of one chunk.
//!
//! All fixed-width integers are big-endian. Variable-length integers are
//! unsigned LEB128: 7 payload bits per byte, least significant group first,
//! terminated by a byte with the high bit clear.

use crate::utils::error::{DecodeError, FormatError};

/// Saved cursor position, see [`ByteCursor::mark`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

/// Position-tracked reader over a byte slice
///
/// `base` is the absolute offset of `data[0]` in the recording, so errors
/// can point at the real byte in the file.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }

    /// Position relative to the start of the slice
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position in the recording
    pub fn absolute_position(&self) -> u64 {
        self.base + self.pos as u64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    pub fn mark(&self) -> Mark {
        Mark(self.pos)
    }

    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.0;
    }

    /// Move to a position relative to the start of the slice
    pub fn seek(&mut self, pos: usize) -> Result<(), DecodeError> {
        if pos > self.data.len() {
            return Err(DecodeError::Truncation {
                offset: self.base + pos as u64,
                needed: (pos - self.data.len()) as u64,
                available: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Build a format error located at the current position
    pub fn format_error(&self, kind: FormatError) -> DecodeError {
        DecodeError::format(self.absolute_position(), kind)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncation {
                offset: self.absolute_position(),
                needed: n as u64,
                available: self.remaining() as u64,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read an unsigned LEB128 varint of up to 64 bits
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.absolute_position();
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let b = self.read_u8()?;
            let payload = (b & 0x7F) as u64;
            if shift == 63 && payload > 1 {
                return Err(DecodeError::format(start, FormatError::VarintOverflow));
            }
            result |= payload << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError::format(start, FormatError::VarintOverflow));
            }
        }
    }

    /// Read a varint used as a length or count
    ///
    /// Lengths larger than the remaining bytes can never be satisfied, so
    /// they fail as truncation before anything is allocated.
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let offset = self.absolute_position();
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(DecodeError::Truncation {
                offset,
                needed: len,
                available: self.remaining() as u64,
            });
        }
        Ok(len as usize)
    }

    /// Read a varint length followed by that many bytes of UTF-8
    pub fn read_utf8(&mut self) -> Result<String, DecodeError> {
        let start = self.absolute_position();
        let len = self.read_length()?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::format(start, FormatError::InvalidUtf8))
    }
}
