//! Binary Codec
//!
//! Big-endian cursor encoder and decoder. Every read checks bounds and
//! returns on the first failure, so a bad frame never yields a partially
//! decoded message.

use crate::core::vec2::Vec2;

/// Wire encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Unexpected end of message: needed {needed} bytes at offset {offset}, {remaining} left")]
    UnexpectedEnd { offset: usize, needed: usize, remaining: usize },

    #[error("Unknown message type {0}")]
    UnknownMessageType(u8),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("{what} count {count} exceeds {max}")]
    CountOverflow { what: &'static str, count: usize, max: usize },

    #[error("Invalid {what} byte {value}")]
    InvalidEnum { what: &'static str, value: u8 },

    #[error("Non-finite {what}")]
    NonFinite { what: &'static str },
}

// =============================================================================
// ENCODER
// =============================================================================

/// Growable big-endian writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_vec2(&mut self, value: Vec2) {
        self.write_f64(value.x);
        self.write_f64(value.y);
    }

    /// Write a length as a `u8`.
    pub fn write_count_u8(&mut self, what: &'static str, count: usize) -> Result<(), CodecError> {
        let value = u8::try_from(count).map_err(|_| CodecError::CountOverflow {
            what,
            count,
            max: u8::MAX as usize,
        })?;
        self.write_u8(value);
        Ok(())
    }

    /// Write a length as a `u16`.
    pub fn write_count_u16(&mut self, what: &'static str, count: usize) -> Result<(), CodecError> {
        let value = u16::try_from(count).map_err(|_| CodecError::CountOverflow {
            what,
            count,
            max: u16::MAX as usize,
        })?;
        self.write_u16(value);
        Ok(())
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// =============================================================================
// DECODER
// =============================================================================

/// Bounds-checked big-endian reader over a byte slice.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(CodecError::UnexpectedEnd { offset: self.offset, needed: N, remaining });
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        Ok(bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_u8()? as i8)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.take::<2>()?))
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_be_bytes(self.take::<8>()?))
    }

    /// Read an `f64` that must be neither NaN nor infinite.
    pub fn read_finite_f64(&mut self, what: &'static str) -> Result<f64, CodecError> {
        let value = self.read_f64()?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(CodecError::NonFinite { what })
        }
    }

    #[inline]
    pub fn read_vec2(&mut self) -> Result<Vec2, CodecError> {
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        Ok(Vec2::new(x, y))
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(CodecError::UnexpectedEnd { offset: self.offset, needed: len, remaining });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Succeeds only if the whole input was consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}
