use crate::encoding::float;
use crate::DecodeError;
use alloc::vec::Vec;

/// Bit cursor over an immutable byte buffer.
///
/// Multi-bit fields are read big-endian, most significant bit first. The
/// cursor never moves past the end of the buffer; a read that would do so
/// fails with [`DecodeError::Truncated`] and leaves the cursor unchanged.
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, bit_pos: 0 }
    }

    /// Byte offset of the cursor (the byte the next bit comes from).
    pub const fn byte_position(&self) -> usize {
        self.bit_pos / 8
    }

    /// Bit offset of the cursor within the current byte.
    pub const fn bit_offset(&self) -> u8 {
        (self.bit_pos % 8) as u8
    }

    pub const fn is_byte_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    pub fn remaining_bits(&self) -> usize {
        (self.buf.len() * 8).saturating_sub(self.bit_pos)
    }

    /// Whole bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.remaining_bits() / 8
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), DecodeError> {
        if self.remaining_bits() < bits {
            return Err(DecodeError::Truncated);
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, DecodeError> {
        self.ensure_bits(1)?;
        let byte = self.buf[self.bit_pos / 8];
        let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
        self.bit_pos += 1;
        Ok(bit == 1)
    }

    /// Reads an unsigned integer `width` bits wide (1..=64).
    pub fn read_uint(&mut self, width: u8) -> Result<u64, DecodeError> {
        check_width(width)?;
        self.ensure_bits(usize::from(width))?;

        let mut value = 0u64;
        let mut left = usize::from(width);
        while left > 0 {
            let byte = self.buf[self.bit_pos / 8];
            let available = 8 - self.bit_pos % 8;
            let take = available.min(left);
            let bits = (byte >> (available - take)) & low_mask(take);
            value = (value << take) | u64::from(bits);
            self.bit_pos += take;
            left -= take;
        }
        Ok(value)
    }

    /// Reads a two's-complement integer `width` bits wide and sign-extends it.
    pub fn read_int(&mut self, width: u8) -> Result<i64, DecodeError> {
        let raw = self.read_uint(width)?;
        let shift = 64 - u32::from(width);
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Reads an IEEE-754 style float with the given exponent/mantissa split.
    pub fn read_float(&mut self, exponent_bits: u8, mantissa_bits: u8) -> Result<f64, DecodeError> {
        let width = float::total_width(exponent_bits, mantissa_bits)
            .ok_or(DecodeError::UnsupportedType)?;
        let mut cursor = *self;
        let raw = cursor.read_uint(width)?;
        let value = float::widen(raw, exponent_bits, mantissa_bits)
            .ok_or(DecodeError::UnsupportedType)?;
        *self = cursor;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_uint(8)? as u8)
    }

    pub fn read_be_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(self.read_uint(16)? as u16)
    }

    pub fn read_be_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(self.read_uint(32)? as u32)
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_be_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_uint(64)?))
    }

    /// Borrows `len` bytes from a byte-aligned cursor.
    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if !self.is_byte_aligned() {
            return Err(DecodeError::Message("byte read from unaligned cursor"));
        }
        self.ensure_bits(len.saturating_mul(8))?;
        let start = self.bit_pos / 8;
        self.bit_pos += len * 8;
        Ok(&self.buf[start..start + len])
    }

    /// Reads `len` bytes at any bit offset.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        if self.is_byte_aligned() {
            return self.read_exact(len).map(<[u8]>::to_vec);
        }
        self.ensure_bits(len.saturating_mul(8))?;
        (0..len).map(|_| self.read_u8()).collect()
    }

    /// Returns the next `len` bytes without moving the cursor.
    pub fn peek(&self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let mut cursor = *self;
        cursor.read_bytes(len)
    }

    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        let mut cursor = *self;
        cursor.read_u8()
    }

    /// Skips `bits` bits, typically reserved padding.
    pub fn skip_bits(&mut self, bits: usize) -> Result<(), DecodeError> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }
}

fn check_width(width: u8) -> Result<(), DecodeError> {
    if width == 0 || width > 64 {
        return Err(DecodeError::InvalidLength);
    }
    Ok(())
}

const fn low_mask(bits: usize) -> u8 {
    ((1u16 << bits) - 1) as u8
}
