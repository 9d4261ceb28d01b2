use crate::encoding::float;
use crate::EncodeError;
use alloc::vec::Vec;

/// Bit cursor over a growable byte buffer.
///
/// Mirrors [`BitReader`](super::reader::BitReader): big-endian, most
/// significant bit first. A partially written trailing byte is zero-padded.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    buf: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Number of bits written so far.
    pub const fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Number of bytes touched so far, counting a partial trailing byte.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub const fn is_byte_aligned(&self) -> bool {
        self.bit_len % 8 == 0
    }

    pub fn as_written(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bit(&mut self, value: bool) -> Result<(), EncodeError> {
        self.write_uint(1, u64::from(value))
    }

    /// Writes `value` as an unsigned integer `width` bits wide (1..=64).
    pub fn write_uint(&mut self, width: u8, value: u64) -> Result<(), EncodeError> {
        check_width(width)?;
        if width < 64 && value >> width != 0 {
            return Err(EncodeError::ValueOutOfRange);
        }

        let mut left = usize::from(width);
        while left > 0 {
            let offset = self.bit_len % 8;
            if offset == 0 {
                self.buf.push(0);
            }
            let available = 8 - offset;
            let take = available.min(left);
            let bits = ((value >> (left - take)) as u8) & (((1u16 << take) - 1) as u8);
            if let Some(last) = self.buf.last_mut() {
                *last |= bits << (available - take);
            }
            self.bit_len += take;
            left -= take;
        }
        Ok(())
    }

    /// Writes a two's-complement integer `width` bits wide.
    pub fn write_int(&mut self, width: u8, value: i64) -> Result<(), EncodeError> {
        check_width(width)?;
        if width < 64 {
            let min = -(1i64 << (width - 1));
            let max = (1i64 << (width - 1)) - 1;
            if value < min || value > max {
                return Err(EncodeError::ValueOutOfRange);
            }
        }
        let raw = if width == 64 {
            value as u64
        } else {
            (value as u64) & ((1u64 << width) - 1)
        };
        self.write_uint(width, raw)
    }

    /// Writes an IEEE-754 style float with the given exponent/mantissa split.
    pub fn write_float(
        &mut self,
        exponent_bits: u8,
        mantissa_bits: u8,
        value: f64,
    ) -> Result<(), EncodeError> {
        let width =
            float::total_width(exponent_bits, mantissa_bits).ok_or(EncodeError::UnsupportedType)?;
        let raw = float::narrow(value, exponent_bits, mantissa_bits)
            .ok_or(EncodeError::ValueOutOfRange)?;
        self.write_uint(width, raw)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.write_uint(8, u64::from(value))
    }

    pub fn write_be_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_uint(16, u64::from(value))
    }

    pub fn write_be_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_uint(32, u64::from(value))
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), EncodeError> {
        self.write_be_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), EncodeError> {
        self.write_uint(64, value.to_bits())
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if self.is_byte_aligned() {
            self.buf.extend_from_slice(data);
            self.bit_len += data.len() * 8;
            return Ok(());
        }
        data.iter().try_for_each(|b| self.write_u8(*b))
    }

    /// Writes `bits` zero bits, typically reserved padding.
    pub fn write_zeros(&mut self, bits: usize) -> Result<(), EncodeError> {
        for _ in 0..bits {
            self.write_bit(false)?;
        }
        Ok(())
    }
}

fn check_width(width: u8) -> Result<(), EncodeError> {
    if width == 0 || width > 64 {
        return Err(EncodeError::InvalidLength);
    }
    Ok(())
}
