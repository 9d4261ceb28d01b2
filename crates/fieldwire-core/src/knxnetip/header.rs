use crate::encoding::{reader::BitReader, writer::BitWriter};
use crate::{DecodeError, EncodeError};

/// Fixed header length and the value of its own length field.
pub const HEADER_LEN: usize = 6;
/// KNXnet/IP protocol version 1.0.
pub const PROTOCOL_VERSION: u8 = 0x10;

/// Total frame length announced by a peeked header.
pub fn frame_len(header: &[u8]) -> Result<usize, DecodeError> {
    if header.len() < HEADER_LEN {
        return Err(DecodeError::Truncated);
    }
    let total = usize::from(u16::from_be_bytes([header[4], header[5]]));
    if total < HEADER_LEN {
        return Err(DecodeError::InvalidLength);
    }
    Ok(total)
}

/// The service type and body length carried by a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnxHeader {
    pub service_type: u16,
    pub body_len: usize,
}

impl KnxHeader {
    /// Reads the header. Unexpected header-length or version bytes are logged
    /// and tolerated unless `strict` is set.
    pub fn decode(r: &mut BitReader<'_>, strict: bool) -> Result<Self, DecodeError> {
        let mut cursor = *r;
        let header_len = cursor.read_u8()?;
        let version = cursor.read_u8()?;
        let service_type = cursor.read_be_u16()?;
        let total = usize::from(cursor.read_be_u16()?);

        check_constant(strict, "header length", HEADER_LEN as u8, header_len)?;
        check_constant(strict, "protocol version", PROTOCOL_VERSION, version)?;
        if total < HEADER_LEN {
            return Err(DecodeError::InvalidLength);
        }
        *r = cursor;
        Ok(Self {
            service_type,
            body_len: total - HEADER_LEN,
        })
    }

    pub fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        let total =
            u16::try_from(self.body_len + HEADER_LEN).map_err(|_| EncodeError::InvalidLength)?;
        w.write_u8(HEADER_LEN as u8)?;
        w.write_u8(PROTOCOL_VERSION)?;
        w.write_be_u16(self.service_type)?;
        w.write_be_u16(total)
    }
}

pub(crate) fn check_constant(
    strict: bool,
    field: &'static str,
    expected: u8,
    actual: u8,
) -> Result<(), DecodeError> {
    if actual == expected {
        return Ok(());
    }
    if strict {
        return Err(DecodeError::ConstantMismatch {
            expected: u16::from(expected),
            actual: u16::from(actual),
        });
    }
    log::warn!("knxnet/ip {field} is 0x{actual:02x}, expected 0x{expected:02x}; continuing");
    Ok(())
}
