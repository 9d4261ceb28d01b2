use crate::encoding::{reader::BitReader, writer::BitWriter};
use crate::modbus::pdu::ModbusPdu;
use crate::{DecodeError, Direction, EncodeError};
use alloc::vec::Vec;

/// Bytes needed before the total frame length is known.
pub const HEADER_LEN: usize = 6;

/// The only protocol identifier Modbus TCP defines.
pub const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Total frame length announced by a peeked 6-byte header.
///
/// Both envelopes share the layout `transaction u16 · marker u16 · length
/// u16`, where `length` counts the address byte plus the PDU. A length below
/// two cannot hold an address and a function code.
pub fn frame_len(header: &[u8]) -> Result<usize, DecodeError> {
    if header.len() < HEADER_LEN {
        return Err(DecodeError::Truncated);
    }
    let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
    if length < 2 {
        return Err(DecodeError::InvalidLength);
    }
    Ok(HEADER_LEN + length)
}

/// Shared body of both envelopes once the marker field is read.
struct Envelope {
    transaction_id: u16,
    marker: u16,
    address: u8,
    pdu: ModbusPdu,
}

fn decode_envelope(r: &mut BitReader<'_>, direction: Direction) -> Result<Envelope, DecodeError> {
    let mut cursor = *r;
    let transaction_id = cursor.read_be_u16()?;
    let marker = cursor.read_be_u16()?;
    let length = usize::from(cursor.read_be_u16()?);
    if length < 2 {
        return Err(DecodeError::InvalidLength);
    }
    let address = cursor.read_u8()?;
    let body = cursor.read_exact(length - 1)?;
    let pdu = ModbusPdu::decode_from_bytes(body, direction).map_err(|e| match e {
        // The length field promised a complete PDU.
        DecodeError::Truncated => DecodeError::InvalidLength,
        other => other,
    })?;
    *r = cursor;
    Ok(Envelope {
        transaction_id,
        marker,
        address,
        pdu,
    })
}

fn encode_envelope(
    w: &mut BitWriter,
    transaction_id: u16,
    marker: u16,
    address: u8,
    pdu: &ModbusPdu,
) -> Result<(), EncodeError> {
    let body = pdu.encode_to_vec()?;
    let length = u16::try_from(body.len() + 1).map_err(|_| EncodeError::InvalidLength)?;
    w.write_be_u16(transaction_id)?;
    w.write_be_u16(marker)?;
    w.write_be_u16(length)?;
    w.write_u8(address)?;
    w.write_all(&body)
}

fn check_marker(
    field: &'static str,
    expected: u16,
    actual: u16,
    strict: bool,
) -> Result<(), DecodeError> {
    if actual == expected {
        return Ok(());
    }
    if strict {
        return Err(DecodeError::ConstantMismatch { expected, actual });
    }
    log::warn!("modbus {field} is 0x{actual:04x}, expected 0x{expected:04x}; continuing");
    Ok(())
}

/// Network-addressed Modbus frame (MBAP header plus PDU).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TcpAdu {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub pdu: ModbusPdu,
}

impl TcpAdu {
    pub fn new(transaction_id: u16, unit_id: u8, pdu: ModbusPdu) -> Self {
        Self {
            transaction_id,
            unit_id,
            pdu,
        }
    }

    /// Decodes one frame. A non-zero protocol id is logged and ignored.
    pub fn decode(r: &mut BitReader<'_>, direction: Direction) -> Result<Self, DecodeError> {
        Self::decode_inner(r, direction, false)
    }

    /// Like [`TcpAdu::decode`] but rejects a non-zero protocol id.
    pub fn decode_strict(r: &mut BitReader<'_>, direction: Direction) -> Result<Self, DecodeError> {
        Self::decode_inner(r, direction, true)
    }

    fn decode_inner(
        r: &mut BitReader<'_>,
        direction: Direction,
        strict: bool,
    ) -> Result<Self, DecodeError> {
        let mut cursor = *r;
        let env = decode_envelope(&mut cursor, direction)?;
        check_marker("protocol id", MODBUS_PROTOCOL_ID, env.marker, strict)?;
        *r = cursor;
        Ok(Self {
            transaction_id: env.transaction_id,
            unit_id: env.address,
            pdu: env.pdu,
        })
    }

    pub fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        encode_envelope(w, self.transaction_id, MODBUS_PROTOCOL_ID, self.unit_id, &self.pdu)
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = BitWriter::with_capacity(HEADER_LEN + 8);
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }
}

/// Point-addressed Modbus frame: same header layout as [`TcpAdu`] with a
/// reserved word in place of the protocol id and a station address in place
/// of the unit id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointAdu {
    pub transaction_id: u16,
    pub station: u8,
    pub pdu: ModbusPdu,
}

impl PointAdu {
    pub fn new(transaction_id: u16, station: u8, pdu: ModbusPdu) -> Self {
        Self {
            transaction_id,
            station,
            pdu,
        }
    }

    /// Decodes one frame. A non-zero reserved word is logged and ignored.
    pub fn decode(r: &mut BitReader<'_>, direction: Direction) -> Result<Self, DecodeError> {
        Self::decode_inner(r, direction, false)
    }

    pub fn decode_strict(r: &mut BitReader<'_>, direction: Direction) -> Result<Self, DecodeError> {
        Self::decode_inner(r, direction, true)
    }

    fn decode_inner(
        r: &mut BitReader<'_>,
        direction: Direction,
        strict: bool,
    ) -> Result<Self, DecodeError> {
        let mut cursor = *r;
        let env = decode_envelope(&mut cursor, direction)?;
        check_marker("reserved word", 0, env.marker, strict)?;
        *r = cursor;
        Ok(Self {
            transaction_id: env.transaction_id,
            station: env.address,
            pdu: env.pdu,
        })
    }

    pub fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        encode_envelope(w, self.transaction_id, 0, self.station, &self.pdu)
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = BitWriter::with_capacity(HEADER_LEN + 8);
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }
}
