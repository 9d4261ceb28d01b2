use crate::encoding::{reader::BitReader, writer::BitWriter};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;
use core::fmt;

pub const MC_LDATA_REQ: u8 = 0x11;
pub const MC_LDATA_IND: u8 = 0x29;
pub const MC_LDATA_CON: u8 = 0x2E;

/// Standard frame, no repeat, broadcast, normal priority.
pub const DEFAULT_CONTROL1: u8 = 0xBC;
/// Group destination, hop count 6.
pub const DEFAULT_CONTROL2_GROUP: u8 = 0xE0;

const APCI_GROUP_VALUE_READ: u16 = 0x000;
const APCI_GROUP_VALUE_RESPONSE: u16 = 0x040;
const APCI_GROUP_VALUE_WRITE: u16 = 0x080;

/// Group-communication service carried by an L_Data TPDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupService {
    Read,
    Response,
    Write,
    Other(u16),
}

/// A cEMI link-layer data frame (L_Data.req / .ind / .con).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LData {
    pub message_code: u8,
    pub additional_info: Vec<u8>,
    pub control1: u8,
    pub control2: u8,
    pub source: u16,
    pub destination: u16,
    /// TPCI/APCI bytes and data. The length octet on the wire is
    /// `tpdu.len() - 1`.
    pub tpdu: Vec<u8>,
}

impl LData {
    /// Builds an L_Data.req group write. Values of up to six bits travel in
    /// the APCI byte; anything longer follows it.
    pub fn group_write(destination: u16, data: &[u8], small: bool) -> Self {
        let mut tpdu = Vec::with_capacity(2 + data.len());
        tpdu.push(0x00);
        match (small, data.first()) {
            (true, Some(&v)) => tpdu.push(0x80 | (v & 0x3F)),
            _ => {
                tpdu.push(0x80);
                tpdu.extend_from_slice(data);
            }
        }
        Self::group(destination, tpdu)
    }

    pub fn group_read(destination: u16) -> Self {
        Self::group(destination, alloc::vec![0x00, 0x00])
    }

    fn group(destination: u16, tpdu: Vec<u8>) -> Self {
        Self {
            message_code: MC_LDATA_REQ,
            additional_info: Vec::new(),
            control1: DEFAULT_CONTROL1,
            control2: DEFAULT_CONTROL2_GROUP,
            source: 0,
            destination,
            tpdu,
        }
    }

    pub fn is_group_destination(&self) -> bool {
        self.control2 & 0x80 != 0
    }

    pub fn group_service(&self) -> Option<GroupService> {
        let apci = self.apci()?;
        Some(match apci & 0x3C0 {
            APCI_GROUP_VALUE_READ => GroupService::Read,
            APCI_GROUP_VALUE_RESPONSE => GroupService::Response,
            APCI_GROUP_VALUE_WRITE => GroupService::Write,
            _ => GroupService::Other(apci),
        })
    }

    /// The ten APCI bits spread over the first two TPDU bytes.
    pub fn apci(&self) -> Option<u16> {
        match self.tpdu.as_slice() {
            [first, second, ..] => Some((u16::from(*first & 0x03) << 8) | u16::from(*second)),
            _ => None,
        }
    }

    /// Group value data: the low six APCI bits for short frames, otherwise
    /// the bytes after the APCI.
    pub fn group_data(&self) -> Vec<u8> {
        match self.tpdu.as_slice() {
            [_, second] => alloc::vec![*second & 0x3F],
            [_, _, rest @ ..] => rest.to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn decode(r: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let mut cursor = *r;
        let message_code = cursor.read_u8()?;
        if !matches!(message_code, MC_LDATA_REQ | MC_LDATA_IND | MC_LDATA_CON) {
            return Err(DecodeError::UnknownDiscriminator {
                code: u16::from(message_code),
                response: false,
            });
        }
        let info_len = usize::from(cursor.read_u8()?);
        let additional_info = cursor.read_bytes(info_len)?;
        let control1 = cursor.read_u8()?;
        let control2 = cursor.read_u8()?;
        let source = cursor.read_be_u16()?;
        let destination = cursor.read_be_u16()?;
        let npdu_len = usize::from(cursor.read_u8()?);
        let tpdu = cursor.read_bytes(npdu_len + 1)?;
        *r = cursor;
        Ok(Self {
            message_code,
            additional_info,
            control1,
            control2,
            source,
            destination,
            tpdu,
        })
    }

    pub fn decode_from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut BitReader::new(bytes))
    }

    pub fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        let info_len =
            u8::try_from(self.additional_info.len()).map_err(|_| EncodeError::InvalidLength)?;
        let npdu_len = self
            .tpdu
            .len()
            .checked_sub(1)
            .and_then(|n| u8::try_from(n).ok())
            .ok_or(EncodeError::InvalidLength)?;
        w.write_u8(self.message_code)?;
        w.write_u8(info_len)?;
        w.write_all(&self.additional_info)?;
        w.write_u8(self.control1)?;
        w.write_u8(self.control2)?;
        w.write_be_u16(self.source)?;
        w.write_be_u16(self.destination)?;
        w.write_u8(npdu_len)?;
        w.write_all(&self.tpdu)
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = BitWriter::with_capacity(11 + self.tpdu.len());
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }
}

/// Three-level group address `main/middle/sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupAddress(pub u16);

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0;
        write!(f, "{}/{}/{}", (raw >> 11) & 0x1F, (raw >> 8) & 0x07, raw & 0xFF)
    }
}

/// Individual address `area.line.device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndividualAddress(pub u16);

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0;
        write!(f, "{}.{}.{}", raw >> 12, (raw >> 8) & 0x0F, raw & 0xFF)
    }
}
