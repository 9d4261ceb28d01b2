//! Protocol adapters: how the engine frames, decodes and classifies bytes.

use fieldwire_core::encoding::reader::BitReader;
use fieldwire_core::knxnetip::{self, KnxNetIpMessage};
use fieldwire_core::modbus::{adu, PointAdu, TcpAdu};
use fieldwire_core::{DecodeError, Direction, EncodeError};
use std::fmt::Debug;

/// What the receive loop does with a decoded frame before matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<F> {
    /// Offered to expectations, but never delivered to the default channel.
    Ignore,
    /// Write the contained acknowledgement first, then continue as
    /// [`Inbound::Deliver`].
    Acknowledge(F),
    /// Offered to expectations, then to the default channel.
    Deliver,
}

/// A wire protocol the [`Engine`](crate::Engine) can drive.
pub trait Protocol: Send + Sync + 'static {
    type Frame: Debug + Send + Sync + 'static;

    /// Bytes needed before [`frame_len`](Protocol::frame_len) can answer.
    const HEADER_LEN: usize;

    /// Total frame length disclosed by the first `HEADER_LEN` bytes.
    fn frame_len(&self, header: &[u8]) -> Result<usize, DecodeError>;

    /// Decodes exactly one complete frame.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Frame, DecodeError>;

    fn encode(&self, frame: &Self::Frame) -> Result<Vec<u8>, EncodeError>;

    fn classify(&self, _frame: &Self::Frame) -> Inbound<Self::Frame> {
        Inbound::Deliver
    }
}

fn whole<T>(
    bytes: &[u8],
    decode: impl FnOnce(&mut BitReader<'_>) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    let mut r = BitReader::new(bytes);
    let frame = decode(&mut r)?;
    if !r.is_empty() {
        return Err(DecodeError::InvalidLength);
    }
    Ok(frame)
}

/// Modbus TCP (MBAP header). `direction` is what this side receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusTcp {
    pub direction: Direction,
    pub strict: bool,
}

impl ModbusTcp {
    /// Receives responses.
    pub const fn client() -> Self {
        Self {
            direction: Direction::Response,
            strict: false,
        }
    }

    /// Receives requests.
    pub const fn server() -> Self {
        Self {
            direction: Direction::Request,
            strict: false,
        }
    }

    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Protocol for ModbusTcp {
    type Frame = TcpAdu;
    const HEADER_LEN: usize = adu::HEADER_LEN;

    fn frame_len(&self, header: &[u8]) -> Result<usize, DecodeError> {
        adu::frame_len(header)
    }

    fn decode(&self, bytes: &[u8]) -> Result<TcpAdu, DecodeError> {
        whole(bytes, |r| {
            if self.strict {
                TcpAdu::decode_strict(r, self.direction)
            } else {
                TcpAdu::decode(r, self.direction)
            }
        })
    }

    fn encode(&self, frame: &TcpAdu) -> Result<Vec<u8>, EncodeError> {
        frame.encode_to_vec()
    }
}

/// Point-addressed Modbus framing: the MBAP layout with a station address
/// in place of the unit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusPoint {
    pub direction: Direction,
    pub strict: bool,
}

impl ModbusPoint {
    pub const fn client() -> Self {
        Self {
            direction: Direction::Response,
            strict: false,
        }
    }

    pub const fn server() -> Self {
        Self {
            direction: Direction::Request,
            strict: false,
        }
    }

    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Protocol for ModbusPoint {
    type Frame = PointAdu;
    const HEADER_LEN: usize = adu::HEADER_LEN;

    fn frame_len(&self, header: &[u8]) -> Result<usize, DecodeError> {
        adu::frame_len(header)
    }

    fn decode(&self, bytes: &[u8]) -> Result<PointAdu, DecodeError> {
        whole(bytes, |r| {
            if self.strict {
                PointAdu::decode_strict(r, self.direction)
            } else {
                PointAdu::decode(r, self.direction)
            }
        })
    }

    fn encode(&self, frame: &PointAdu) -> Result<Vec<u8>, EncodeError> {
        frame.encode_to_vec()
    }
}

/// KNXnet/IP over a stream connection.
///
/// Inbound tunnelling and device-configuration requests are acknowledged
/// automatically. Acks never reach the default channel; a caller waiting
/// for one still matches it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnxNetIp {
    pub strict: bool,
}

impl Protocol for KnxNetIp {
    type Frame = KnxNetIpMessage;
    const HEADER_LEN: usize = knxnetip::HEADER_LEN;

    fn frame_len(&self, header: &[u8]) -> Result<usize, DecodeError> {
        knxnetip::frame_len(header)
    }

    fn decode(&self, bytes: &[u8]) -> Result<KnxNetIpMessage, DecodeError> {
        whole(bytes, |r| {
            if self.strict {
                KnxNetIpMessage::decode_strict(r)
            } else {
                KnxNetIpMessage::decode(r)
            }
        })
    }

    fn encode(&self, frame: &KnxNetIpMessage) -> Result<Vec<u8>, EncodeError> {
        frame.encode_to_vec()
    }

    fn classify(&self, frame: &KnxNetIpMessage) -> Inbound<KnxNetIpMessage> {
        match frame {
            KnxNetIpMessage::TunnelingAck { .. }
            | KnxNetIpMessage::DeviceConfigurationAck { .. } => Inbound::Ignore,
            other => match other.acknowledgement() {
                Some(ack) => Inbound::Acknowledge(ack),
                None => Inbound::Deliver,
            },
        }
    }
}
