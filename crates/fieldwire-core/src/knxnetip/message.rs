use crate::encoding::{reader::BitReader, writer::BitWriter};
use crate::knxnetip::header::{check_constant, KnxHeader, HEADER_LEN};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

pub const SERVICE_CONNECT_REQUEST: u16 = 0x0205;
pub const SERVICE_CONNECT_RESPONSE: u16 = 0x0206;
pub const SERVICE_CONNECTIONSTATE_REQUEST: u16 = 0x0207;
pub const SERVICE_CONNECTIONSTATE_RESPONSE: u16 = 0x0208;
pub const SERVICE_DISCONNECT_REQUEST: u16 = 0x0209;
pub const SERVICE_DISCONNECT_RESPONSE: u16 = 0x020A;
pub const SERVICE_DEVICE_CONFIGURATION_REQUEST: u16 = 0x0310;
pub const SERVICE_DEVICE_CONFIGURATION_ACK: u16 = 0x0311;
pub const SERVICE_TUNNELING_REQUEST: u16 = 0x0420;
pub const SERVICE_TUNNELING_ACK: u16 = 0x0421;

pub const CONNECTION_TYPE_DEVICE_MANAGEMENT: u8 = 0x03;
pub const CONNECTION_TYPE_TUNNEL: u8 = 0x04;
pub const TUNNEL_LINK_LAYER: u8 = 0x02;

/// Status code meaning "no error".
pub const STATUS_OK: u8 = 0x00;

const HPAI_LEN: u8 = 8;
const CRI_LEN: u8 = 4;
const CRD_LEN: u8 = 4;
const CONNECTION_HEADER_LEN: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostProtocol {
    Udp,
    Tcp,
    Unknown(u8),
}

impl HostProtocol {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::Udp,
            0x02 => Self::Tcp,
            v => Self::Unknown(v),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Udp => 0x01,
            Self::Tcp => 0x02,
            Self::Unknown(v) => v,
        }
    }
}

/// Host protocol address information: an IPv4 endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hpai {
    pub protocol: HostProtocol,
    pub address: [u8; 4],
    pub port: u16,
}

impl Hpai {
    /// The all-zero TCP endpoint, meaning "reply on this connection".
    pub const fn route_back() -> Self {
        Self {
            protocol: HostProtocol::Tcp,
            address: [0; 4],
            port: 0,
        }
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        expect_structure_len(r, HPAI_LEN)?;
        let protocol = HostProtocol::from_u8(r.read_u8()?);
        let raw = r.read_exact(4)?;
        let address = [raw[0], raw[1], raw[2], raw[3]];
        Ok(Self {
            protocol,
            address,
            port: r.read_be_u16()?,
        })
    }

    fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        w.write_u8(HPAI_LEN)?;
        w.write_u8(self.protocol.to_u8())?;
        w.write_all(&self.address)?;
        w.write_be_u16(self.port)
    }
}

/// Connection request information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionRequestInfo {
    pub connection_type: u8,
    pub knx_layer: u8,
}

impl ConnectionRequestInfo {
    pub const fn tunnel() -> Self {
        Self {
            connection_type: CONNECTION_TYPE_TUNNEL,
            knx_layer: TUNNEL_LINK_LAYER,
        }
    }
}

/// What a successful connect response carries besides channel and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionEndpoint {
    pub data_endpoint: Hpai,
    pub connection_type: u8,
    /// Individual address assigned to the tunnel.
    pub individual_address: u16,
}

/// A KNXnet/IP frame body, selected by the header's service type.
///
/// The header and every structure-length byte are implicit: they are
/// checked when decoding and recomputed when encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KnxNetIpMessage {
    ConnectRequest {
        control_endpoint: Hpai,
        data_endpoint: Hpai,
        cri: ConnectionRequestInfo,
    },
    ConnectResponse {
        channel_id: u8,
        status: u8,
        /// Present only when `status` is [`STATUS_OK`].
        endpoint: Option<ConnectionEndpoint>,
    },
    ConnectionStateRequest {
        channel_id: u8,
        control_endpoint: Hpai,
    },
    ConnectionStateResponse {
        channel_id: u8,
        status: u8,
    },
    DisconnectRequest {
        channel_id: u8,
        control_endpoint: Hpai,
    },
    DisconnectResponse {
        channel_id: u8,
        status: u8,
    },
    DeviceConfigurationRequest {
        channel_id: u8,
        sequence_counter: u8,
        cemi: Vec<u8>,
    },
    DeviceConfigurationAck {
        channel_id: u8,
        sequence_counter: u8,
        status: u8,
    },
    TunnelingRequest {
        channel_id: u8,
        sequence_counter: u8,
        cemi: Vec<u8>,
    },
    TunnelingAck {
        channel_id: u8,
        sequence_counter: u8,
        status: u8,
    },
}

type ParseFn = fn(&mut BitReader<'_>, bool) -> Result<KnxNetIpMessage, DecodeError>;

struct ServiceEntry {
    service_type: u16,
    parse: ParseFn,
}

const fn service(service_type: u16, parse: ParseFn) -> ServiceEntry {
    ServiceEntry {
        service_type,
        parse,
    }
}

/// Body parsers keyed by service type.
static SERVICES: &[ServiceEntry] = &[
    service(SERVICE_CONNECT_REQUEST, parse_connect_request),
    service(SERVICE_CONNECT_RESPONSE, parse_connect_response),
    service(SERVICE_CONNECTIONSTATE_REQUEST, parse_connectionstate_request),
    service(SERVICE_CONNECTIONSTATE_RESPONSE, parse_connectionstate_response),
    service(SERVICE_DISCONNECT_REQUEST, parse_disconnect_request),
    service(SERVICE_DISCONNECT_RESPONSE, parse_disconnect_response),
    service(SERVICE_DEVICE_CONFIGURATION_REQUEST, parse_device_configuration_request),
    service(SERVICE_DEVICE_CONFIGURATION_ACK, parse_device_configuration_ack),
    service(SERVICE_TUNNELING_REQUEST, parse_tunneling_request),
    service(SERVICE_TUNNELING_ACK, parse_tunneling_ack),
];

impl KnxNetIpMessage {
    pub fn service_type(&self) -> u16 {
        match self {
            Self::ConnectRequest { .. } => SERVICE_CONNECT_REQUEST,
            Self::ConnectResponse { .. } => SERVICE_CONNECT_RESPONSE,
            Self::ConnectionStateRequest { .. } => SERVICE_CONNECTIONSTATE_REQUEST,
            Self::ConnectionStateResponse { .. } => SERVICE_CONNECTIONSTATE_RESPONSE,
            Self::DisconnectRequest { .. } => SERVICE_DISCONNECT_REQUEST,
            Self::DisconnectResponse { .. } => SERVICE_DISCONNECT_RESPONSE,
            Self::DeviceConfigurationRequest { .. } => SERVICE_DEVICE_CONFIGURATION_REQUEST,
            Self::DeviceConfigurationAck { .. } => SERVICE_DEVICE_CONFIGURATION_ACK,
            Self::TunnelingRequest { .. } => SERVICE_TUNNELING_REQUEST,
            Self::TunnelingAck { .. } => SERVICE_TUNNELING_ACK,
        }
    }

    /// Channel the message belongs to. Connect requests have none yet.
    pub fn channel_id(&self) -> Option<u8> {
        match self {
            Self::ConnectRequest { .. } => None,
            Self::ConnectResponse { channel_id, .. }
            | Self::ConnectionStateRequest { channel_id, .. }
            | Self::ConnectionStateResponse { channel_id, .. }
            | Self::DisconnectRequest { channel_id, .. }
            | Self::DisconnectResponse { channel_id, .. }
            | Self::DeviceConfigurationRequest { channel_id, .. }
            | Self::DeviceConfigurationAck { channel_id, .. }
            | Self::TunnelingRequest { channel_id, .. }
            | Self::TunnelingAck { channel_id, .. } => Some(*channel_id),
        }
    }

    /// The positive acknowledgement a receiver owes for this message, if
    /// any.
    pub fn acknowledgement(&self) -> Option<Self> {
        match *self {
            Self::TunnelingRequest {
                channel_id,
                sequence_counter,
                ..
            } => Some(Self::TunnelingAck {
                channel_id,
                sequence_counter,
                status: STATUS_OK,
            }),
            Self::DeviceConfigurationRequest {
                channel_id,
                sequence_counter,
                ..
            } => Some(Self::DeviceConfigurationAck {
                channel_id,
                sequence_counter,
                status: STATUS_OK,
            }),
            _ => None,
        }
    }

    /// Decodes one frame, header included. Header constant mismatches and a
    /// non-zero reserved byte are logged and tolerated.
    pub fn decode(r: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Self::decode_inner(r, false)
    }

    /// Like [`KnxNetIpMessage::decode`] but constant and reserved mismatches
    /// fail with [`DecodeError::ConstantMismatch`].
    pub fn decode_strict(r: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Self::decode_inner(r, true)
    }

    fn decode_inner(r: &mut BitReader<'_>, strict: bool) -> Result<Self, DecodeError> {
        let mut cursor = *r;
        let header = KnxHeader::decode(&mut cursor, strict)?;
        let body = cursor.read_exact(header.body_len)?;
        let entry = SERVICES
            .iter()
            .find(|entry| entry.service_type == header.service_type)
            .ok_or(DecodeError::UnknownDiscriminator {
                code: header.service_type,
                response: false,
            })?;

        let mut body_reader = BitReader::new(body);
        let message = (entry.parse)(&mut body_reader, strict).map_err(|e| match e {
            // The total length promised a complete body.
            DecodeError::Truncated => DecodeError::InvalidLength,
            other => other,
        })?;
        if !body_reader.is_empty() {
            return Err(DecodeError::InvalidLength);
        }
        *r = cursor;
        Ok(message)
    }

    pub fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        let mut body = BitWriter::new();
        self.encode_body(&mut body)?;
        let body = body.into_bytes();
        KnxHeader {
            service_type: self.service_type(),
            body_len: body.len(),
        }
        .encode(w)?;
        w.write_all(&body)
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = BitWriter::with_capacity(HEADER_LEN + 16);
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }

    fn encode_body(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        match self {
            Self::ConnectRequest {
                control_endpoint,
                data_endpoint,
                cri,
            } => {
                control_endpoint.encode(w)?;
                data_endpoint.encode(w)?;
                w.write_u8(CRI_LEN)?;
                w.write_u8(cri.connection_type)?;
                w.write_u8(cri.knx_layer)?;
                w.write_u8(0)
            }
            Self::ConnectResponse {
                channel_id,
                status,
                endpoint,
            } => {
                if endpoint.is_some() && *status != STATUS_OK {
                    return Err(EncodeError::Message(
                        "connect response endpoint requires STATUS_OK",
                    ));
                }
                w.write_u8(*channel_id)?;
                w.write_u8(*status)?;
                if let Some(endpoint) = endpoint {
                    endpoint.data_endpoint.encode(w)?;
                    w.write_u8(CRD_LEN)?;
                    w.write_u8(endpoint.connection_type)?;
                    w.write_be_u16(endpoint.individual_address)?;
                }
                Ok(())
            }
            Self::ConnectionStateRequest {
                channel_id,
                control_endpoint,
            }
            | Self::DisconnectRequest {
                channel_id,
                control_endpoint,
            } => {
                w.write_u8(*channel_id)?;
                w.write_u8(0)?;
                control_endpoint.encode(w)
            }
            Self::ConnectionStateResponse { channel_id, status }
            | Self::DisconnectResponse { channel_id, status } => {
                w.write_u8(*channel_id)?;
                w.write_u8(*status)
            }
            Self::DeviceConfigurationRequest {
                channel_id,
                sequence_counter,
                cemi,
            }
            | Self::TunnelingRequest {
                channel_id,
                sequence_counter,
                cemi,
            } => {
                encode_connection_header(w, *channel_id, *sequence_counter, 0)?;
                w.write_all(cemi)
            }
            Self::DeviceConfigurationAck {
                channel_id,
                sequence_counter,
                status,
            }
            | Self::TunnelingAck {
                channel_id,
                sequence_counter,
                status,
            } => encode_connection_header(w, *channel_id, *sequence_counter, *status),
        }
    }
}

fn expect_structure_len(r: &mut BitReader<'_>, expected: u8) -> Result<(), DecodeError> {
    if r.read_u8()? != expected {
        return Err(DecodeError::InvalidLength);
    }
    Ok(())
}

fn encode_connection_header(
    w: &mut BitWriter,
    channel_id: u8,
    sequence_counter: u8,
    last: u8,
) -> Result<(), EncodeError> {
    w.write_u8(CONNECTION_HEADER_LEN)?;
    w.write_u8(channel_id)?;
    w.write_u8(sequence_counter)?;
    w.write_u8(last)
}

/// Returns `(channel, sequence, status-or-reserved)`.
fn decode_connection_header(r: &mut BitReader<'_>) -> Result<(u8, u8, u8), DecodeError> {
    expect_structure_len(r, CONNECTION_HEADER_LEN)?;
    Ok((r.read_u8()?, r.read_u8()?, r.read_u8()?))
}

fn parse_connect_request(
    r: &mut BitReader<'_>,
    strict: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let control_endpoint = Hpai::decode(r)?;
    let data_endpoint = Hpai::decode(r)?;
    expect_structure_len(r, CRI_LEN)?;
    let connection_type = r.read_u8()?;
    let knx_layer = r.read_u8()?;
    check_constant(strict, "CRI reserved byte", 0, r.read_u8()?)?;
    Ok(KnxNetIpMessage::ConnectRequest {
        control_endpoint,
        data_endpoint,
        cri: ConnectionRequestInfo {
            connection_type,
            knx_layer,
        },
    })
}

fn parse_connect_response(
    r: &mut BitReader<'_>,
    _: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let channel_id = r.read_u8()?;
    let status = r.read_u8()?;
    let endpoint = if status == STATUS_OK && !r.is_empty() {
        let data_endpoint = Hpai::decode(r)?;
        expect_structure_len(r, CRD_LEN)?;
        Some(ConnectionEndpoint {
            data_endpoint,
            connection_type: r.read_u8()?,
            individual_address: r.read_be_u16()?,
        })
    } else {
        None
    };
    Ok(KnxNetIpMessage::ConnectResponse {
        channel_id,
        status,
        endpoint,
    })
}

fn parse_channel_request(
    r: &mut BitReader<'_>,
    strict: bool,
) -> Result<(u8, Hpai), DecodeError> {
    let channel_id = r.read_u8()?;
    check_constant(strict, "reserved byte", 0, r.read_u8()?)?;
    Ok((channel_id, Hpai::decode(r)?))
}

fn parse_connectionstate_request(
    r: &mut BitReader<'_>,
    strict: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let (channel_id, control_endpoint) = parse_channel_request(r, strict)?;
    Ok(KnxNetIpMessage::ConnectionStateRequest {
        channel_id,
        control_endpoint,
    })
}

fn parse_connectionstate_response(
    r: &mut BitReader<'_>,
    _: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    Ok(KnxNetIpMessage::ConnectionStateResponse {
        channel_id: r.read_u8()?,
        status: r.read_u8()?,
    })
}

fn parse_disconnect_request(
    r: &mut BitReader<'_>,
    strict: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let (channel_id, control_endpoint) = parse_channel_request(r, strict)?;
    Ok(KnxNetIpMessage::DisconnectRequest {
        channel_id,
        control_endpoint,
    })
}

fn parse_disconnect_response(
    r: &mut BitReader<'_>,
    _: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    Ok(KnxNetIpMessage::DisconnectResponse {
        channel_id: r.read_u8()?,
        status: r.read_u8()?,
    })
}

fn parse_device_configuration_request(
    r: &mut BitReader<'_>,
    strict: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let (channel_id, sequence_counter, reserved) = decode_connection_header(r)?;
    check_constant(strict, "connection header reserved byte", 0, reserved)?;
    Ok(KnxNetIpMessage::DeviceConfigurationRequest {
        channel_id,
        sequence_counter,
        cemi: r.read_bytes(r.remaining())?,
    })
}

fn parse_device_configuration_ack(
    r: &mut BitReader<'_>,
    _: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let (channel_id, sequence_counter, status) = decode_connection_header(r)?;
    Ok(KnxNetIpMessage::DeviceConfigurationAck {
        channel_id,
        sequence_counter,
        status,
    })
}

fn parse_tunneling_request(
    r: &mut BitReader<'_>,
    strict: bool,
) -> Result<KnxNetIpMessage, DecodeError> {
    let (channel_id, sequence_counter, reserved) = decode_connection_header(r)?;
    check_constant(strict, "connection header reserved byte", 0, reserved)?;
    Ok(KnxNetIpMessage::TunnelingRequest {
        channel_id,
        sequence_counter,
        cemi: r.read_bytes(r.remaining())?,
    })
}

fn parse_tunneling_ack(r: &mut BitReader<'_>, _: bool) -> Result<KnxNetIpMessage, DecodeError> {
    let (channel_id, sequence_counter, status) = decode_connection_header(r)?;
    Ok(KnxNetIpMessage::TunnelingAck {
        channel_id,
        sequence_counter,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tunnel_request() -> KnxNetIpMessage {
        KnxNetIpMessage::TunnelingRequest {
            channel_id: 0x15,
            sequence_counter: 0x03,
            cemi: vec![0x29, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00, 0x81],
        }
    }

    #[test]
    fn tunneling_request_bytes() {
        let bytes = tunnel_request().encode_to_vec().unwrap();
        assert_eq!(&bytes[..10], &[0x06, 0x10, 0x04, 0x20, 0x00, 0x15, 0x04, 0x15, 0x03, 0x00]);
        assert_eq!(bytes.len(), 21);
        let decoded = KnxNetIpMessage::decode_strict(&mut BitReader::new(&bytes)).unwrap();
        assert_eq!(decoded, tunnel_request());
    }

    #[test]
    fn acknowledgement_mirrors_channel_and_sequence() {
        assert_eq!(
            tunnel_request().acknowledgement(),
            Some(KnxNetIpMessage::TunnelingAck {
                channel_id: 0x15,
                sequence_counter: 0x03,
                status: STATUS_OK,
            })
        );
        let ack_bytes = tunnel_request()
            .acknowledgement()
            .unwrap()
            .encode_to_vec()
            .unwrap();
        assert_eq!(ack_bytes, vec![0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, 0x04, 0x15, 0x03, 0x00]);
        assert!(KnxNetIpMessage::TunnelingAck {
            channel_id: 1,
            sequence_counter: 1,
            status: 0,
        }
        .acknowledgement()
        .is_none());
    }

    #[test]
    fn connect_roundtrip() {
        let request = KnxNetIpMessage::ConnectRequest {
            control_endpoint: Hpai::route_back(),
            data_endpoint: Hpai::route_back(),
            cri: ConnectionRequestInfo::tunnel(),
        };
        let bytes = request.encode_to_vec().unwrap();
        assert_eq!(bytes.len(), 26);
        assert_eq!(
            KnxNetIpMessage::decode(&mut BitReader::new(&bytes)).unwrap(),
            request
        );

        let response = KnxNetIpMessage::ConnectResponse {
            channel_id: 7,
            status: STATUS_OK,
            endpoint: Some(ConnectionEndpoint {
                data_endpoint: Hpai {
                    protocol: HostProtocol::Udp,
                    address: [192, 168, 1, 10],
                    port: 3671,
                },
                connection_type: CONNECTION_TYPE_TUNNEL,
                individual_address: 0x11FF,
            }),
        };
        let bytes = response.encode_to_vec().unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(
            KnxNetIpMessage::decode(&mut BitReader::new(&bytes)).unwrap(),
            response
        );
    }

    #[test]
    fn failed_connect_response_has_no_endpoint() {
        let bytes = [0x06, 0x10, 0x02, 0x06, 0x00, 0x08, 0x00, 0x24];
        assert_eq!(
            KnxNetIpMessage::decode(&mut BitReader::new(&bytes)).unwrap(),
            KnxNetIpMessage::ConnectResponse {
                channel_id: 0,
                status: 0x24,
                endpoint: None,
            }
        );
    }

    #[test]
    fn reserved_byte_policy() {
        let mut bytes = tunnel_request().encode_to_vec().unwrap();
        bytes[9] = 0x01;
        assert!(KnxNetIpMessage::decode(&mut BitReader::new(&bytes)).is_ok());
        assert_eq!(
            KnxNetIpMessage::decode_strict(&mut BitReader::new(&bytes)).unwrap_err(),
            DecodeError::ConstantMismatch {
                expected: 0,
                actual: 1,
            }
        );
    }

    #[test]
    fn unknown_service_and_bad_structure_length() {
        let unknown = [0x06, 0x10, 0x05, 0x30, 0x00, 0x06];
        assert_eq!(
            KnxNetIpMessage::decode(&mut BitReader::new(&unknown)).unwrap_err(),
            DecodeError::UnknownDiscriminator {
                code: 0x0530,
                response: false,
            }
        );

        let bad_len = [0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, 0x05, 0x15, 0x03, 0x00];
        assert_eq!(
            KnxNetIpMessage::decode(&mut BitReader::new(&bad_len)).unwrap_err(),
            DecodeError::InvalidLength
        );
    }

    #[test]
    fn partial_frame_is_truncated() {
        let bytes = tunnel_request().encode_to_vec().unwrap();
        let mut r = BitReader::new(&bytes[..12]);
        assert_eq!(KnxNetIpMessage::decode(&mut r).unwrap_err(), DecodeError::Truncated);
        assert_eq!(r.byte_position(), 0);
    }

    fn tunnel_endpoint() -> ConnectionEndpoint {
        ConnectionEndpoint {
            data_endpoint: Hpai::route_back(),
            connection_type: CONNECTION_TYPE_TUNNEL,
            individual_address: 0x1101,
        }
    }

    #[test]
    fn failed_connect_response_cannot_carry_an_endpoint() {
        let inconsistent = KnxNetIpMessage::ConnectResponse {
            channel_id: 1,
            status: 0x24,
            endpoint: Some(tunnel_endpoint()),
        };
        assert!(matches!(inconsistent.encode_to_vec(), Err(EncodeError::Message(_))));
    }

    #[test]
    fn connect_response_status_and_endpoint_roundtrip() {
        for response in [
            KnxNetIpMessage::ConnectResponse {
                channel_id: 1,
                status: 0x24,
                endpoint: None,
            },
            KnxNetIpMessage::ConnectResponse {
                channel_id: 2,
                status: STATUS_OK,
                endpoint: None,
            },
            KnxNetIpMessage::ConnectResponse {
                channel_id: 3,
                status: STATUS_OK,
                endpoint: Some(tunnel_endpoint()),
            },
        ] {
            let bytes = response.encode_to_vec().unwrap();
            assert_eq!(
                KnxNetIpMessage::decode_strict(&mut BitReader::new(&bytes)).unwrap(),
                response
            );
        }
    }

    fn arb_hpai() -> impl Strategy<Value = Hpai> {
        (any::<u8>(), any::<[u8; 4]>(), any::<u16>()).prop_map(|(protocol, address, port)| Hpai {
            protocol: HostProtocol::from_u8(protocol),
            address,
            port,
        })
    }

    fn arb_knx_message() -> impl Strategy<Value = KnxNetIpMessage> {
        let cemi = || prop::collection::vec(any::<u8>(), 0..=64);
        let endpoint = (arb_hpai(), any::<u8>(), any::<u16>()).prop_map(
            |(data_endpoint, connection_type, individual_address)| ConnectionEndpoint {
                data_endpoint,
                connection_type,
                individual_address,
            },
        );
        prop_oneof![
            (arb_hpai(), arb_hpai(), any::<u8>(), any::<u8>()).prop_map(
                |(control_endpoint, data_endpoint, connection_type, knx_layer)| {
                    KnxNetIpMessage::ConnectRequest {
                        control_endpoint,
                        data_endpoint,
                        cri: ConnectionRequestInfo {
                            connection_type,
                            knx_layer,
                        },
                    }
                }
            ),
            (any::<u8>(), proptest::option::of(endpoint)).prop_map(|(channel_id, endpoint)| {
                KnxNetIpMessage::ConnectResponse {
                    channel_id,
                    status: STATUS_OK,
                    endpoint,
                }
            }),
            (any::<u8>(), 1u8..).prop_map(|(channel_id, status)| {
                KnxNetIpMessage::ConnectResponse {
                    channel_id,
                    status,
                    endpoint: None,
                }
            }),
            (any::<u8>(), arb_hpai()).prop_map(|(channel_id, control_endpoint)| {
                KnxNetIpMessage::ConnectionStateRequest {
                    channel_id,
                    control_endpoint,
                }
            }),
            (any::<u8>(), any::<u8>()).prop_map(|(channel_id, status)| {
                KnxNetIpMessage::ConnectionStateResponse { channel_id, status }
            }),
            (any::<u8>(), arb_hpai()).prop_map(|(channel_id, control_endpoint)| {
                KnxNetIpMessage::DisconnectRequest {
                    channel_id,
                    control_endpoint,
                }
            }),
            (any::<u8>(), any::<u8>()).prop_map(|(channel_id, status)| {
                KnxNetIpMessage::DisconnectResponse { channel_id, status }
            }),
            (any::<u8>(), any::<u8>(), cemi()).prop_map(|(channel_id, sequence_counter, cemi)| {
                KnxNetIpMessage::DeviceConfigurationRequest {
                    channel_id,
                    sequence_counter,
                    cemi,
                }
            }),
            (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
                |(channel_id, sequence_counter, status)| KnxNetIpMessage::DeviceConfigurationAck {
                    channel_id,
                    sequence_counter,
                    status,
                }
            ),
            (any::<u8>(), any::<u8>(), cemi()).prop_map(|(channel_id, sequence_counter, cemi)| {
                KnxNetIpMessage::TunnelingRequest {
                    channel_id,
                    sequence_counter,
                    cemi,
                }
            }),
            (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
                |(channel_id, sequence_counter, status)| KnxNetIpMessage::TunnelingAck {
                    channel_id,
                    sequence_counter,
                    status,
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn knx_message_roundtrip(message in arb_knx_message()) {
            let bytes = message.encode_to_vec().unwrap();
            let decoded = KnxNetIpMessage::decode_strict(&mut BitReader::new(&bytes)).unwrap();
            prop_assert_eq!(decoded, message);
        }
    }
}
