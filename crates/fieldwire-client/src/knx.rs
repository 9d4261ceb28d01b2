use crate::engine::{Engine, EngineConfig};
use crate::protocol::KnxNetIp;
use crate::ClientError;
use fieldwire_core::knxnetip::message::{ConnectionRequestInfo, STATUS_OK};
use fieldwire_core::knxnetip::{Hpai, KnxNetIpMessage, LData};
use fieldwire_transport::{TcpTransport, Transport};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Gateways drop a tunnel after 120 s without a connection-state request.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// An open tunnelling connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelInfo {
    pub channel_id: u8,
    /// Individual address the gateway assigned to the tunnel, if it said.
    pub individual_address: Option<u16>,
}

/// Periodic connection-state requests. Stops when dropped.
#[derive(Debug)]
pub struct Heartbeat {
    task: JoinHandle<()>,
}

impl Heartbeat {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// KNXnet/IP tunnelling client over a stream connection.
///
/// Inbound tunnelling requests are acknowledged by the engine and arrive on
/// [`telegrams`](KnxTunnelClient::telegrams).
pub struct KnxTunnelClient<T: Transport> {
    engine: Engine<T, KnxNetIp>,
    tunnel: Mutex<Option<TunnelInfo>>,
    sequence: Mutex<u8>,
    response_timeout: Duration,
}

impl KnxTunnelClient<TcpTransport> {
    /// Connects to a gateway and opens a tunnel.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let client = Self::with_transport(TcpTransport::new(addr));
        client.open().await?;
        Ok(client)
    }
}

impl<T: Transport> KnxTunnelClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self::with_engine_config(transport, EngineConfig::default())
    }

    pub fn with_engine_config(transport: T, config: EngineConfig) -> Self {
        let response_timeout = config.default_ttl;
        Self {
            engine: Engine::new(transport, KnxNetIp::default(), config),
            tunnel: Mutex::new(None),
            sequence: Mutex::new(0),
            response_timeout,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Engine<T, KnxNetIp> {
        &self.engine
    }

    /// Inbound messages nobody was waiting for: tunnelled telegrams and
    /// gateway-initiated requests. Only the first call gets the receiver.
    pub fn telegrams(&self) -> Option<mpsc::Receiver<KnxNetIpMessage>> {
        self.engine.default_channel()
    }

    pub async fn tunnel(&self) -> Option<TunnelInfo> {
        *self.tunnel.lock().await
    }

    async fn channel_id(&self) -> Result<u8, ClientError> {
        self.tunnel
            .lock()
            .await
            .map(|t| t.channel_id)
            .ok_or(ClientError::TunnelNotOpen)
    }

    async fn next_sequence(&self) -> u8 {
        let mut lock = self.sequence.lock().await;
        let sequence = *lock;
        *lock = lock.wrapping_add(1);
        sequence
    }

    async fn exchange(
        &self,
        request: &KnxNetIpMessage,
        accept: impl Fn(&KnxNetIpMessage) -> bool + Send + 'static,
    ) -> Result<KnxNetIpMessage, ClientError> {
        Ok(self
            .engine
            .request(request, accept, Some(self.response_timeout))
            .await?)
    }

    /// Connects the transport if needed and opens a tunnelling connection.
    pub async fn open(&self) -> Result<TunnelInfo, ClientError> {
        self.engine.connect().await?;
        let request = KnxNetIpMessage::ConnectRequest {
            control_endpoint: Hpai::route_back(),
            data_endpoint: Hpai::route_back(),
            cri: ConnectionRequestInfo::tunnel(),
        };
        let response = self
            .exchange(&request, |m| matches!(m, KnxNetIpMessage::ConnectResponse { .. }))
            .await?;
        let info = match response {
            KnxNetIpMessage::ConnectResponse {
                channel_id,
                status: STATUS_OK,
                endpoint,
            } => TunnelInfo {
                channel_id,
                individual_address: endpoint.map(|e| e.individual_address),
            },
            KnxNetIpMessage::ConnectResponse { status, .. } => {
                return Err(ClientError::RemoteStatus { status })
            }
            _ => return Err(ClientError::UnexpectedResponse),
        };
        log::debug!("knx tunnel open on channel {}", info.channel_id);
        *self.sequence.lock().await = 0;
        *self.tunnel.lock().await = Some(info);
        Ok(info)
    }

    /// One connection-state request/response round trip.
    pub async fn heartbeat(&self) -> Result<(), ClientError> {
        let channel_id = self.channel_id().await?;
        let request = KnxNetIpMessage::ConnectionStateRequest {
            channel_id,
            control_endpoint: Hpai::route_back(),
        };
        let response = self
            .exchange(&request, move |m| {
                matches!(
                    m,
                    KnxNetIpMessage::ConnectionStateResponse { channel_id: c, .. }
                        if *c == channel_id
                )
            })
            .await?;
        match response {
            KnxNetIpMessage::ConnectionStateResponse {
                status: STATUS_OK, ..
            } => Ok(()),
            KnxNetIpMessage::ConnectionStateResponse { status, .. } => {
                Err(ClientError::RemoteStatus { status })
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sends a cEMI frame through the tunnel and waits for the gateway's
    /// tunnelling ack for its sequence number.
    pub async fn send_cemi(&self, frame: &LData) -> Result<(), ClientError> {
        let channel_id = self.channel_id().await?;
        let sequence_counter = self.next_sequence().await;
        let request = KnxNetIpMessage::TunnelingRequest {
            channel_id,
            sequence_counter,
            cemi: frame.encode_to_vec()?,
        };
        let ack = self
            .exchange(&request, move |m| {
                matches!(
                    m,
                    KnxNetIpMessage::TunnelingAck { channel_id: c, sequence_counter: s, .. }
                        if *c == channel_id && *s == sequence_counter
                )
            })
            .await?;
        match ack {
            KnxNetIpMessage::TunnelingAck {
                status: STATUS_OK, ..
            } => Ok(()),
            KnxNetIpMessage::TunnelingAck { status, .. } => {
                Err(ClientError::RemoteStatus { status })
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn group_write(
        &self,
        destination: u16,
        data: &[u8],
        small: bool,
    ) -> Result<(), ClientError> {
        self.send_cemi(&LData::group_write(destination, data, small))
            .await
    }

    pub async fn group_read(&self, destination: u16) -> Result<(), ClientError> {
        self.send_cemi(&LData::group_read(destination)).await
    }

    /// Disconnects the tunnel, then closes the engine.
    pub async fn close(&self) -> Result<(), ClientError> {
        let tunnel = self.tunnel.lock().await.take();
        if let Some(tunnel) = tunnel {
            let channel_id = tunnel.channel_id;
            let request = KnxNetIpMessage::DisconnectRequest {
                channel_id,
                control_endpoint: Hpai::route_back(),
            };
            let result = self
                .exchange(&request, move |m| {
                    matches!(
                        m,
                        KnxNetIpMessage::DisconnectResponse { channel_id: c, .. }
                            if *c == channel_id
                    )
                })
                .await;
            if let Err(err) = result {
                log::warn!("knx disconnect of channel {channel_id} failed: {err}");
            }
        }
        Ok(self.engine.close().await?)
    }

    /// Spawns a task that sends a connection-state request every
    /// `interval` for as long as the client lives.
    pub fn start_heartbeat(self: &Arc<Self>, interval: Duration) -> Heartbeat {
        let client: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(client) = client.upgrade() else {
                    break;
                };
                if let Err(err) = client.heartbeat().await {
                    log::warn!("knx heartbeat failed: {err}");
                }
            }
        });
        Heartbeat { task }
    }
}

/// The cEMI frame inside a tunnelling request, if it is one and decodes.
pub fn tunnelled_frame(message: &KnxNetIpMessage) -> Option<LData> {
    match message {
        KnxNetIpMessage::TunnelingRequest { cemi, .. } => match LData::decode_from_bytes(cemi) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::debug!("undecodable cEMI frame: {err}");
                None
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldwire_core::knxnetip::cemi::{GroupService, MC_LDATA_IND};
    use fieldwire_core::knxnetip::message::{ConnectionEndpoint, CONNECTION_TYPE_TUNNEL};
    use fieldwire_transport::MemoryTransport;

    const CHANNEL: u8 = 21;

    fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_default_ttl(Duration::from_millis(500))
    }

    fn indication() -> LData {
        let mut frame = LData::group_write(0x0A03, &[0x01], true);
        frame.message_code = MC_LDATA_IND;
        frame.source = 0x1101;
        frame
    }

    /// A gateway on the far side of a memory pair: answers control
    /// requests and echoes every tunnelled frame back as an indication.
    async fn fake_gateway(transport: MemoryTransport) -> JoinHandle<Vec<KnxNetIpMessage>> {
        let engine = Engine::new(transport, KnxNetIp::default(), fast_config());
        engine.connect().await.unwrap();
        let mut inbound = engine.default_channel().unwrap();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut sequence = 0u8;
            while let Some(message) = inbound.recv().await {
                let reply = match &message {
                    KnxNetIpMessage::ConnectRequest { .. } => {
                        Some(KnxNetIpMessage::ConnectResponse {
                            channel_id: CHANNEL,
                            status: STATUS_OK,
                            endpoint: Some(ConnectionEndpoint {
                                data_endpoint: Hpai::route_back(),
                                connection_type: CONNECTION_TYPE_TUNNEL,
                                individual_address: 0x11FA,
                            }),
                        })
                    }
                    KnxNetIpMessage::ConnectionStateRequest { channel_id, .. } => {
                        Some(KnxNetIpMessage::ConnectionStateResponse {
                            channel_id: *channel_id,
                            status: STATUS_OK,
                        })
                    }
                    KnxNetIpMessage::TunnelingRequest { channel_id, .. } => {
                        sequence = sequence.wrapping_add(1);
                        Some(KnxNetIpMessage::TunnelingRequest {
                            channel_id: *channel_id,
                            sequence_counter: sequence,
                            cemi: indication().encode_to_vec().unwrap(),
                        })
                    }
                    KnxNetIpMessage::DisconnectRequest { channel_id, .. } => {
                        Some(KnxNetIpMessage::DisconnectResponse {
                            channel_id: *channel_id,
                            status: STATUS_OK,
                        })
                    }
                    _ => None,
                };
                let done = matches!(message, KnxNetIpMessage::DisconnectRequest { .. });
                seen.push(message);
                if let Some(reply) = reply {
                    engine.send_unmatched(&reply).await.unwrap();
                }
                if done {
                    break;
                }
            }
            seen
        })
    }

    #[tokio::test]
    async fn tunnel_lifecycle() {
        let (client_side, gateway_side) = MemoryTransport::pair();
        let gateway = fake_gateway(gateway_side).await;
        let client = KnxTunnelClient::with_engine_config(client_side, fast_config());
        let mut telegrams = client.telegrams().unwrap();

        let info = client.open().await.unwrap();
        assert_eq!(info.channel_id, CHANNEL);
        assert_eq!(info.individual_address, Some(0x11FA));

        client.heartbeat().await.unwrap();
        client.group_write(0x0A03, &[0x01], true).await.unwrap();

        let inbound = tokio::time::timeout(Duration::from_secs(1), telegrams.recv())
            .await
            .unwrap()
            .unwrap();
        let frame = tunnelled_frame(&inbound).unwrap();
        assert_eq!(frame.destination, 0x0A03);
        assert_eq!(frame.group_service(), Some(GroupService::Write));
        assert_eq!(frame.group_data(), vec![0x01]);

        client.close().await.unwrap();
        let seen = gateway.await.unwrap();
        assert_eq!(seen.len(), 4);
        match &seen[2] {
            KnxNetIpMessage::TunnelingRequest {
                channel_id,
                sequence_counter,
                cemi,
            } => {
                assert_eq!(*channel_id, CHANNEL);
                assert_eq!(*sequence_counter, 0);
                assert_eq!(LData::decode_from_bytes(cemi).unwrap().destination, 0x0A03);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_need_an_open_tunnel() {
        let client = KnxTunnelClient::with_transport(MemoryTransport::new());
        assert!(matches!(
            client.group_read(0x0A03).await,
            Err(ClientError::TunnelNotOpen)
        ));
        assert!(matches!(
            client.heartbeat().await,
            Err(ClientError::TunnelNotOpen)
        ));
    }

    #[tokio::test]
    async fn rejected_connect_reports_status() {
        let (client_side, gateway_side) = MemoryTransport::pair();
        let gateway = Engine::new(gateway_side, KnxNetIp::default(), fast_config());
        gateway.connect().await.unwrap();
        let mut inbound = gateway.default_channel().unwrap();
        let responder = tokio::spawn(async move {
            inbound.recv().await.unwrap();
            gateway
                .send_unmatched(&KnxNetIpMessage::ConnectResponse {
                    channel_id: 0,
                    status: 0x24,
                    endpoint: None,
                })
                .await
                .unwrap();
            gateway
        });

        let client = KnxTunnelClient::with_engine_config(client_side, fast_config());
        assert!(matches!(
            client.open().await,
            Err(ClientError::RemoteStatus { status: 0x24 })
        ));
        assert!(client.tunnel().await.is_none());
        drop(responder.await.unwrap());
    }
}
