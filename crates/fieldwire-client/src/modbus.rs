use crate::engine::{Engine, EngineConfig};
use crate::protocol::ModbusTcp;
use crate::ClientError;
use fieldwire_core::encoding::value_codec::{decode_value_from_bytes, encode_value_to_vec};
use fieldwire_core::modbus::pdu::{COIL_OFF, COIL_ON};
use fieldwire_core::modbus::{pack_coils, unpack_coils, ModbusPdu, TcpAdu};
use fieldwire_core::types::{PrimitiveType, TypedValue};
use fieldwire_core::EncodeError;
use fieldwire_transport::{TcpTransport, Transport};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_UNIT_ID: u8 = 1;

/// Async Modbus TCP client.
///
/// Requests are correlated by transaction id, so any number may be in
/// flight on one connection.
pub struct ModbusClient<T: Transport> {
    engine: Engine<T, ModbusTcp>,
    unit_id: u8,
    transaction_id: Mutex<u16>,
    response_timeout: Duration,
}

impl ModbusClient<TcpTransport> {
    /// Connects to a Modbus TCP server.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let client = Self::with_transport(TcpTransport::new(addr));
        client.open().await?;
        Ok(client)
    }
}

impl<T: Transport> ModbusClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self::with_engine_config(transport, EngineConfig::default())
    }

    pub fn with_engine_config(transport: T, config: EngineConfig) -> Self {
        let response_timeout = config.default_ttl;
        Self {
            engine: Engine::new(transport, ModbusTcp::client(), config),
            unit_id: DEFAULT_UNIT_ID,
            transaction_id: Mutex::new(1),
            response_timeout,
        }
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Engine<T, ModbusTcp> {
        &self.engine
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub async fn open(&self) -> Result<(), ClientError> {
        Ok(self.engine.connect().await?)
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        Ok(self.engine.close().await?)
    }

    async fn next_transaction_id(&self) -> u16 {
        let mut lock = self.transaction_id.lock().await;
        let id = *lock;
        *lock = lock.wrapping_add(1);
        if *lock == 0 {
            *lock = 1;
        }
        id
    }

    /// Sends one request PDU and returns the matching response PDU.
    ///
    /// Exception responses become [`ClientError::ProtocolException`]; a
    /// response for a different function code is
    /// [`ClientError::UnexpectedResponse`].
    pub async fn call(&self, pdu: ModbusPdu) -> Result<ModbusPdu, ClientError> {
        let function_code = pdu.function_code();
        let transaction_id = self.next_transaction_id().await;
        let unit_id = self.unit_id;
        let request = TcpAdu::new(transaction_id, unit_id, pdu);
        log::debug!("modbus request {transaction_id} fc=0x{function_code:02x} unit={unit_id}");

        let response = self
            .engine
            .request(
                &request,
                move |adu: &TcpAdu| adu.transaction_id == transaction_id && adu.unit_id == unit_id,
                Some(self.response_timeout),
            )
            .await?;

        match response.pdu {
            ModbusPdu::Exception {
                function_code,
                exception,
            } => Err(ClientError::ProtocolException {
                function_code,
                exception,
            }),
            pdu if pdu.function_code() == function_code => Ok(pdu),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn read_coils(&self, start: u16, quantity: u16) -> Result<Vec<bool>, ClientError> {
        match self
            .call(ModbusPdu::ReadCoilsRequest { start, quantity })
            .await?
        {
            ModbusPdu::ReadCoilsResponse { values } => Ok(unpack_coils(&values, quantity.into())),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn read_discrete_inputs(
        &self,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ClientError> {
        match self
            .call(ModbusPdu::ReadDiscreteInputsRequest { start, quantity })
            .await?
        {
            ModbusPdu::ReadDiscreteInputsResponse { values } => {
                Ok(unpack_coils(&values, quantity.into()))
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    async fn read_register_bytes(
        &self,
        request: ModbusPdu,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        let response = self.call(request).await?;
        let values = response
            .read_payload()
            .ok_or(ClientError::UnexpectedResponse)?;
        if values.len() != usize::from(quantity) * 2 {
            return Err(ClientError::UnexpectedResponse);
        }
        Ok(values.to_vec())
    }

    pub async fn read_holding_registers(
        &self,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ClientError> {
        let request = ModbusPdu::ReadHoldingRegistersRequest { start, quantity };
        let bytes = self.read_register_bytes(request, quantity).await?;
        Ok(to_registers(&bytes))
    }

    pub async fn read_input_registers(
        &self,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ClientError> {
        let request = ModbusPdu::ReadInputRegistersRequest { start, quantity };
        let bytes = self.read_register_bytes(request, quantity).await?;
        Ok(to_registers(&bytes))
    }

    /// Reads enough holding registers for `count` elements of `ty` and
    /// decodes them with the value codec.
    pub async fn read_holding_typed(
        &self,
        start: u16,
        ty: PrimitiveType,
        count: u16,
    ) -> Result<TypedValue, ClientError> {
        let quantity = ty
            .register_count(count)
            .ok_or(EncodeError::ValueOutOfRange)?;
        let request = ModbusPdu::ReadHoldingRegistersRequest { start, quantity };
        let bytes = self.read_register_bytes(request, quantity).await?;
        Ok(decode_value_from_bytes(&bytes, ty, count.into())?)
    }

    pub async fn read_input_typed(
        &self,
        start: u16,
        ty: PrimitiveType,
        count: u16,
    ) -> Result<TypedValue, ClientError> {
        let quantity = ty
            .register_count(count)
            .ok_or(EncodeError::ValueOutOfRange)?;
        let request = ModbusPdu::ReadInputRegistersRequest { start, quantity };
        let bytes = self.read_register_bytes(request, quantity).await?;
        Ok(decode_value_from_bytes(&bytes, ty, count.into())?)
    }

    pub async fn write_single_coil(&self, address: u16, on: bool) -> Result<(), ClientError> {
        let value = if on { COIL_ON } else { COIL_OFF };
        match self
            .call(ModbusPdu::WriteSingleCoilRequest { address, value })
            .await?
        {
            ModbusPdu::WriteSingleCoilResponse { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn write_single_register(
        &self,
        address: u16,
        value: u16,
    ) -> Result<(), ClientError> {
        match self
            .call(ModbusPdu::WriteSingleRegisterRequest { address, value })
            .await?
        {
            ModbusPdu::WriteSingleRegisterResponse { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn write_multiple_coils(
        &self,
        start: u16,
        states: &[bool],
    ) -> Result<(), ClientError> {
        let quantity = quantity(states.len())?;
        match self
            .call(ModbusPdu::WriteMultipleCoilsRequest {
                start,
                quantity,
                values: pack_coils(states),
            })
            .await?
        {
            ModbusPdu::WriteMultipleCoilsResponse { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn write_multiple_registers(
        &self,
        start: u16,
        values: &[u16],
    ) -> Result<(), ClientError> {
        self.write_register_bytes(start, from_registers(values)).await
    }

    /// Encodes `value` with the value codec, pads it to whole registers and
    /// writes it from `start`.
    pub async fn write_typed(
        &self,
        start: u16,
        value: &TypedValue,
        ty: PrimitiveType,
        count: u16,
    ) -> Result<(), ClientError> {
        let mut bytes = encode_value_to_vec(value, ty, count.into())?;
        if bytes.len() % 2 != 0 {
            bytes.push(0);
        }
        self.write_register_bytes(start, bytes).await
    }

    async fn write_register_bytes(&self, start: u16, values: Vec<u8>) -> Result<(), ClientError> {
        let quantity = quantity(values.len() / 2)?;
        match self
            .call(ModbusPdu::WriteMultipleRegistersRequest {
                start,
                quantity,
                values,
            })
            .await?
        {
            ModbusPdu::WriteMultipleRegistersResponse { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn mask_write_register(
        &self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> Result<(), ClientError> {
        match self
            .call(ModbusPdu::MaskWriteRegisterRequest {
                address,
                and_mask,
                or_mask,
            })
            .await?
        {
            ModbusPdu::MaskWriteRegisterResponse { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Writes `values` at `write_start`, then reads `read_quantity`
    /// registers from `read_start`, in one transaction.
    pub async fn read_write_multiple_registers(
        &self,
        read_start: u16,
        read_quantity: u16,
        write_start: u16,
        values: &[u16],
    ) -> Result<Vec<u16>, ClientError> {
        let write_quantity = quantity(values.len())?;
        let bytes = self
            .read_register_bytes(
                ModbusPdu::ReadWriteMultipleRegistersRequest {
                    read_start,
                    read_quantity,
                    write_start,
                    write_quantity,
                    values: from_registers(values),
                },
                read_quantity,
            )
            .await?;
        Ok(to_registers(&bytes))
    }

    pub async fn read_exception_status(&self) -> Result<u8, ClientError> {
        match self.call(ModbusPdu::ReadExceptionStatusRequest).await? {
            ModbusPdu::ReadExceptionStatusResponse { value } => Ok(value),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn quantity(len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::ValueOutOfRange)
}

fn to_registers(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn from_registers(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldwire_core::encoding::reader::BitReader;
    use fieldwire_core::modbus::ExceptionCode;
    use fieldwire_core::types::Scalar;
    use fieldwire_core::Direction;
    use fieldwire_transport::MemoryTransport;
    use std::sync::Arc;

    /// Answers the next request written to `handle` with `respond`.
    fn reply_with(
        handle: MemoryTransport,
        respond: impl Fn(&ModbusPdu) -> ModbusPdu + Send + 'static,
    ) -> tokio::task::JoinHandle<ModbusPdu> {
        tokio::spawn(async move {
            loop {
                if let Some(bytes) = handle.take_sent().into_iter().next() {
                    let request =
                        TcpAdu::decode(&mut BitReader::new(&bytes), Direction::Request).unwrap();
                    let response =
                        TcpAdu::new(request.transaction_id, request.unit_id, respond(&request.pdu));
                    handle.feed(&response.encode_to_vec().unwrap());
                    return request.pdu;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }

    async fn client() -> (Arc<ModbusClient<MemoryTransport>>, MemoryTransport) {
        let transport = MemoryTransport::new();
        let handle = transport.clone();
        let client = ModbusClient::with_engine_config(
            transport,
            EngineConfig::default().with_poll_interval(Duration::from_millis(5)),
        )
        .with_response_timeout(Duration::from_millis(500));
        client.open().await.unwrap();
        (Arc::new(client), handle)
    }

    #[tokio::test]
    async fn transaction_ids_wrap_and_skip_zero() {
        let client = ModbusClient::with_transport(MemoryTransport::new());
        *client.transaction_id.lock().await = u16::MAX;
        assert_eq!(client.next_transaction_id().await, u16::MAX);
        assert_eq!(client.next_transaction_id().await, 1);
        assert_eq!(client.next_transaction_id().await, 2);
    }

    #[tokio::test]
    async fn reads_holding_registers() {
        let (client, handle) = client().await;
        let server = reply_with(handle, |_| ModbusPdu::ReadHoldingRegistersResponse {
            values: vec![0x00, 0x0A, 0x00, 0x14],
        });
        assert_eq!(client.read_holding_registers(0, 2).await.unwrap(), vec![10, 20]);
        assert_eq!(
            server.await.unwrap(),
            ModbusPdu::ReadHoldingRegistersRequest {
                start: 0,
                quantity: 2
            }
        );
    }

    #[tokio::test]
    async fn reads_a_typed_float() {
        let (client, handle) = client().await;
        let _server = reply_with(handle, |_| ModbusPdu::ReadHoldingRegistersResponse {
            values: vec![0x41, 0xAC, 0x00, 0x00],
        });
        let value = client
            .read_holding_typed(100, PrimitiveType::Float32, 1)
            .await
            .unwrap();
        assert_eq!(value, TypedValue::Scalar(Scalar::Float32(21.5)));
    }

    #[tokio::test]
    async fn exception_responses_surface_as_errors() {
        let (client, handle) = client().await;
        let _server = reply_with(handle, |pdu| ModbusPdu::Exception {
            function_code: pdu.function_code(),
            exception: ExceptionCode::IllegalDataAddress,
        });
        let err = client.write_single_register(9999, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolException {
                function_code: 0x06,
                exception: ExceptionCode::IllegalDataAddress
            }
        ));
    }

    #[tokio::test]
    async fn mismatched_function_code_is_unexpected() {
        let (client, handle) = client().await;
        let _server = reply_with(handle, |_| ModbusPdu::ReadExceptionStatusResponse { value: 0 });
        assert!(matches!(
            client.read_coils(0, 8).await,
            Err(ClientError::UnexpectedResponse)
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (client, _handle) = client().await;
        let client = Arc::try_unwrap(client)
            .ok()
            .unwrap()
            .with_response_timeout(Duration::from_millis(20));
        let err = client.read_exception_status().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn coil_writes_pack_lsb_first() {
        let (client, handle) = client().await;
        let server = reply_with(handle, |_| ModbusPdu::WriteMultipleCoilsResponse {
            start: 20,
            quantity: 10,
        });
        let states = [true, false, true, true, false, false, true, true, true, false];
        client.write_multiple_coils(20, &states).await.unwrap();
        assert_eq!(
            server.await.unwrap(),
            ModbusPdu::WriteMultipleCoilsRequest {
                start: 20,
                quantity: 10,
                values: vec![0xCD, 0x01],
            }
        );
    }

    #[tokio::test]
    async fn typed_reads_reject_oversized_counts() {
        let (client, handle) = client().await;
        let err = client
            .read_holding_typed(0, PrimitiveType::Float64, 20000)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Encode(EncodeError::ValueOutOfRange)));
        assert!(handle.take_sent().is_empty());
    }
}
