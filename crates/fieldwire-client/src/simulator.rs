//! Lightweight simulated Modbus TCP server.
//!
//! [`ModbusSimulator`] answers register and coil requests from an in-memory
//! [`DataStore`] on any [`Transport`]. Useful for testing and development
//! without physical hardware.

use crate::engine::{Engine, EngineConfig, EngineState, OverflowPolicy};
use crate::protocol::ModbusTcp;
use crate::{ClientError, EngineError};
use fieldwire_core::modbus::pdu::{COIL_OFF, COIL_ON};
use fieldwire_core::modbus::{pack_coils, unpack_coils, ExceptionCode, ModbusPdu, TcpAdu};
use fieldwire_transport::Transport;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::RwLock;

const MAX_READ_BITS: u16 = 2000;
const MAX_WRITE_BITS: u16 = 1968;
const MAX_READ_REGISTERS: u16 = 125;
const MAX_WRITE_REGISTERS: u16 = 123;
const MAX_RW_WRITE_REGISTERS: u16 = 121;

/// The four Modbus data tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataStore {
    pub coils: Vec<bool>,
    pub discrete_inputs: Vec<bool>,
    pub holding_registers: Vec<u16>,
    pub input_registers: Vec<u16>,
}

impl DataStore {
    /// Zeroed tables: `bits` coils and discrete inputs, `registers`
    /// holding and input registers.
    pub fn with_sizes(bits: usize, registers: usize) -> Self {
        Self {
            coils: vec![false; bits],
            discrete_inputs: vec![false; bits],
            holding_registers: vec![0; registers],
            input_registers: vec![0; registers],
        }
    }

    /// Applies one request and builds its response. Out-of-range access
    /// yields `IllegalDataAddress`, bad quantities `IllegalDataValue`, and
    /// unsupported function codes `IllegalFunction`.
    pub fn respond(&mut self, request: &ModbusPdu) -> ModbusPdu {
        let function_code = request.function_code();
        self.apply(request)
            .unwrap_or_else(|exception| ModbusPdu::Exception {
                function_code,
                exception,
            })
    }

    fn apply(&mut self, request: &ModbusPdu) -> Result<ModbusPdu, ExceptionCode> {
        Ok(match *request {
            ModbusPdu::ReadCoilsRequest { start, quantity } => {
                let range = span(start, quantity, MAX_READ_BITS, self.coils.len())?;
                ModbusPdu::ReadCoilsResponse {
                    values: pack_coils(&self.coils[range]),
                }
            }
            ModbusPdu::ReadDiscreteInputsRequest { start, quantity } => {
                let range = span(start, quantity, MAX_READ_BITS, self.discrete_inputs.len())?;
                ModbusPdu::ReadDiscreteInputsResponse {
                    values: pack_coils(&self.discrete_inputs[range]),
                }
            }
            ModbusPdu::ReadHoldingRegistersRequest { start, quantity } => {
                let table_len = self.holding_registers.len();
                let range = span(start, quantity, MAX_READ_REGISTERS, table_len)?;
                ModbusPdu::ReadHoldingRegistersResponse {
                    values: register_bytes(&self.holding_registers[range]),
                }
            }
            ModbusPdu::ReadInputRegistersRequest { start, quantity } => {
                let range = span(start, quantity, MAX_READ_REGISTERS, self.input_registers.len())?;
                ModbusPdu::ReadInputRegistersResponse {
                    values: register_bytes(&self.input_registers[range]),
                }
            }
            ModbusPdu::WriteSingleCoilRequest { address, value } => {
                let on = match value {
                    COIL_ON => true,
                    COIL_OFF => false,
                    _ => return Err(ExceptionCode::IllegalDataValue),
                };
                let range = span(address, 1, 1, self.coils.len())?;
                self.coils[range.start] = on;
                ModbusPdu::WriteSingleCoilResponse { address, value }
            }
            ModbusPdu::WriteSingleRegisterRequest { address, value } => {
                let range = span(address, 1, 1, self.holding_registers.len())?;
                self.holding_registers[range.start] = value;
                ModbusPdu::WriteSingleRegisterResponse { address, value }
            }
            ModbusPdu::WriteMultipleCoilsRequest {
                start,
                quantity,
                ref values,
            } => {
                if values.len() != usize::from(quantity).div_ceil(8) {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let range = span(start, quantity, MAX_WRITE_BITS, self.coils.len())?;
                self.coils[range].copy_from_slice(&unpack_coils(values, quantity.into()));
                ModbusPdu::WriteMultipleCoilsResponse { start, quantity }
            }
            ModbusPdu::WriteMultipleRegistersRequest {
                start,
                quantity,
                ref values,
            } => {
                if values.len() != usize::from(quantity) * 2 {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let table_len = self.holding_registers.len();
                let range = span(start, quantity, MAX_WRITE_REGISTERS, table_len)?;
                self.holding_registers[range].copy_from_slice(&registers(values));
                ModbusPdu::WriteMultipleRegistersResponse { start, quantity }
            }
            ModbusPdu::MaskWriteRegisterRequest {
                address,
                and_mask,
                or_mask,
            } => {
                let range = span(address, 1, 1, self.holding_registers.len())?;
                let current = self.holding_registers[range.start];
                self.holding_registers[range.start] = (current & and_mask) | (or_mask & !and_mask);
                ModbusPdu::MaskWriteRegisterResponse {
                    address,
                    and_mask,
                    or_mask,
                }
            }
            ModbusPdu::ReadWriteMultipleRegistersRequest {
                read_start,
                read_quantity,
                write_start,
                write_quantity,
                ref values,
            } => {
                if values.len() != usize::from(write_quantity) * 2 {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let len = self.holding_registers.len();
                let write = span(write_start, write_quantity, MAX_RW_WRITE_REGISTERS, len)?;
                let read = span(read_start, read_quantity, MAX_READ_REGISTERS, len)?;
                // Writes happen before the read.
                self.holding_registers[write].copy_from_slice(&registers(values));
                ModbusPdu::ReadWriteMultipleRegistersResponse {
                    values: register_bytes(&self.holding_registers[read]),
                }
            }
            ModbusPdu::ReadExceptionStatusRequest => {
                ModbusPdu::ReadExceptionStatusResponse { value: 0 }
            }
            _ => return Err(ExceptionCode::IllegalFunction),
        })
    }
}

/// Validates a quantity and an address range against a table.
fn span(
    start: u16,
    quantity: u16,
    max_quantity: u16,
    table_len: usize,
) -> Result<Range<usize>, ExceptionCode> {
    if quantity == 0 || quantity > max_quantity {
        return Err(ExceptionCode::IllegalDataValue);
    }
    let start = usize::from(start);
    let end = start + usize::from(quantity);
    if end > table_len {
        return Err(ExceptionCode::IllegalDataAddress);
    }
    Ok(start..end)
}

fn register_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn registers(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// A simulated Modbus TCP server on one connection.
pub struct ModbusSimulator<T: Transport> {
    engine: Engine<T, ModbusTcp>,
    unit_id: Option<u8>,
    store: Arc<RwLock<DataStore>>,
}

impl<T: Transport> ModbusSimulator<T> {
    pub fn new(transport: T, store: DataStore) -> Self {
        Self::with_store(transport, Arc::new(RwLock::new(store)))
    }

    /// Serves a store shared with other connections.
    pub fn with_store(transport: T, store: Arc<RwLock<DataStore>>) -> Self {
        let config = EngineConfig::default().with_overflow_policy(OverflowPolicy::Block);
        Self {
            engine: Engine::new(transport, ModbusTcp::server(), config),
            unit_id: None,
            store,
        }
    }

    /// Answers only this unit id (and broadcast unit 0). By default every
    /// unit id is answered.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn store(&self) -> Arc<RwLock<DataStore>> {
        self.store.clone()
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        Ok(self.engine.close().await?)
    }

    /// Runs the server loop until the connection closes.
    pub async fn run(&self) -> Result<(), ClientError> {
        self.engine.connect().await?;
        let mut requests = self
            .engine
            .default_channel()
            .ok_or(ClientError::Engine(EngineError::NotRunning))?;
        let mut states = self.engine.subscribe_state();
        loop {
            let state = *states.borrow_and_update();
            if state == EngineState::Closed {
                break;
            }
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        if let Err(e) = self.handle_request(request).await {
                            log::debug!("simulator: error handling request: {e}");
                        }
                    }
                    None => break,
                },
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        log::debug!("simulator: connection closed");
        Ok(())
    }

    async fn handle_request(&self, request: TcpAdu) -> Result<(), ClientError> {
        if let Some(unit_id) = self.unit_id {
            if request.unit_id != unit_id && request.unit_id != 0 {
                log::debug!("simulator: ignoring request for unit {}", request.unit_id);
                return Ok(());
            }
        }
        let pdu = self.store.write().await.respond(&request.pdu);
        if request.unit_id == 0 {
            // Broadcasts are applied but never answered.
            return Ok(());
        }
        let response = TcpAdu::new(request.transaction_id, request.unit_id, pdu);
        self.engine.send_unmatched(&response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_writes_registers() {
        let mut store = DataStore::with_sizes(16, 16);
        assert_eq!(
            store.respond(&ModbusPdu::WriteSingleRegisterRequest {
                address: 10,
                value: 500
            }),
            ModbusPdu::WriteSingleRegisterResponse {
                address: 10,
                value: 500
            }
        );
        assert_eq!(
            store.respond(&ModbusPdu::ReadHoldingRegistersRequest {
                start: 10,
                quantity: 2
            }),
            ModbusPdu::ReadHoldingRegistersResponse {
                values: vec![0x01, 0xF4, 0x00, 0x00]
            }
        );
    }

    #[test]
    fn out_of_range_access_is_an_address_exception() {
        let mut store = DataStore::with_sizes(8, 8);
        assert_eq!(
            store.respond(&ModbusPdu::ReadHoldingRegistersRequest {
                start: 7,
                quantity: 2
            }),
            ModbusPdu::Exception {
                function_code: 0x03,
                exception: ExceptionCode::IllegalDataAddress
            }
        );
        assert_eq!(
            store.respond(&ModbusPdu::ReadCoilsRequest {
                start: 0,
                quantity: 0
            }),
            ModbusPdu::Exception {
                function_code: 0x01,
                exception: ExceptionCode::IllegalDataValue
            }
        );
    }

    #[test]
    fn unsupported_functions_are_illegal() {
        let mut store = DataStore::with_sizes(8, 8);
        assert_eq!(
            store.respond(&ModbusPdu::ReportServerIdRequest),
            ModbusPdu::Exception {
                function_code: 0x11,
                exception: ExceptionCode::IllegalFunction
            }
        );
    }

    #[test]
    fn mask_write_combines_masks() {
        let mut store = DataStore::with_sizes(0, 4);
        store.holding_registers[3] = 0x0012;
        store.respond(&ModbusPdu::MaskWriteRegisterRequest {
            address: 3,
            and_mask: 0x00F2,
            or_mask: 0x0025,
        });
        assert_eq!(store.holding_registers[3], 0x0017);
    }

    #[test]
    fn coil_writes_unpack_lsb_first() {
        let mut store = DataStore::with_sizes(16, 0);
        store.respond(&ModbusPdu::WriteMultipleCoilsRequest {
            start: 2,
            quantity: 10,
            values: vec![0xCD, 0x01],
        });
        assert_eq!(
            &store.coils[2..12],
            &[true, false, true, true, false, false, true, true, true, false]
        );
        assert!(!store.coils[0] && !store.coils[12]);
    }
}
