use crate::encoding::{reader::BitReader, writer::BitWriter};
use crate::modbus::exception::ExceptionCode;
use crate::{DecodeError, Direction, EncodeError};
use alloc::vec::Vec;

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_READ_EXCEPTION_STATUS: u8 = 0x07;
pub const FC_DIAGNOSTIC: u8 = 0x08;
pub const FC_GET_COM_EVENT_COUNTER: u8 = 0x0B;
pub const FC_GET_COM_EVENT_LOG: u8 = 0x0C;
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
pub const FC_REPORT_SERVER_ID: u8 = 0x11;
pub const FC_READ_FILE_RECORD: u8 = 0x14;
pub const FC_WRITE_FILE_RECORD: u8 = 0x15;
pub const FC_MASK_WRITE_REGISTER: u8 = 0x16;
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
pub const FC_READ_FIFO_QUEUE: u8 = 0x18;
pub const FC_ENCAPSULATED_INTERFACE: u8 = 0x2B;

/// MEI type selecting Read Device Identification under function 0x2B.
pub const MEI_READ_DEVICE_IDENTIFICATION: u8 = 0x0E;

/// Coil value for ON in write-single-coil.
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

/// One sub-request of a read-file-record request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileRecordRequest {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    pub record_length: u16,
}

/// One sub-response of a read-file-record response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileRecordData {
    pub reference_type: u8,
    pub data: Vec<u8>,
}

/// One record of a write-file-record request or its echo. The record
/// length on the wire is `data.len() / 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileRecord {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdObject {
    pub id: u8,
    pub value: Vec<u8>,
}

/// A Modbus protocol data unit: function code plus function-specific fields.
///
/// Request and response shapes for the same function code are separate
/// variants. Byte counts and other lengths that describe a payload are not
/// stored; they are recomputed from the payload when encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModbusPdu {
    /// Error-flagged response to `function_code`.
    Exception {
        function_code: u8,
        exception: ExceptionCode,
    },
    ReadCoilsRequest {
        start: u16,
        quantity: u16,
    },
    /// Coil states, packed LSB-first per byte.
    ReadCoilsResponse {
        values: Vec<u8>,
    },
    ReadDiscreteInputsRequest {
        start: u16,
        quantity: u16,
    },
    ReadDiscreteInputsResponse {
        values: Vec<u8>,
    },
    ReadHoldingRegistersRequest {
        start: u16,
        quantity: u16,
    },
    /// Raw register bytes, big-endian, two per register.
    ReadHoldingRegistersResponse {
        values: Vec<u8>,
    },
    ReadInputRegistersRequest {
        start: u16,
        quantity: u16,
    },
    ReadInputRegistersResponse {
        values: Vec<u8>,
    },
    WriteSingleCoilRequest {
        address: u16,
        value: u16,
    },
    WriteSingleCoilResponse {
        address: u16,
        value: u16,
    },
    WriteSingleRegisterRequest {
        address: u16,
        value: u16,
    },
    WriteSingleRegisterResponse {
        address: u16,
        value: u16,
    },
    ReadExceptionStatusRequest,
    ReadExceptionStatusResponse {
        value: u8,
    },
    DiagnosticRequest {
        sub_function: u16,
        data: u16,
    },
    DiagnosticResponse {
        sub_function: u16,
        data: u16,
    },
    GetComEventCounterRequest,
    GetComEventCounterResponse {
        status: u16,
        event_count: u16,
    },
    GetComEventLogRequest,
    GetComEventLogResponse {
        status: u16,
        event_count: u16,
        message_count: u16,
        events: Vec<u8>,
    },
    WriteMultipleCoilsRequest {
        start: u16,
        quantity: u16,
        values: Vec<u8>,
    },
    WriteMultipleCoilsResponse {
        start: u16,
        quantity: u16,
    },
    WriteMultipleRegistersRequest {
        start: u16,
        quantity: u16,
        values: Vec<u8>,
    },
    WriteMultipleRegistersResponse {
        start: u16,
        quantity: u16,
    },
    ReportServerIdRequest,
    ReportServerIdResponse {
        value: Vec<u8>,
    },
    ReadFileRecordRequest {
        items: Vec<FileRecordRequest>,
    },
    ReadFileRecordResponse {
        items: Vec<FileRecordData>,
    },
    WriteFileRecordRequest {
        items: Vec<FileRecord>,
    },
    WriteFileRecordResponse {
        items: Vec<FileRecord>,
    },
    MaskWriteRegisterRequest {
        address: u16,
        and_mask: u16,
        or_mask: u16,
    },
    MaskWriteRegisterResponse {
        address: u16,
        and_mask: u16,
        or_mask: u16,
    },
    ReadWriteMultipleRegistersRequest {
        read_start: u16,
        read_quantity: u16,
        write_start: u16,
        write_quantity: u16,
        values: Vec<u8>,
    },
    ReadWriteMultipleRegistersResponse {
        values: Vec<u8>,
    },
    ReadFifoQueueRequest {
        fifo_address: u16,
    },
    ReadFifoQueueResponse {
        values: Vec<u16>,
    },
    ReadDeviceIdentificationRequest {
        level: u8,
        object_id: u8,
    },
    ReadDeviceIdentificationResponse {
        level: u8,
        individual_access: bool,
        /// Seven-bit conformity level.
        conformity_level: u8,
        more_follows: u8,
        next_object_id: u8,
        objects: Vec<DeviceIdObject>,
    },
}

type ParseFn = fn(&mut BitReader<'_>) -> Result<ModbusPdu, DecodeError>;

struct VariantEntry {
    function_code: u8,
    response: bool,
    parse: ParseFn,
}

const fn entry(function_code: u8, response: bool, parse: ParseFn) -> VariantEntry {
    VariantEntry {
        function_code,
        response,
        parse,
    }
}

/// Non-error variants keyed by `(function code, response)`.
static VARIANTS: &[VariantEntry] = &[
    entry(FC_READ_COILS, false, parse_read_coils_request),
    entry(FC_READ_COILS, true, parse_read_coils_response),
    entry(FC_READ_DISCRETE_INPUTS, false, parse_read_discrete_inputs_request),
    entry(FC_READ_DISCRETE_INPUTS, true, parse_read_discrete_inputs_response),
    entry(FC_READ_HOLDING_REGISTERS, false, parse_read_holding_request),
    entry(FC_READ_HOLDING_REGISTERS, true, parse_read_holding_response),
    entry(FC_READ_INPUT_REGISTERS, false, parse_read_input_request),
    entry(FC_READ_INPUT_REGISTERS, true, parse_read_input_response),
    entry(FC_WRITE_SINGLE_COIL, false, parse_write_single_coil_request),
    entry(FC_WRITE_SINGLE_COIL, true, parse_write_single_coil_response),
    entry(FC_WRITE_SINGLE_REGISTER, false, parse_write_single_register_request),
    entry(FC_WRITE_SINGLE_REGISTER, true, parse_write_single_register_response),
    entry(FC_READ_EXCEPTION_STATUS, false, parse_read_exception_status_request),
    entry(FC_READ_EXCEPTION_STATUS, true, parse_read_exception_status_response),
    entry(FC_DIAGNOSTIC, false, parse_diagnostic_request),
    entry(FC_DIAGNOSTIC, true, parse_diagnostic_response),
    entry(FC_GET_COM_EVENT_COUNTER, false, parse_com_event_counter_request),
    entry(FC_GET_COM_EVENT_COUNTER, true, parse_com_event_counter_response),
    entry(FC_GET_COM_EVENT_LOG, false, parse_com_event_log_request),
    entry(FC_GET_COM_EVENT_LOG, true, parse_com_event_log_response),
    entry(FC_WRITE_MULTIPLE_COILS, false, parse_write_multiple_coils_request),
    entry(FC_WRITE_MULTIPLE_COILS, true, parse_write_multiple_coils_response),
    entry(FC_WRITE_MULTIPLE_REGISTERS, false, parse_write_multiple_registers_request),
    entry(FC_WRITE_MULTIPLE_REGISTERS, true, parse_write_multiple_registers_response),
    entry(FC_REPORT_SERVER_ID, false, parse_report_server_id_request),
    entry(FC_REPORT_SERVER_ID, true, parse_report_server_id_response),
    entry(FC_READ_FILE_RECORD, false, parse_read_file_record_request),
    entry(FC_READ_FILE_RECORD, true, parse_read_file_record_response),
    entry(FC_WRITE_FILE_RECORD, false, parse_write_file_record_request),
    entry(FC_WRITE_FILE_RECORD, true, parse_write_file_record_response),
    entry(FC_MASK_WRITE_REGISTER, false, parse_mask_write_request),
    entry(FC_MASK_WRITE_REGISTER, true, parse_mask_write_response),
    entry(FC_READ_WRITE_MULTIPLE_REGISTERS, false, parse_read_write_request),
    entry(FC_READ_WRITE_MULTIPLE_REGISTERS, true, parse_read_write_response),
    entry(FC_READ_FIFO_QUEUE, false, parse_fifo_request),
    entry(FC_READ_FIFO_QUEUE, true, parse_fifo_response),
    entry(FC_ENCAPSULATED_INTERFACE, false, parse_device_id_request),
    entry(FC_ENCAPSULATED_INTERFACE, true, parse_device_id_response),
];

fn lookup(function_code: u8, response: bool) -> Option<&'static VariantEntry> {
    VARIANTS
        .iter()
        .find(|v| v.function_code == function_code && v.response == response)
}

/// Whether a non-error variant exists for `function_code` in `direction`.
pub fn is_supported(function_code: u8, direction: Direction) -> bool {
    lookup(function_code, direction.is_response()).is_some()
}

impl ModbusPdu {
    /// The 7-bit function code. For [`ModbusPdu::Exception`] this is the code
    /// of the failed request, without the error flag.
    pub fn function_code(&self) -> u8 {
        match self {
            Self::Exception { function_code, .. } => *function_code,
            Self::ReadCoilsRequest { .. } | Self::ReadCoilsResponse { .. } => FC_READ_COILS,
            Self::ReadDiscreteInputsRequest { .. } | Self::ReadDiscreteInputsResponse { .. } => {
                FC_READ_DISCRETE_INPUTS
            }
            Self::ReadHoldingRegistersRequest { .. }
            | Self::ReadHoldingRegistersResponse { .. } => FC_READ_HOLDING_REGISTERS,
            Self::ReadInputRegistersRequest { .. } | Self::ReadInputRegistersResponse { .. } => {
                FC_READ_INPUT_REGISTERS
            }
            Self::WriteSingleCoilRequest { .. } | Self::WriteSingleCoilResponse { .. } => {
                FC_WRITE_SINGLE_COIL
            }
            Self::WriteSingleRegisterRequest { .. } | Self::WriteSingleRegisterResponse { .. } => {
                FC_WRITE_SINGLE_REGISTER
            }
            Self::ReadExceptionStatusRequest | Self::ReadExceptionStatusResponse { .. } => {
                FC_READ_EXCEPTION_STATUS
            }
            Self::DiagnosticRequest { .. } | Self::DiagnosticResponse { .. } => FC_DIAGNOSTIC,
            Self::GetComEventCounterRequest | Self::GetComEventCounterResponse { .. } => {
                FC_GET_COM_EVENT_COUNTER
            }
            Self::GetComEventLogRequest | Self::GetComEventLogResponse { .. } => {
                FC_GET_COM_EVENT_LOG
            }
            Self::WriteMultipleCoilsRequest { .. } | Self::WriteMultipleCoilsResponse { .. } => {
                FC_WRITE_MULTIPLE_COILS
            }
            Self::WriteMultipleRegistersRequest { .. }
            | Self::WriteMultipleRegistersResponse { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Self::ReportServerIdRequest | Self::ReportServerIdResponse { .. } => {
                FC_REPORT_SERVER_ID
            }
            Self::ReadFileRecordRequest { .. } | Self::ReadFileRecordResponse { .. } => {
                FC_READ_FILE_RECORD
            }
            Self::WriteFileRecordRequest { .. } | Self::WriteFileRecordResponse { .. } => {
                FC_WRITE_FILE_RECORD
            }
            Self::MaskWriteRegisterRequest { .. } | Self::MaskWriteRegisterResponse { .. } => {
                FC_MASK_WRITE_REGISTER
            }
            Self::ReadWriteMultipleRegistersRequest { .. }
            | Self::ReadWriteMultipleRegistersResponse { .. } => FC_READ_WRITE_MULTIPLE_REGISTERS,
            Self::ReadFifoQueueRequest { .. } | Self::ReadFifoQueueResponse { .. } => {
                FC_READ_FIFO_QUEUE
            }
            Self::ReadDeviceIdentificationRequest { .. }
            | Self::ReadDeviceIdentificationResponse { .. } => FC_ENCAPSULATED_INTERFACE,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }

    /// Which side of the exchange this variant belongs to.
    pub fn direction(&self) -> Direction {
        match self {
            Self::ReadCoilsRequest { .. }
            | Self::ReadDiscreteInputsRequest { .. }
            | Self::ReadHoldingRegistersRequest { .. }
            | Self::ReadInputRegistersRequest { .. }
            | Self::WriteSingleCoilRequest { .. }
            | Self::WriteSingleRegisterRequest { .. }
            | Self::ReadExceptionStatusRequest
            | Self::DiagnosticRequest { .. }
            | Self::GetComEventCounterRequest
            | Self::GetComEventLogRequest
            | Self::WriteMultipleCoilsRequest { .. }
            | Self::WriteMultipleRegistersRequest { .. }
            | Self::ReportServerIdRequest
            | Self::ReadFileRecordRequest { .. }
            | Self::WriteFileRecordRequest { .. }
            | Self::MaskWriteRegisterRequest { .. }
            | Self::ReadWriteMultipleRegistersRequest { .. }
            | Self::ReadFifoQueueRequest { .. }
            | Self::ReadDeviceIdentificationRequest { .. } => Direction::Request,
            _ => Direction::Response,
        }
    }

    /// The raw data bytes of a read response, if this is one.
    pub fn read_payload(&self) -> Option<&[u8]> {
        match self {
            Self::ReadCoilsResponse { values }
            | Self::ReadDiscreteInputsResponse { values }
            | Self::ReadHoldingRegistersResponse { values }
            | Self::ReadInputRegistersResponse { values }
            | Self::ReadWriteMultipleRegistersResponse { values } => Some(values),
            _ => None,
        }
    }

    /// Decodes one PDU. An error-flagged header always yields
    /// [`ModbusPdu::Exception`], whatever `direction` says.
    ///
    /// On error the cursor is left where it was.
    pub fn decode(r: &mut BitReader<'_>, direction: Direction) -> Result<Self, DecodeError> {
        let mut cursor = *r;
        let error = cursor.read_bit()?;
        let function_code = cursor.read_uint(7)? as u8;

        let pdu = if error {
            Self::Exception {
                function_code,
                exception: ExceptionCode::from_u8(cursor.read_u8()?),
            }
        } else {
            let variant = lookup(function_code, direction.is_response()).ok_or(
                DecodeError::UnknownDiscriminator {
                    code: u16::from(function_code),
                    response: direction.is_response(),
                },
            )?;
            (variant.parse)(&mut cursor)?
        };
        *r = cursor;
        Ok(pdu)
    }

    /// Decodes a PDU that must fill `bytes` exactly.
    pub fn decode_from_bytes(bytes: &[u8], direction: Direction) -> Result<Self, DecodeError> {
        let mut r = BitReader::new(bytes);
        let pdu = Self::decode(&mut r, direction)?;
        if !r.is_empty() {
            return Err(DecodeError::InvalidLength);
        }
        Ok(pdu)
    }

    pub fn encode(&self, w: &mut BitWriter) -> Result<(), EncodeError> {
        w.write_bit(self.is_exception())?;
        w.write_uint(7, u64::from(self.function_code()))?;

        match self {
            Self::Exception { exception, .. } => w.write_u8(exception.to_u8()),
            Self::ReadCoilsRequest { start, quantity }
            | Self::ReadDiscreteInputsRequest { start, quantity }
            | Self::ReadHoldingRegistersRequest { start, quantity }
            | Self::ReadInputRegistersRequest { start, quantity }
            | Self::WriteMultipleCoilsResponse { start, quantity }
            | Self::WriteMultipleRegistersResponse { start, quantity } => {
                write_pair(w, *start, *quantity)
            }
            Self::ReadCoilsResponse { values }
            | Self::ReadDiscreteInputsResponse { values }
            | Self::ReadHoldingRegistersResponse { values }
            | Self::ReadInputRegistersResponse { values }
            | Self::ReportServerIdResponse { value: values }
            | Self::ReadWriteMultipleRegistersResponse { values } => write_counted(w, values),
            Self::WriteSingleCoilRequest { address, value }
            | Self::WriteSingleCoilResponse { address, value }
            | Self::WriteSingleRegisterRequest { address, value }
            | Self::WriteSingleRegisterResponse { address, value } => {
                write_pair(w, *address, *value)
            }
            Self::DiagnosticRequest { sub_function, data }
            | Self::DiagnosticResponse { sub_function, data } => {
                write_pair(w, *sub_function, *data)
            }
            Self::ReadExceptionStatusRequest
            | Self::GetComEventCounterRequest
            | Self::GetComEventLogRequest
            | Self::ReportServerIdRequest => Ok(()),
            Self::ReadExceptionStatusResponse { value } => w.write_u8(*value),
            Self::GetComEventCounterResponse {
                status,
                event_count,
            } => write_pair(w, *status, *event_count),
            Self::GetComEventLogResponse {
                status,
                event_count,
                message_count,
                events,
            } => {
                w.write_u8(count_u8(events.len() + 6)?)?;
                w.write_be_u16(*status)?;
                w.write_be_u16(*event_count)?;
                w.write_be_u16(*message_count)?;
                w.write_all(events)
            }
            Self::WriteMultipleCoilsRequest {
                start,
                quantity,
                values,
            }
            | Self::WriteMultipleRegistersRequest {
                start,
                quantity,
                values,
            } => {
                write_pair(w, *start, *quantity)?;
                write_counted(w, values)
            }
            Self::ReadFileRecordRequest { items } => {
                w.write_u8(count_u8(items.len() * 7)?)?;
                for item in items {
                    w.write_u8(item.reference_type)?;
                    w.write_be_u16(item.file_number)?;
                    w.write_be_u16(item.record_number)?;
                    w.write_be_u16(item.record_length)?;
                }
                Ok(())
            }
            Self::ReadFileRecordResponse { items } => {
                let total: usize = items.iter().map(|i| i.data.len() + 2).sum();
                w.write_u8(count_u8(total)?)?;
                for item in items {
                    w.write_u8(count_u8(item.data.len() + 1)?)?;
                    w.write_u8(item.reference_type)?;
                    w.write_all(&item.data)?;
                }
                Ok(())
            }
            Self::WriteFileRecordRequest { items } | Self::WriteFileRecordResponse { items } => {
                let total: usize = items.iter().map(|i| i.data.len() + 7).sum();
                w.write_u8(count_u8(total)?)?;
                for item in items {
                    if item.data.len() % 2 != 0 {
                        return Err(EncodeError::InvalidLength);
                    }
                    w.write_u8(item.reference_type)?;
                    w.write_be_u16(item.file_number)?;
                    w.write_be_u16(item.record_number)?;
                    w.write_be_u16(count_u16(item.data.len() / 2)?)?;
                    w.write_all(&item.data)?;
                }
                Ok(())
            }
            Self::MaskWriteRegisterRequest {
                address,
                and_mask,
                or_mask,
            }
            | Self::MaskWriteRegisterResponse {
                address,
                and_mask,
                or_mask,
            } => {
                w.write_be_u16(*address)?;
                w.write_be_u16(*and_mask)?;
                w.write_be_u16(*or_mask)
            }
            Self::ReadWriteMultipleRegistersRequest {
                read_start,
                read_quantity,
                write_start,
                write_quantity,
                values,
            } => {
                write_pair(w, *read_start, *read_quantity)?;
                write_pair(w, *write_start, *write_quantity)?;
                write_counted(w, values)
            }
            Self::ReadFifoQueueRequest { fifo_address } => w.write_be_u16(*fifo_address),
            Self::ReadFifoQueueResponse { values } => {
                w.write_be_u16(count_u16(values.len() * 2 + 2)?)?;
                w.write_be_u16(count_u16(values.len())?)?;
                values.iter().try_for_each(|v| w.write_be_u16(*v))
            }
            Self::ReadDeviceIdentificationRequest { level, object_id } => {
                w.write_u8(MEI_READ_DEVICE_IDENTIFICATION)?;
                w.write_u8(*level)?;
                w.write_u8(*object_id)
            }
            Self::ReadDeviceIdentificationResponse {
                level,
                individual_access,
                conformity_level,
                more_follows,
                next_object_id,
                objects,
            } => {
                w.write_u8(MEI_READ_DEVICE_IDENTIFICATION)?;
                w.write_u8(*level)?;
                w.write_bit(*individual_access)?;
                w.write_uint(7, u64::from(*conformity_level))?;
                w.write_u8(*more_follows)?;
                w.write_u8(*next_object_id)?;
                w.write_u8(count_u8(objects.len())?)?;
                for object in objects {
                    w.write_u8(object.id)?;
                    write_counted(w, &object.value)?;
                }
                Ok(())
            }
        }
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = BitWriter::with_capacity(8);
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }
}

fn count_u8(len: usize) -> Result<u8, EncodeError> {
    u8::try_from(len).map_err(|_| EncodeError::InvalidLength)
}

fn count_u16(len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::InvalidLength)
}

fn write_pair(w: &mut BitWriter, a: u16, b: u16) -> Result<(), EncodeError> {
    w.write_be_u16(a)?;
    w.write_be_u16(b)
}

fn write_counted(w: &mut BitWriter, bytes: &[u8]) -> Result<(), EncodeError> {
    w.write_u8(count_u8(bytes.len())?)?;
    w.write_all(bytes)
}

fn read_pair(r: &mut BitReader<'_>) -> Result<(u16, u16), DecodeError> {
    Ok((r.read_be_u16()?, r.read_be_u16()?))
}

fn read_counted(r: &mut BitReader<'_>) -> Result<Vec<u8>, DecodeError> {
    let count = r.read_u8()? as usize;
    r.read_bytes(count)
}

/// Reads a u8 byte count and returns a cursor over exactly that many bytes.
/// Running short inside the counted region is a length error, not truncation.
fn counted_section<'a>(r: &mut BitReader<'a>) -> Result<BitReader<'a>, DecodeError> {
    let count = r.read_u8()? as usize;
    Ok(BitReader::new(r.read_exact(count)?))
}

fn within_section<T>(result: Result<T, DecodeError>) -> Result<T, DecodeError> {
    result.map_err(|e| match e {
        DecodeError::Truncated => DecodeError::InvalidLength,
        other => other,
    })
}

fn parse_read_coils_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::ReadCoilsRequest { start, quantity })
}

fn parse_read_coils_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadCoilsResponse {
        values: read_counted(r)?,
    })
}

fn parse_read_discrete_inputs_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::ReadDiscreteInputsRequest { start, quantity })
}

fn parse_read_discrete_inputs_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadDiscreteInputsResponse {
        values: read_counted(r)?,
    })
}

fn parse_read_holding_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::ReadHoldingRegistersRequest { start, quantity })
}

fn parse_read_holding_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadHoldingRegistersResponse {
        values: read_counted(r)?,
    })
}

fn parse_read_input_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::ReadInputRegistersRequest { start, quantity })
}

fn parse_read_input_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadInputRegistersResponse {
        values: read_counted(r)?,
    })
}

fn parse_write_single_coil_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (address, value) = read_pair(r)?;
    Ok(ModbusPdu::WriteSingleCoilRequest { address, value })
}

fn parse_write_single_coil_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (address, value) = read_pair(r)?;
    Ok(ModbusPdu::WriteSingleCoilResponse { address, value })
}

fn parse_write_single_register_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (address, value) = read_pair(r)?;
    Ok(ModbusPdu::WriteSingleRegisterRequest { address, value })
}

fn parse_write_single_register_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (address, value) = read_pair(r)?;
    Ok(ModbusPdu::WriteSingleRegisterResponse { address, value })
}

fn parse_read_exception_status_request(_: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadExceptionStatusRequest)
}

fn parse_com_event_counter_request(_: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::GetComEventCounterRequest)
}

fn parse_com_event_log_request(_: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::GetComEventLogRequest)
}

fn parse_report_server_id_request(_: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReportServerIdRequest)
}

fn parse_read_exception_status_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadExceptionStatusResponse {
        value: r.read_u8()?,
    })
}

fn parse_diagnostic_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (sub_function, data) = read_pair(r)?;
    Ok(ModbusPdu::DiagnosticRequest { sub_function, data })
}

fn parse_diagnostic_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (sub_function, data) = read_pair(r)?;
    Ok(ModbusPdu::DiagnosticResponse { sub_function, data })
}

fn parse_com_event_counter_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (status, event_count) = read_pair(r)?;
    Ok(ModbusPdu::GetComEventCounterResponse {
        status,
        event_count,
    })
}

fn parse_com_event_log_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let mut section = counted_section(r)?;
    within_section(read_com_event_log(&mut section))
}

fn read_com_event_log(s: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let status = s.read_be_u16()?;
    let event_count = s.read_be_u16()?;
    let message_count = s.read_be_u16()?;
    let events = s.read_bytes(s.remaining())?;
    Ok(ModbusPdu::GetComEventLogResponse {
        status,
        event_count,
        message_count,
        events,
    })
}

fn parse_write_multiple_coils_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::WriteMultipleCoilsRequest {
        start,
        quantity,
        values: read_counted(r)?,
    })
}

fn parse_write_multiple_coils_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::WriteMultipleCoilsResponse { start, quantity })
}

fn parse_write_multiple_registers_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::WriteMultipleRegistersRequest {
        start,
        quantity,
        values: read_counted(r)?,
    })
}

fn parse_write_multiple_registers_response(
    r: &mut BitReader<'_>,
) -> Result<ModbusPdu, DecodeError> {
    let (start, quantity) = read_pair(r)?;
    Ok(ModbusPdu::WriteMultipleRegistersResponse { start, quantity })
}

fn parse_report_server_id_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReportServerIdResponse {
        value: read_counted(r)?,
    })
}

fn parse_read_file_record_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let mut section = counted_section(r)?;
    let mut items = Vec::new();
    while !section.is_empty() {
        items.push(within_section(read_file_record_request(&mut section))?);
    }
    Ok(ModbusPdu::ReadFileRecordRequest { items })
}

fn read_file_record_request(s: &mut BitReader<'_>) -> Result<FileRecordRequest, DecodeError> {
    Ok(FileRecordRequest {
        reference_type: s.read_u8()?,
        file_number: s.read_be_u16()?,
        record_number: s.read_be_u16()?,
        record_length: s.read_be_u16()?,
    })
}

fn parse_read_file_record_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let mut section = counted_section(r)?;
    let mut items = Vec::new();
    while !section.is_empty() {
        items.push(within_section(read_file_record_data(&mut section))?);
    }
    Ok(ModbusPdu::ReadFileRecordResponse { items })
}

fn read_file_record_data(s: &mut BitReader<'_>) -> Result<FileRecordData, DecodeError> {
    // Sub-response length counts the reference type byte.
    let len = s.read_u8()? as usize;
    if len == 0 {
        return Err(DecodeError::InvalidLength);
    }
    Ok(FileRecordData {
        reference_type: s.read_u8()?,
        data: s.read_bytes(len - 1)?,
    })
}

fn parse_file_records(r: &mut BitReader<'_>) -> Result<Vec<FileRecord>, DecodeError> {
    let mut section = counted_section(r)?;
    let mut items = Vec::new();
    while !section.is_empty() {
        items.push(within_section(read_file_record(&mut section))?);
    }
    Ok(items)
}

fn read_file_record(s: &mut BitReader<'_>) -> Result<FileRecord, DecodeError> {
    let reference_type = s.read_u8()?;
    let file_number = s.read_be_u16()?;
    let record_number = s.read_be_u16()?;
    let record_length = s.read_be_u16()? as usize;
    Ok(FileRecord {
        reference_type,
        file_number,
        record_number,
        data: s.read_bytes(record_length * 2)?,
    })
}

fn parse_write_file_record_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::WriteFileRecordRequest {
        items: parse_file_records(r)?,
    })
}

fn parse_write_file_record_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::WriteFileRecordResponse {
        items: parse_file_records(r)?,
    })
}

fn parse_mask_write_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let address = r.read_be_u16()?;
    let (and_mask, or_mask) = read_pair(r)?;
    Ok(ModbusPdu::MaskWriteRegisterRequest {
        address,
        and_mask,
        or_mask,
    })
}

fn parse_mask_write_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let address = r.read_be_u16()?;
    let (and_mask, or_mask) = read_pair(r)?;
    Ok(ModbusPdu::MaskWriteRegisterResponse {
        address,
        and_mask,
        or_mask,
    })
}

fn parse_read_write_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (read_start, read_quantity) = read_pair(r)?;
    let (write_start, write_quantity) = read_pair(r)?;
    Ok(ModbusPdu::ReadWriteMultipleRegistersRequest {
        read_start,
        read_quantity,
        write_start,
        write_quantity,
        values: read_counted(r)?,
    })
}

fn parse_read_write_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadWriteMultipleRegistersResponse {
        values: read_counted(r)?,
    })
}

fn parse_fifo_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    Ok(ModbusPdu::ReadFifoQueueRequest {
        fifo_address: r.read_be_u16()?,
    })
}

fn parse_fifo_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    let (byte_count, fifo_count) = read_pair(r)?;
    if usize::from(byte_count) != usize::from(fifo_count) * 2 + 2 {
        return Err(DecodeError::InvalidLength);
    }
    let values = (0..fifo_count)
        .map(|_| r.read_be_u16())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ModbusPdu::ReadFifoQueueResponse { values })
}

fn read_mei_type(r: &mut BitReader<'_>) -> Result<(), DecodeError> {
    let mei = r.read_u8()?;
    if mei != MEI_READ_DEVICE_IDENTIFICATION {
        return Err(DecodeError::ConstantMismatch {
            expected: u16::from(MEI_READ_DEVICE_IDENTIFICATION),
            actual: u16::from(mei),
        });
    }
    Ok(())
}

fn parse_device_id_request(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    read_mei_type(r)?;
    Ok(ModbusPdu::ReadDeviceIdentificationRequest {
        level: r.read_u8()?,
        object_id: r.read_u8()?,
    })
}

fn parse_device_id_response(r: &mut BitReader<'_>) -> Result<ModbusPdu, DecodeError> {
    read_mei_type(r)?;
    let level = r.read_u8()?;
    let individual_access = r.read_bit()?;
    let conformity_level = r.read_uint(7)? as u8;
    let more_follows = r.read_u8()?;
    let next_object_id = r.read_u8()?;
    let count = r.read_u8()?;
    let mut objects = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let id = r.read_u8()?;
        objects.push(DeviceIdObject {
            id,
            value: read_counted(r)?,
        });
    }
    Ok(ModbusPdu::ReadDeviceIdentificationResponse {
        level,
        individual_access,
        conformity_level,
        more_follows,
        next_object_id,
        objects,
    })
}
