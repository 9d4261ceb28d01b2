use fieldwire_core::encoding::reader::BitReader;
use fieldwire_core::encoding::value_codec::{decode_value_from_bytes, encode_value_to_vec};
use fieldwire_core::knxnetip::message::{ConnectionRequestInfo, STATUS_OK};
use fieldwire_core::knxnetip::{Hpai, KnxNetIpMessage, LData};
use fieldwire_core::modbus::pdu::{FileRecordRequest, COIL_ON};
use fieldwire_core::modbus::{ExceptionCode, ModbusPdu, TcpAdu};
use fieldwire_core::types::{PrimitiveType, Scalar, TypedValue};
use fieldwire_core::Direction;

#[test]
fn read_holding_request_frame_matches_fixture() {
    let adu = TcpAdu::new(
        0x0001,
        0x11,
        ModbusPdu::ReadHoldingRegistersRequest {
            start: 0x006B,
            quantity: 3,
        },
    );
    assert_eq!(
        adu.encode_to_vec().unwrap(),
        vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]
    );
}

#[test]
fn write_single_register_pdu_matches_fixture() {
    let pdu = ModbusPdu::WriteSingleRegisterRequest {
        address: 10,
        value: 500,
    };
    assert_eq!(pdu.encode_to_vec().unwrap(), vec![0x06, 0x00, 0x0A, 0x01, 0xF4]);
}

#[test]
fn write_single_coil_uses_ff00_for_on() {
    let pdu = ModbusPdu::WriteSingleCoilRequest {
        address: 0x00AC,
        value: COIL_ON,
    };
    assert_eq!(pdu.encode_to_vec().unwrap(), vec![0x05, 0x00, 0xAC, 0xFF, 0x00]);
}

#[test]
fn read_file_record_request_matches_fixture() {
    let pdu = ModbusPdu::ReadFileRecordRequest {
        items: vec![
            FileRecordRequest {
                reference_type: 6,
                file_number: 4,
                record_number: 1,
                record_length: 2,
            },
            FileRecordRequest {
                reference_type: 6,
                file_number: 3,
                record_number: 9,
                record_length: 2,
            },
        ],
    };
    assert_eq!(
        pdu.encode_to_vec().unwrap(),
        vec![
            0x14, 0x0E, 0x06, 0x00, 0x04, 0x00, 0x01, 0x00, 0x02, 0x06, 0x00, 0x03, 0x00, 0x09,
            0x00, 0x02
        ]
    );
}

#[test]
fn mask_write_register_matches_fixture() {
    let pdu = ModbusPdu::MaskWriteRegisterRequest {
        address: 0x0004,
        and_mask: 0x00F2,
        or_mask: 0x0025,
    };
    assert_eq!(
        pdu.encode_to_vec().unwrap(),
        vec![0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x25]
    );
}

#[test]
fn exception_response_decodes_regardless_of_direction() {
    let bytes = [0x00, 0x03, 0x00, 0x00, 0x00, 0x03, 0x01, 0x90, 0x04];
    let adu = TcpAdu::decode(&mut BitReader::new(&bytes), Direction::Request).unwrap();
    assert_eq!(
        adu.pdu,
        ModbusPdu::Exception {
            function_code: 0x10,
            exception: ExceptionCode::ServerDeviceFailure,
        }
    );
}

#[test]
fn holding_registers_decode_as_typed_values() {
    let adu_bytes = [
        0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14,
    ];
    let adu = TcpAdu::decode(&mut BitReader::new(&adu_bytes), Direction::Response).unwrap();
    let payload = adu.pdu.read_payload().unwrap();
    assert_eq!(
        decode_value_from_bytes(payload, PrimitiveType::UInt16, 2).unwrap(),
        TypedValue::List(vec![Scalar::UInt16(10), Scalar::UInt16(20)])
    );
    assert_eq!(
        decode_value_from_bytes(payload, PrimitiveType::Float32, 1).unwrap(),
        TypedValue::Scalar(Scalar::Float32(f32::from_bits(0x000A_0014)))
    );
}

#[test]
fn typed_value_becomes_register_payload() {
    let bytes = encode_value_to_vec(
        &TypedValue::Scalar(Scalar::Float32(21.5)),
        PrimitiveType::Float32,
        1,
    )
    .unwrap();
    let pdu = ModbusPdu::WriteMultipleRegistersRequest {
        start: 100,
        quantity: 2,
        values: bytes,
    };
    assert_eq!(
        pdu.encode_to_vec().unwrap(),
        vec![0x10, 0x00, 0x64, 0x00, 0x02, 0x04, 0x41, 0xAC, 0x00, 0x00]
    );
}

#[test]
fn knx_connect_request_matches_fixture() {
    let message = KnxNetIpMessage::ConnectRequest {
        control_endpoint: Hpai::route_back(),
        data_endpoint: Hpai::route_back(),
        cri: ConnectionRequestInfo::tunnel(),
    };
    let bytes = message.encode_to_vec().unwrap();
    assert_eq!(&bytes[..6], &[0x06, 0x10, 0x02, 0x05, 0x00, 0x1A]);
    assert_eq!(&bytes[22..], &[0x04, 0x04, 0x02, 0x00]);
}

#[test]
fn knx_tunnelled_group_write_matches_fixture() {
    let cemi = LData::group_write(0x0A03, &[0x01], true).encode_to_vec().unwrap();
    let message = KnxNetIpMessage::TunnelingRequest {
        channel_id: 0x15,
        sequence_counter: 0,
        cemi,
    };
    assert_eq!(
        message.encode_to_vec().unwrap(),
        vec![
            0x06, 0x10, 0x04, 0x20, 0x00, 0x15, 0x04, 0x15, 0x00, 0x00, 0x11, 0x00, 0xBC, 0xE0,
            0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x81
        ]
    );
    assert_eq!(
        message.acknowledgement().unwrap().encode_to_vec().unwrap(),
        vec![0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, 0x04, 0x15, 0x00, STATUS_OK]
    );
}
