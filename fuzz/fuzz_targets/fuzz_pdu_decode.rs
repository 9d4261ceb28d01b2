#![no_main]

use fieldwire_core::modbus::ModbusPdu;
use fieldwire_core::Direction;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for direction in [Direction::Request, Direction::Response] {
        if let Ok(pdu) = ModbusPdu::decode_from_bytes(data, direction) {
            // Whatever decodes must re-encode to the same bytes.
            let encoded = pdu.encode_to_vec().expect("decoded pdu re-encodes");
            assert_eq!(encoded, data);
        }
    }
});
