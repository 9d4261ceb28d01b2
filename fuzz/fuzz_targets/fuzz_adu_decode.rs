#![no_main]

use fieldwire_core::encoding::reader::BitReader;
use fieldwire_core::modbus::{adu, PointAdu, TcpAdu};
use fieldwire_core::Direction;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = adu::frame_len(data);
    for direction in [Direction::Request, Direction::Response] {
        let mut r = BitReader::new(data);
        if TcpAdu::decode(&mut r, direction).is_err() {
            // A failed decode leaves the cursor untouched.
            assert_eq!(r.remaining(), data.len());
        }
        let mut r = BitReader::new(data);
        let _ = PointAdu::decode_strict(&mut r, direction);
    }
});
