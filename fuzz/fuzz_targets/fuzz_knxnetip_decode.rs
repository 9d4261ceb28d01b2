#![no_main]

use fieldwire_core::encoding::reader::BitReader;
use fieldwire_core::knxnetip::{self, KnxNetIpMessage, LData};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = knxnetip::frame_len(data);
    let mut r = BitReader::new(data);
    if let Ok(message) = KnxNetIpMessage::decode_strict(&mut r) {
        let consumed = data.len() - r.remaining();
        let encoded = message.encode_to_vec().expect("decoded message re-encodes");
        assert_eq!(encoded, &data[..consumed]);
    }
    let _ = LData::decode_from_bytes(data);
});
