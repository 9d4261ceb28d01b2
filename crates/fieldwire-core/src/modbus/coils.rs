use alloc::vec::Vec;

/// Packs coil states LSB-first, eight per byte, zero-padding the last byte.
pub fn pack_coils(states: &[bool]) -> Vec<u8> {
    let mut bytes = alloc::vec![0u8; states.len().div_ceil(8)];
    for (i, _) in states.iter().enumerate().filter(|(_, on)| **on) {
        bytes[i / 8] |= 1 << (i % 8);
    }
    bytes
}

/// Unpacks `quantity` coil states; padding bits past `quantity` are ignored
/// and missing bytes read as off.
pub fn unpack_coils(bytes: &[u8], quantity: usize) -> Vec<bool> {
    (0..quantity)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{pack_coils, unpack_coils};

    #[test]
    fn lsb_first_packing() {
        let states = [true, false, true, true, false, false, true, true, true, false];
        assert_eq!(pack_coils(&states), vec![0xCD, 0x01]);
        assert_eq!(unpack_coils(&[0xCD, 0x01], 10), states.to_vec());
    }

    #[test]
    fn empty_and_short_input() {
        assert!(pack_coils(&[]).is_empty());
        assert_eq!(unpack_coils(&[0x01], 10)[8..], [false, false]);
    }
}
