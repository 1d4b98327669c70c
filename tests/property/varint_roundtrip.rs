//! Round-trip properties for the two pack varint encodings.

use proptest::prelude::*;

use odbmap::varint::{read_ofs, read_size};
use odbmap::Cursor;

/// Size-encodes `value` with `initial_bits` payload bits in byte 0.
fn encode_size(mut value: u64, initial_bits: u32) -> Vec<u8> {
    let initial_mask = (1u64 << initial_bits) - 1;
    let mut out = Vec::new();
    let mut first = (value & initial_mask) as u8;
    value >>= initial_bits;
    if value != 0 {
        first |= 0x80;
    }
    out.push(first);
    while value != 0 {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}

/// Offset-encodes a backward distance the way Git writes it.
fn encode_ofs(mut dist: u64) -> Vec<u8> {
    let mut bytes = vec![(dist & 0x7f) as u8];
    dist >>= 7;
    while dist > 0 {
        dist -= 1;
        bytes.push(((dist & 0x7f) as u8) | 0x80);
        dist >>= 7;
    }
    bytes.reverse();
    bytes
}

proptest! {
    #[test]
    fn size_roundtrip_initial_four(value in 0u64..(1 << 56)) {
        let encoded = encode_size(value, 4);
        let mut cur = Cursor::new(&encoded);
        let (consumed, decoded) = read_size(&mut cur, 4, 0x0f).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn size_roundtrip_initial_seven(value in 0u64..(1 << 56)) {
        let encoded = encode_size(value, 7);
        let mut cur = Cursor::new(&encoded);
        let (consumed, decoded) = read_size(&mut cur, 7, 0x7f).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn size_decode_ignores_trailing_bytes(value in 0u64..(1 << 40), tail in proptest::collection::vec(any::<u8>(), 0..16)) {
        let mut encoded = encode_size(value, 7);
        let prefix_len = encoded.len();
        encoded.extend_from_slice(&tail);

        let mut cur = Cursor::new(&encoded);
        let (consumed, decoded) = read_size(&mut cur, 7, 0x7f).unwrap();
        prop_assert_eq!(consumed, prefix_len);
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(cur.position(), prefix_len);
    }

    #[test]
    fn ofs_roundtrip(dist in 1u64..(1 << 48)) {
        let encoded = encode_ofs(dist);
        let mut cur = Cursor::new(&encoded);
        let (consumed, decoded) = read_ofs(&mut cur).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(decoded, dist);
    }

    #[test]
    fn decoders_never_panic_on_noise(bytes in proptest::collection::vec(any::<u8>(), 0..24)) {
        let mut cur = Cursor::new(&bytes);
        let _ = read_size(&mut cur, 4, 0x0f);
        let mut cur = Cursor::new(&bytes);
        let _ = read_size(&mut cur, 7, 0x7f);
        let mut cur = Cursor::new(&bytes);
        let _ = read_ofs(&mut cur);
    }
}
