//! Delta application against generated opcode scripts.
//!
//! Generates a base buffer and a script of COPY/INSERT operations, builds
//! the corresponding delta stream, and checks that applying it reproduces
//! the result a straightforward reference evaluation produces.

use proptest::prelude::*;

use odbmap::delta::{apply, delta_sizes};

/// One generated delta operation.
#[derive(Debug, Clone)]
enum Op {
    Copy { ofs: usize, len: usize },
    Insert(Vec<u8>),
}

fn op_strategy(base_len: usize) -> impl Strategy<Value = Op> {
    let copy = (0..base_len, 1..64usize).prop_filter_map("copy must fit base", move |(ofs, len)| {
        let len = len.min(base_len - ofs);
        (len > 0).then_some(Op::Copy { ofs, len })
    });
    let insert = proptest::collection::vec(any::<u8>(), 1..=127).prop_map(Op::Insert);
    prop_oneof![copy, insert]
}

fn script_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<Op>)> {
    proptest::collection::vec(any::<u8>(), 1..512).prop_flat_map(|base| {
        let len = base.len();
        (
            Just(base),
            proptest::collection::vec(op_strategy(len), 1..24),
        )
    })
}

fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

/// Builds the delta stream and the expected result for a script.
fn build_delta(base: &[u8], ops: &[Op]) -> (Vec<u8>, Vec<u8>) {
    let mut expected = Vec::new();
    let mut body = Vec::new();

    for op in ops {
        match op {
            Op::Copy { ofs, len } => {
                expected.extend_from_slice(&base[*ofs..*ofs + *len]);
                let mut cmd = 0x80u8;
                let mut operands = Vec::new();
                for (bit, shift) in [(0x01u8, 0), (0x02, 8), (0x04, 16), (0x08, 24)] {
                    let byte = ((*ofs >> shift) & 0xff) as u8;
                    if byte != 0 {
                        cmd |= bit;
                        operands.push(byte);
                    }
                }
                for (bit, shift) in [(0x10u8, 0), (0x20, 8)] {
                    let byte = ((*len >> shift) & 0xff) as u8;
                    if byte != 0 {
                        cmd |= bit;
                        operands.push(byte);
                    }
                }
                body.push(cmd);
                body.extend_from_slice(&operands);
            }
            Op::Insert(bytes) => {
                expected.extend_from_slice(bytes);
                body.push(bytes.len() as u8);
                body.extend_from_slice(bytes);
            }
        }
    }

    let mut delta = encode_varint(base.len() as u64);
    delta.extend_from_slice(&encode_varint(expected.len() as u64));
    delta.extend_from_slice(&body);
    (delta, expected)
}

proptest! {
    #[test]
    fn generated_scripts_roundtrip((base, ops) in script_strategy()) {
        let (delta, expected) = build_delta(&base, &ops);

        let (base_size, result_size) = delta_sizes(&delta).unwrap();
        prop_assert_eq!(base_size, base.len() as u64);
        prop_assert_eq!(result_size, expected.len() as u64);

        let mut out = Vec::new();
        apply(&base, &delta, &mut out, 1 << 20).unwrap();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn apply_never_panics_on_noise(
        base in proptest::collection::vec(any::<u8>(), 0..64),
        delta in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut out = Vec::new();
        let _ = apply(&base, &delta, &mut out, 1 << 16);
    }
}
