//! Property-based soundness tests.
//!
//! Run with: `cargo test --test property`

mod delta_apply;
mod varint_roundtrip;
