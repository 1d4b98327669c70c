//! Integration tests for the object database reader.
//!
//! Run with: `cargo test --test integration`


mod delta_chains;
mod odb_load;
