//! Hard caps for object database reading.
//!
//! Pack and loose data are untrusted input; every decode path runs against
//! an explicit bound so a corrupt repository cannot drive unbounded
//! allocation or parsing. Exceeding a limit surfaces as an error on the
//! affected artifact, never as silent truncation.

/// Hard caps applied while reading one object database.
#[derive(Clone, Copy, Debug)]
pub struct ReadLimits {
    /// Maximum uncompressed payload size for any object.
    pub max_object_bytes: usize,

    /// Maximum inflated delta stream size.
    ///
    /// This caps the delta program itself, not the reconstructed object.
    pub max_delta_bytes: usize,

    /// Maximum pack entry header length in bytes (type/size varint plus
    /// base reference). Real headers are under 30 bytes; this is a guard
    /// against runaway parsing on corrupt data.
    pub max_header_bytes: usize,

    /// Maximum delta chain length.
    ///
    /// Counts delta edges from a record to its real base. Git produces
    /// chains well under 100; this is a corruption guard, not a tuning
    /// knob.
    pub max_chain_len: u32,
}

impl ReadLimits {
    /// Defaults sized for bulk analytics over ordinary repositories.
    pub const DEFAULT: Self = Self {
        max_object_bytes: 512 * 1024 * 1024,
        max_delta_bytes: 64 * 1024 * 1024,
        max_header_bytes: 32,
        max_chain_len: 4096,
    };

    /// Tight limits for tests or hostile input.
    pub const RESTRICTIVE: Self = Self {
        max_object_bytes: 1024 * 1024,
        max_delta_bytes: 1024 * 1024,
        max_header_bytes: 32,
        max_chain_len: 64,
    };

    /// Validates internal consistency.
    ///
    /// # Panics
    ///
    /// Panics on an invalid configuration (a programming error, not a
    /// runtime condition).
    #[track_caller]
    pub const fn validate(&self) {
        assert!(self.max_object_bytes > 0, "object cap must be > 0");
        assert!(self.max_delta_bytes > 0, "delta cap must be > 0");
        assert!(
            self.max_header_bytes >= 22,
            "header cap must fit a type/size varint plus a 20-byte base OID"
        );
        assert!(self.max_chain_len > 0, "must allow at least one delta edge");
    }
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const _: () = ReadLimits::DEFAULT.validate();
const _: () = ReadLimits::RESTRICTIVE.validate();
