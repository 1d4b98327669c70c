//! Pack index (`.idx`) v2 parsing.
//!
//! The index maps OIDs to byte offsets inside the sibling `.pack`. This
//! parser validates the header, fan-out monotonicity, and table sizes,
//! then produces the offset-ordered entry list the entry reader needs:
//! sorted ascending by offset, each entry's compressed span runs to the
//! next offset (or to the pack trailer for the last one).
//!
//! Version 1 indexes, versions above 2, and 64-bit extended offsets are
//! all unsupported; the owning pack is dropped when any shows up. CRC
//! tables and trailer checksums are skipped, not verified.

use std::fmt;

use crate::cursor::Cursor;
use crate::oid::{Oid, OID_LEN};

/// Index magic for v2+ (`\xff t O c`).
const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
/// The only supported index version.
const IDX_VERSION: u32 = 2;
/// Header bytes: magic + version.
const IDX_HEADER_LEN: usize = 8;
/// Fan-out table entries.
const FANOUT_ENTRIES: usize = 256;
/// Fan-out table bytes.
const FANOUT_LEN: usize = FANOUT_ENTRIES * 4;
/// Bit 31 flags an extended 64-bit offset (unsupported here).
const EXTENDED_OFFSET_FLAG: u32 = 0x8000_0000;
/// Trailing pack + idx checksums.
const TRAILER_LEN: usize = 2 * OID_LEN;
/// Conservative whole-file size guard.
const MAX_IDX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Error parsing a pack index.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdxError {
    /// Magic bytes are not `\xfftOc` (a v1 index or not an index at all).
    BadMagic,
    /// Index version other than 2.
    UnsupportedVersion { version: u32 },
    /// An offset entry has bit 31 set (extended 64-bit offset).
    ExtendedOffset { index: u32 },
    /// Structural corruption (truncation, fan-out violations).
    Corrupt { detail: &'static str },
    /// File exceeds the size guard.
    TooLarge { size: u64, max: u64 },
}

impl IdxError {
    #[inline]
    pub(crate) const fn corrupt(detail: &'static str) -> Self {
        Self::Corrupt { detail }
    }
}

impl fmt::Display for IdxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "bad pack index magic"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported pack index version {version} (expected 2)")
            }
            Self::ExtendedOffset { index } => {
                write!(f, "extended 64-bit offset at entry {index} (unsupported)")
            }
            Self::Corrupt { detail } => write!(f, "corrupt pack index: {detail}"),
            Self::TooLarge { size, max } => {
                write!(f, "pack index too large: {size} bytes (max: {max})")
            }
        }
    }
}

impl std::error::Error for IdxError {}

/// One indexed object: its pack offset and OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdxEntry {
    pub offset: u64,
    pub oid: Oid,
}

/// Parsed pack index, entries sorted ascending by pack offset.
///
/// Owns its data: the source bytes (typically a short-lived mmap) can be
/// dropped after parsing, while the entry table lives with the store.
#[derive(Debug)]
pub struct PackIndex {
    object_count: u32,
    fanout: Box<[u32; FANOUT_ENTRIES]>,
    entries: Vec<IdxEntry>,
}

impl PackIndex {
    /// Parses a v2 pack index.
    ///
    /// # Errors
    /// `BadMagic`/`UnsupportedVersion` for anything but v2, `ExtendedOffset`
    /// for any bit-31 offset, `Corrupt` for truncation, non-monotonic
    /// fan-out, or duplicate offsets.
    pub fn parse(data: &[u8]) -> Result<Self, IdxError> {
        if data.len() as u64 > MAX_IDX_BYTES {
            return Err(IdxError::TooLarge {
                size: data.len() as u64,
                max: MAX_IDX_BYTES,
            });
        }
        if data.len() < IDX_HEADER_LEN + FANOUT_LEN + TRAILER_LEN {
            return Err(IdxError::corrupt("file too small"));
        }

        let mut cur = Cursor::new(data);
        let magic = cur.read_bytes(4).map_err(|_| IdxError::corrupt("header"))?;
        if magic != IDX_MAGIC {
            return Err(IdxError::BadMagic);
        }
        let version = cur
            .read_u32_be()
            .map_err(|_| IdxError::corrupt("header"))?;
        if version != IDX_VERSION {
            return Err(IdxError::UnsupportedVersion { version });
        }

        let (fanout, object_count) = read_fanout(&mut cur)?;

        let n = object_count as usize;
        // names + crcs + offsets + trailer must fit; extended offsets may
        // follow the offset table but are never consulted.
        let tables_len = n
            .checked_mul(OID_LEN + 4 + 4)
            .ok_or(IdxError::corrupt("object count overflow"))?;
        let min_len = IDX_HEADER_LEN + FANOUT_LEN + tables_len + TRAILER_LEN;
        if data.len() < min_len {
            return Err(IdxError::corrupt("tables truncated"));
        }

        let names = cur
            .read_bytes(n * OID_LEN)
            .map_err(|_| IdxError::corrupt("name table truncated"))?;

        // CRC table is present but unverified.
        cur.read_bytes(n * 4)
            .map_err(|_| IdxError::corrupt("crc table truncated"))?;

        let mut entries = Vec::with_capacity(n);
        for i in 0..n {
            let raw = cur
                .read_u32_be()
                .map_err(|_| IdxError::corrupt("offset table truncated"))?;
            if raw & EXTENDED_OFFSET_FLAG != 0 {
                return Err(IdxError::ExtendedOffset { index: i as u32 });
            }
            let oid = Oid::try_from_slice(&names[i * OID_LEN..(i + 1) * OID_LEN])
                .expect("name table slice is 20 bytes");
            entries.push(IdxEntry {
                offset: raw as u64,
                oid,
            });
        }

        entries.sort_by_key(|entry| entry.offset);
        for pair in entries.windows(2) {
            if pair[0].offset == pair[1].offset {
                return Err(IdxError::corrupt("duplicate pack offsets"));
            }
        }

        Ok(Self {
            object_count,
            fanout,
            entries,
        })
    }

    /// Number of objects in the pack.
    #[inline]
    #[must_use]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Fan-out value for a first byte: the count of OIDs whose first byte
    /// is `<= first_byte`.
    #[inline]
    #[must_use]
    pub fn fanout(&self, first_byte: u8) -> u32 {
        self.fanout[first_byte as usize]
    }

    /// Entries sorted ascending by pack offset.
    #[inline]
    #[must_use]
    pub fn by_offset(&self) -> &[IdxEntry] {
        &self.entries
    }

    /// Consumes the index, keeping only the offset-ordered entries.
    #[inline]
    #[must_use]
    pub fn into_entries(self) -> Vec<IdxEntry> {
        self.entries
    }
}

/// Reads and validates the fan-out table; returns it with the total count.
fn read_fanout(cur: &mut Cursor<'_>) -> Result<(Box<[u32; FANOUT_ENTRIES]>, u32), IdxError> {
    let mut fanout = Box::new([0u32; FANOUT_ENTRIES]);
    let mut prev = 0u32;
    for slot in fanout.iter_mut() {
        let val = cur
            .read_u32_be()
            .map_err(|_| IdxError::corrupt("fan-out truncated"))?;
        if val < prev {
            return Err(IdxError::corrupt("fan-out not monotonic"));
        }
        *slot = val;
        prev = val;
    }
    Ok((fanout, prev))
}
