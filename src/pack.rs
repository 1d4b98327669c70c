//! Pack file entry reading.
//!
//! A pack is `"PACK"`, a version, an object count, a run of entries, and a
//! trailing SHA-1. The signature and version are tolerated rather than
//! validated (the sibling index is authoritative for what the pack holds),
//! but the trailer is excluded from the readable region so the checksum
//! can never be misparsed as entry data.
//!
//! Each entry is a type/size header (size encoding continued from the
//! header byte's low nibble), an optional delta base reference, and a zlib
//! stream. Entry byte lengths are not stored in the pack; the caller
//! derives them from the index's offset order (gap to the next offset, or
//! to the trailer for the last entry), which bounds each compressed slice.
//!
//! Reading an entry parses the header only; payloads inflate lazily.

use std::fmt;

use crate::cursor::Cursor;
use crate::limits::ReadLimits;
use crate::object::ObjectKind;
use crate::oid::{Oid, OID_LEN};
use crate::varint::{read_ofs, read_size, VarintError};

/// Pack header bytes: magic(4) + version(4) + object count(4).
pub const PACK_HEADER_LEN: usize = 12;
/// Trailing pack SHA-1.
pub const PACK_TRAILER_LEN: usize = OID_LEN;

/// Error decoding a pack entry; any of these condemns the whole pack.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PackError {
    /// File cannot hold even a header and trailer.
    TooSmall { len: usize },
    /// Entry offset is before the header or past the trailer.
    OffsetOutOfRange { offset: u64 },
    /// Entry type code 0 or 5.
    ReservedType { code: u8 },
    /// Entry header ran past the header length guard.
    HeaderTooLong { max: usize },
    /// Entry data ends past its span or the readable region.
    Truncated,
    /// Size or offset varint overflowed.
    VarintOverflow,
    /// `OFS_DELTA` distance reaches before the start of the pack.
    OfsOutOfPack { rel_offset: u64, offset: u64 },
    /// `OFS_DELTA` base offset is not an indexed entry; pack and index
    /// disagree.
    OfsBaseNotAnEntry { base_offset: u64 },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { len } => write!(f, "pack too small: {len} bytes"),
            Self::OffsetOutOfRange { offset } => {
                write!(f, "entry offset {offset} out of range")
            }
            Self::ReservedType { code } => write!(f, "reserved entry type {code}"),
            Self::HeaderTooLong { max } => {
                write!(f, "entry header exceeds {max} bytes")
            }
            Self::Truncated => write!(f, "truncated pack entry"),
            Self::VarintOverflow => write!(f, "pack entry varint overflow"),
            Self::OfsOutOfPack { rel_offset, offset } => {
                write!(
                    f,
                    "ofs-delta distance {rel_offset} reaches before pack start from offset {offset}"
                )
            }
            Self::OfsBaseNotAnEntry { base_offset } => {
                write!(f, "ofs-delta base offset {base_offset} is not an indexed entry")
            }
        }
    }
}

impl std::error::Error for PackError {}

impl From<VarintError> for PackError {
    fn from(err: VarintError) -> Self {
        match err {
            VarintError::Truncated => Self::Truncated,
            VarintError::Overflow => Self::VarintOverflow,
        }
    }
}

/// Entry classification from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A commit, tree, blob, or tag stored whole.
    Real(ObjectKind),
    /// Delta against an earlier entry in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta against an object named by OID (any location).
    RefDelta { base_oid: Oid },
}

/// One parsed pack entry header with its compressed span.
#[derive(Debug, Clone, Copy)]
pub struct PackEntry<'a> {
    pub kind: EntryKind,
    /// Header size field: payload size for real entries, inflated delta
    /// stream size for delta entries.
    pub header_size: u64,
    /// Absolute pack offset where the zlib stream begins.
    pub data_start: usize,
    /// The entry's compressed bytes (zlib stream, possibly with slack up
    /// to the next entry; the inflater reports how much it consumed).
    pub compressed: &'a [u8],
}

/// Readable view over pack bytes, trailer excluded.
#[derive(Debug, Clone, Copy)]
pub struct PackData<'a> {
    bytes: &'a [u8],
    data_end: usize,
}

impl<'a> PackData<'a> {
    /// Wraps full pack bytes (trailer included).
    ///
    /// The signature and version are not validated; the index is
    /// authoritative. Only the minimum length is enforced.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, PackError> {
        if bytes.len() < PACK_HEADER_LEN + PACK_TRAILER_LEN {
            return Err(PackError::TooSmall { len: bytes.len() });
        }
        Ok(Self {
            bytes,
            data_end: bytes.len() - PACK_TRAILER_LEN,
        })
    }

    /// End of entry data: total length minus the trailer.
    #[inline]
    #[must_use]
    pub const fn data_end(&self) -> usize {
        self.data_end
    }

    /// Parses the entry at `offset` whose span is `entry_len` bytes.
    ///
    /// `entry_len` comes from the index offset order: the gap to the next
    /// entry, or `data_end - offset` for the last one.
    pub fn entry_at(
        &self,
        offset: u64,
        entry_len: u64,
        limits: &ReadLimits,
    ) -> Result<PackEntry<'a>, PackError> {
        let pos = offset as usize;
        if offset >= self.data_end as u64 || pos < PACK_HEADER_LEN {
            return Err(PackError::OffsetOutOfRange { offset });
        }
        let entry_end = offset
            .checked_add(entry_len)
            .filter(|&end| end <= self.data_end as u64)
            .ok_or(PackError::Truncated)? as usize;

        let mut cur = Cursor::new(self.bytes);
        cur.seek(pos).expect("offset checked above");

        let first = cur.peek_u8().map_err(|_| PackError::Truncated)?;
        let type_code = (first >> 4) & 0x07;

        let (mut header_len, header_size) = read_size(&mut cur, 4, 0x0f)?;

        let kind = match type_code {
            0 | 5 => return Err(PackError::ReservedType { code: type_code }),
            code @ 1..=4 => {
                EntryKind::Real(ObjectKind::from_code(code).expect("codes 1..=4 are real kinds"))
            }
            6 => {
                let (ofs_len, rel_offset) = read_ofs(&mut cur)?;
                header_len += ofs_len;
                let base_offset = offset
                    .checked_sub(rel_offset)
                    .filter(|&base| base >= PACK_HEADER_LEN as u64)
                    .ok_or(PackError::OfsOutOfPack { rel_offset, offset })?;
                EntryKind::OfsDelta { base_offset }
            }
            7 => {
                let oid_bytes = cur.read_bytes(OID_LEN).map_err(|_| PackError::Truncated)?;
                header_len += OID_LEN;
                let base_oid = Oid::try_from_slice(oid_bytes).expect("read exactly 20 bytes");
                EntryKind::RefDelta { base_oid }
            }
            _ => unreachable!("type code is masked to 3 bits"),
        };

        if header_len > limits.max_header_bytes {
            return Err(PackError::HeaderTooLong {
                max: limits.max_header_bytes,
            });
        }

        let data_start = cur.position();
        if data_start > entry_end {
            return Err(PackError::Truncated);
        }

        Ok(PackEntry {
            kind,
            header_size,
            data_start,
            compressed: &self.bytes[data_start..entry_end],
        })
    }
}
