//! Object records and the semantic-parser contract.
//!
//! The store's product is a flat map from OID to [`ObjectRecord`]: the
//! resolved kind, the uncompressed size, where the bytes live on disk, and
//! lazily materialized payload/value slots. Delta states are internal to
//! the pack reader and never appear here; by the time a record exists its
//! kind is one of the four real object kinds.
//!
//! Splitting a payload into domain values (commit fields, tree entries) is
//! the caller's business, expressed through [`ObjectParser`]. The store
//! invokes it at most once per OID and caches the result in the record.

use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::oid::Oid;

/// The four real Git object kinds.
///
/// Pack delta entries (`OFS_DELTA`, `REF_DELTA`) are transient decode
/// states, not object kinds; they are resolved away inside the reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// Maps a pack entry type code (1..=4). Codes 0 and 5 are reserved,
    /// 6 and 7 are the delta states; none of those map here.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            _ => None,
        }
    }

    /// Maps a loose object header name (`commit`, `tree`, `blob`, `tag`).
    #[must_use]
    pub fn from_header_name(name: &[u8]) -> Option<Self> {
        match name {
            b"commit" => Some(Self::Commit),
            b"tree" => Some(Self::Tree),
            b"blob" => Some(Self::Blob),
            b"tag" => Some(Self::Tag),
            _ => None,
        }
    }

    /// The header/display name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an object's bytes live on disk.
#[derive(Clone, Debug)]
pub enum Location {
    /// A zlib-compressed file under `objects/<xx>/`.
    Loose(PathBuf),
    /// An entry inside a pack file at the given byte offset.
    Packed { pack: Arc<PathBuf>, offset: u64 },
}

impl Location {
    /// The containing file (loose object file or pack file).
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Loose(path) => path,
            Self::Packed { pack, .. } => pack,
        }
    }

    /// True for loose objects.
    #[inline]
    #[must_use]
    pub const fn is_loose(&self) -> bool {
        matches!(self, Self::Loose(_))
    }
}

/// How to reach an object's bytes; internal to the store.
#[derive(Debug)]
pub(crate) enum Source {
    Loose {
        /// Bytes before the payload in the inflated stream
        /// (`"<kind> <size>\0"`).
        header_len: usize,
    },
    Packed {
        pack_id: u32,
        /// Absolute offset of the zlib stream within the pack.
        data_start: usize,
        /// Compressed span length (to the next entry or the trailer).
        compressed_len: usize,
        /// Entry header size field. For real entries this equals the
        /// payload size; for deltas it is the inflated delta stream size.
        header_size: u64,
    },
}

/// One object in the store: resolved metadata plus lazy payload and
/// parsed-value slots.
///
/// Payload and value are memoized on first materialization; repeated
/// access returns the same allocation.
#[derive(Debug)]
pub struct ObjectRecord<V> {
    pub(crate) oid: Oid,
    pub(crate) kind: ObjectKind,
    pub(crate) size: u64,
    pub(crate) location: Location,
    pub(crate) base_oid: Option<Oid>,
    pub(crate) source: Source,
    pub(crate) payload: OnceCell<Box<[u8]>>,
    pub(crate) value: OnceCell<V>,
}

impl<V> ObjectRecord<V> {
    /// The object's id.
    #[inline]
    #[must_use]
    pub const fn oid(&self) -> Oid {
        self.oid
    }

    /// The resolved kind; for a record that originated as a delta this is
    /// the kind at the root of its chain.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Uncompressed payload length in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// On-disk location.
    #[inline]
    #[must_use]
    pub const fn location(&self) -> &Location {
        &self.location
    }

    /// The delta base this record was reconstructed from, if it originated
    /// as a pack delta entry.
    #[inline]
    #[must_use]
    pub const fn base_oid(&self) -> Option<Oid> {
        self.base_oid
    }

    /// The payload, if it has already been materialized.
    #[inline]
    #[must_use]
    pub fn payload_if_materialized(&self) -> Option<&[u8]> {
        self.payload.get().map(|p| &p[..])
    }
}

/// Caller-supplied semantic parser.
///
/// The store calls [`parse`](Self::parse) at most once per OID, with a
/// payload of exactly `record.size()` bytes, and caches the value in the
/// record. Delta states never reach the parser. Implementations must not
/// touch the store (the payload slice borrows from it).
pub trait ObjectParser {
    /// Parsed value cached per record.
    type Value;

    /// Kinds worth materializing. Returning `false` (the common choice for
    /// [`ObjectKind::Blob`] in metadata workloads) makes the store skip
    /// inflation entirely for those records unless the caller asks for the
    /// payload explicitly.
    fn wants(&self, kind: ObjectKind) -> bool {
        let _ = kind;
        true
    }

    /// Splits a payload into the caller's value.
    fn parse(&self, kind: ObjectKind, payload: &[u8]) -> Self::Value;
}

/// Parser that wants nothing; for callers that only need the metadata map
/// and raw payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullParser;

impl ObjectParser for NullParser {
    type Value = ();

    fn wants(&self, _kind: ObjectKind) -> bool {
        false
    }

    fn parse(&self, _kind: ObjectKind, _payload: &[u8]) -> Self::Value {}
}
