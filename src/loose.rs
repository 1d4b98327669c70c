//! Loose object enumeration and decoding.
//!
//! Loose objects live at `objects/<xx>/<38 hex>` as zlib streams of
//! `"<kind> <decimal size>\0<payload>"`. Scanning parses every header (the
//! kind and size are part of the metadata map) but leaves payloads alone;
//! materialization re-reads and inflates the file on demand.
//!
//! Header parsing inflates a 32-byte prefix and doubles the peek until the
//! NUL terminator shows up, giving up at 1 KiB. Entries that do not look
//! like objects (wrong name shape, the `pack` and `info` directories) are
//! skipped silently; objects that fail to decode are reported per file and
//! never abort a scan.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use memchr::memchr;

use crate::inflate::{inflate_prefix, InflateError};
use crate::limits::ReadLimits;
use crate::object::ObjectKind;
use crate::oid::{Oid, OID_HEX_LEN};

/// Initial inflated peek for header parsing.
const HEADER_PEEK_START: usize = 32;
/// Ceiling for the doubling peek; a header this long is garbage.
const HEADER_PEEK_MAX: usize = 1024;

/// Error decoding one loose object.
#[derive(Debug)]
#[non_exhaustive]
pub enum LooseError {
    /// File read failed.
    Io(io::Error),
    /// Zlib stream is broken.
    Inflate(InflateError),
    /// No NUL terminator within the peek ceiling.
    MissingHeaderNul,
    /// Header shape is wrong (missing space, bad size digits).
    MalformedHeader { detail: &'static str },
    /// Header names a kind outside commit/tree/blob/tag.
    UnknownKind,
    /// Declared size exceeds the object cap.
    TooLarge { size: u64, max: usize },
    /// Stream ended before the declared payload size.
    SizeMismatch { expected: u64, actual: u64 },
}

impl fmt::Display for LooseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "loose object I/O error: {err}"),
            Self::Inflate(err) => write!(f, "loose object inflate failed: {err}"),
            Self::MissingHeaderNul => write!(f, "loose object header has no terminator"),
            Self::MalformedHeader { detail } => {
                write!(f, "malformed loose object header: {detail}")
            }
            Self::UnknownKind => write!(f, "unknown loose object kind"),
            Self::TooLarge { size, max } => {
                write!(f, "loose object size {size} exceeds cap {max}")
            }
            Self::SizeMismatch { expected, actual } => {
                write!(f, "loose object size mismatch: header says {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for LooseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Inflate(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for LooseError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<InflateError> for LooseError {
    fn from(err: InflateError) -> Self {
        Self::Inflate(err)
    }
}

/// Parsed loose object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooseHeader {
    pub kind: ObjectKind,
    /// Declared payload size.
    pub size: u64,
    /// Inflated bytes before the payload (`"<kind> <size>\0"`).
    pub header_len: usize,
}

/// One enumerated loose object.
#[derive(Debug)]
pub struct LooseEntry {
    pub oid: Oid,
    pub path: PathBuf,
    pub header: LooseHeader,
}

/// Result of a loose scan: decoded entries plus per-file failures.
#[derive(Debug, Default)]
pub struct LooseScan {
    pub entries: Vec<LooseEntry>,
    pub skipped: Vec<(PathBuf, LooseError)>,
}

/// Enumerates and header-parses every loose object under `objects_dir`.
///
/// Fan-out directories are the two-lowercase-hex ones; `pack`, `info`, and
/// anything else are ignored. File names must supply the remaining 38 hex
/// characters or the file is skipped silently. Entries come back sorted by
/// OID so scans are deterministic regardless of directory order.
///
/// # Errors
/// Only an unreadable `objects_dir` itself is an error; per-file and
/// per-subdirectory failures land in `skipped`.
pub fn scan(objects_dir: &Path, limits: &ReadLimits) -> io::Result<LooseScan> {
    let mut scan = LooseScan::default();

    for dir_entry in fs::read_dir(objects_dir)? {
        let dir_entry = match dir_entry {
            Ok(entry) => entry,
            Err(err) => {
                scan.skipped.push((objects_dir.to_path_buf(), err.into()));
                continue;
            }
        };

        let dir_name = dir_entry.file_name();
        let Some(prefix) = fanout_prefix(dir_name.as_encoded_bytes()) else {
            continue;
        };
        if !dir_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let subdir = dir_entry.path();
        let files = match fs::read_dir(&subdir) {
            Ok(files) => files,
            Err(err) => {
                scan.skipped.push((subdir, err.into()));
                continue;
            }
        };

        for file in files {
            let file = match file {
                Ok(file) => file,
                Err(err) => {
                    scan.skipped.push((subdir.clone(), err.into()));
                    continue;
                }
            };

            let file_name = file.file_name();
            let Some(oid) = oid_from_names(prefix, file_name.as_encoded_bytes()) else {
                continue;
            };

            let path = file.path();
            match read_header(&path, limits) {
                Ok(header) => scan.entries.push(LooseEntry { oid, path, header }),
                Err(err) => scan.skipped.push((path, err)),
            }
        }
    }

    scan.entries.sort_by_key(|entry| entry.oid);
    Ok(scan)
}

/// Reads and parses the header of one loose object file.
pub fn read_header(path: &Path, limits: &ReadLimits) -> Result<LooseHeader, LooseError> {
    let compressed = fs::read(path)?;
    parse_header(&compressed, limits)
}

/// Materializes the payload for a previously parsed header.
///
/// Inflates `header_len + size` bytes and returns the post-NUL suffix.
pub fn read_payload(path: &Path, header: &LooseHeader) -> Result<Box<[u8]>, LooseError> {
    let compressed = fs::read(path)?;

    let total = header.header_len + header.size as usize;
    let mut out = Vec::with_capacity(total.min(HEADER_PEEK_MAX.max(4 * 1024)));
    let prefix = inflate_prefix(&compressed, &mut out, total)?;

    if prefix.produced < total {
        return Err(LooseError::SizeMismatch {
            expected: header.size,
            actual: (prefix.produced.saturating_sub(header.header_len)) as u64,
        });
    }

    Ok(out[header.header_len..total].to_vec().into_boxed_slice())
}

/// Parses `"<kind> <size>\0"` from the front of a compressed stream,
/// inflating only as much as the header needs.
fn parse_header(compressed: &[u8], limits: &ReadLimits) -> Result<LooseHeader, LooseError> {
    let mut out = Vec::with_capacity(HEADER_PEEK_START);
    let mut want = HEADER_PEEK_START;

    let nul = loop {
        let prefix = inflate_prefix(compressed, &mut out, want)?;
        let window = &out[..prefix.produced.min(HEADER_PEEK_MAX)];
        if let Some(nul) = memchr(0, window) {
            break nul;
        }
        if prefix.complete || want >= HEADER_PEEK_MAX {
            return Err(LooseError::MissingHeaderNul);
        }
        want *= 2;
    };

    let header = &out[..nul];
    let space = memchr(b' ', header).ok_or(LooseError::MalformedHeader {
        detail: "missing space",
    })?;

    let kind = ObjectKind::from_header_name(&header[..space]).ok_or(LooseError::UnknownKind)?;

    let size = parse_decimal(&header[space + 1..]).ok_or(LooseError::MalformedHeader {
        detail: "invalid size digits",
    })?;

    if size > limits.max_object_bytes as u64 {
        return Err(LooseError::TooLarge {
            size,
            max: limits.max_object_bytes,
        });
    }

    Ok(LooseHeader {
        kind,
        size,
        header_len: nul + 1,
    })
}

/// Returns the fan-out byte pair if `name` is two lowercase hex chars.
fn fanout_prefix(name: &[u8]) -> Option<[u8; 2]> {
    match name {
        [a, b] if is_hex_lower(*a) && is_hex_lower(*b) => Some([*a, *b]),
        _ => None,
    }
}

/// Assembles an OID from the fan-out directory name and the file name.
fn oid_from_names(prefix: [u8; 2], file_name: &[u8]) -> Option<Oid> {
    if file_name.len() != OID_HEX_LEN - 2 {
        return None;
    }
    let mut hex = [0u8; OID_HEX_LEN];
    hex[..2].copy_from_slice(&prefix);
    hex[2..].copy_from_slice(file_name);
    Oid::from_hex(&hex)
}

#[inline]
fn is_hex_lower(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

fn parse_decimal(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((b - b'0') as u64)?;
    }
    Some(value)
}
