//! Positioned reads over an in-memory byte region.
//!
//! Pack and index files are parsed from memory-mapped slices; the cursor
//! gives those parsers typed reads (u8, big-endian u32, fixed byte runs)
//! with explicit bounds checks and repositionable seeks. There is no
//! buffering: callers request exactly the bytes they need, and any read
//! past the end of the region fails with `Truncated`.

use std::fmt;

/// Error from cursor reads.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorError {
    /// A read or seek went past the end of the region.
    Truncated { wanted: usize, remaining: usize },
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { wanted, remaining } => {
                write!(f, "truncated: wanted {wanted} bytes, {remaining} remaining")
            }
        }
    }
}

impl std::error::Error for CursorError {}

/// Positioned view over a read-only byte region.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at position 0.
    #[inline]
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current absolute position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the position and the end of the region.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Repositions to an absolute offset.
    ///
    /// Seeking to the end of the region is allowed; past it is an error.
    pub fn seek(&mut self, pos: usize) -> Result<(), CursorError> {
        if pos > self.bytes.len() {
            return Err(CursorError::Truncated {
                wanted: pos,
                remaining: self.bytes.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Reads one byte and advances.
    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Returns the next byte without advancing.
    pub fn peek_u8(&self) -> Result<u8, CursorError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(CursorError::Truncated {
                wanted: 1,
                remaining: 0,
            })
    }

    /// Reads a big-endian u32 and advances by 4.
    pub fn read_u32_be(&mut self) -> Result<u32, CursorError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads `n` bytes and advances by `n`.
    ///
    /// The returned slice borrows from the underlying region, not the
    /// cursor, so it stays valid across further reads.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(CursorError::Truncated {
                wanted: n,
                remaining,
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}
