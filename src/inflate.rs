//! Bounded zlib inflation.
//!
//! All object payloads and delta streams in a Git object database are
//! zlib streams whose uncompressed length is known from a header, so every
//! inflate here runs against an explicit bound:
//!
//! - [`inflate_capped`] errors if the stream would produce more than the
//!   cap (pack payloads and delta streams).
//! - [`inflate_exact`] additionally requires the stream to produce the
//!   expected length exactly.
//! - [`inflate_prefix`] stops quietly once enough bytes are out (loose
//!   object header peeks, delta size peeks); hitting the cap is not an
//!   error there.
//!
//! A per-thread `Decompress` and a fixed scratch buffer are reused across
//! calls. The scratch state is not re-entrant on the same thread; none of
//! these helpers call back into the caller, so that cannot arise.

use std::cell::RefCell;
use std::fmt;

use flate2::{Decompress, FlushDecompress, Status};

/// Per-call scratch chunk size.
const SCRATCH_BUF_SIZE: usize = 64 * 1024;

thread_local! {
    static SCRATCH_DECOMPRESS: RefCell<Decompress> = RefCell::new(Decompress::new(true));
    static SCRATCH_BUF: RefCell<[u8; SCRATCH_BUF_SIZE]> =
        const { RefCell::new([0u8; SCRATCH_BUF_SIZE]) };
}

fn with_scratch<F, R>(f: F) -> R
where
    F: FnOnce(&mut Decompress, &mut [u8]) -> R,
{
    SCRATCH_DECOMPRESS.with(|de| {
        SCRATCH_BUF.with(|buf| {
            let mut de = de.borrow_mut();
            de.reset(true);
            let mut buf = buf.borrow_mut();
            f(&mut de, &mut *buf)
        })
    })
}

/// Error from zlib inflation.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InflateError {
    /// The stream would produce more bytes than the cap allows.
    LimitExceeded,
    /// Input ended before the stream did, or produced too few bytes.
    TruncatedInput,
    /// The decoder made no progress with input left.
    Stalled,
    /// The underlying zlib engine rejected the stream.
    Backend,
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitExceeded => write!(f, "inflate output limit exceeded"),
            Self::TruncatedInput => write!(f, "truncated zlib input"),
            Self::Stalled => write!(f, "inflate stalled"),
            Self::Backend => write!(f, "zlib backend error"),
        }
    }
}

impl std::error::Error for InflateError {}

/// Outcome of [`inflate_prefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    /// Bytes appended to the output buffer.
    pub produced: usize,
    /// True if the zlib stream ended within the inflated prefix.
    pub complete: bool,
}

/// Inflates a zlib stream with a hard output cap.
///
/// The output buffer is cleared first. Returns the number of input bytes
/// consumed, which callers use to find the end of an entry's compressed
/// span. On error the output may hold a partial prefix; discard it.
pub fn inflate_capped(
    input: &[u8],
    out: &mut Vec<u8>,
    max_out: usize,
) -> Result<usize, InflateError> {
    out.clear();

    with_scratch(|de, buf| {
        let mut in_pos = 0usize;

        loop {
            let before_in = de.total_in() as usize;
            let before_out = de.total_out() as usize;

            let status = de
                .decompress(&input[in_pos..], buf, FlushDecompress::None)
                .map_err(|_| InflateError::Backend)?;

            let consumed = de.total_in() as usize - before_in;
            let produced = de.total_out() as usize - before_out;
            in_pos += consumed;

            if produced != 0 {
                if out.len() + produced > max_out {
                    return Err(InflateError::LimitExceeded);
                }
                out.extend_from_slice(&buf[..produced]);
            }

            match status {
                Status::StreamEnd => return Ok(in_pos),
                Status::Ok => {
                    if consumed == 0 && produced == 0 {
                        if in_pos >= input.len() {
                            return Err(InflateError::TruncatedInput);
                        }
                        return Err(InflateError::Stalled);
                    }
                }
                Status::BufError => {
                    if in_pos >= input.len() {
                        return Err(InflateError::TruncatedInput);
                    }
                }
            }
        }
    })
}

/// Inflates a zlib stream that must produce exactly `expected` bytes.
///
/// Returns the number of input bytes consumed.
pub fn inflate_exact(
    input: &[u8],
    out: &mut Vec<u8>,
    expected: usize,
) -> Result<usize, InflateError> {
    let consumed = inflate_capped(input, out, expected)?;
    if out.len() != expected {
        return Err(InflateError::TruncatedInput);
    }
    Ok(consumed)
}

/// Inflates at least `want` bytes of a zlib stream, or the whole stream if
/// it is shorter.
///
/// Stopping at the cap is not an error: this is the peek primitive for
/// loose object headers and delta size headers, where only a prefix of the
/// stream is needed. The output buffer is cleared first and may end up
/// slightly past `want` (up to one scratch chunk); callers slice what they
/// need.
pub fn inflate_prefix(
    input: &[u8],
    out: &mut Vec<u8>,
    want: usize,
) -> Result<Prefix, InflateError> {
    out.clear();

    with_scratch(|de, buf| {
        let mut in_pos = 0usize;

        loop {
            if out.len() >= want {
                return Ok(Prefix {
                    produced: out.len(),
                    complete: false,
                });
            }

            let before_in = de.total_in() as usize;
            let before_out = de.total_out() as usize;

            let status = de
                .decompress(&input[in_pos..], buf, FlushDecompress::None)
                .map_err(|_| InflateError::Backend)?;

            let consumed = de.total_in() as usize - before_in;
            let produced = de.total_out() as usize - before_out;
            in_pos += consumed;

            if produced != 0 {
                out.extend_from_slice(&buf[..produced]);
            }

            match status {
                Status::StreamEnd => {
                    return Ok(Prefix {
                        produced: out.len(),
                        complete: true,
                    })
                }
                Status::Ok => {
                    if consumed == 0 && produced == 0 {
                        if in_pos >= input.len() {
                            return Err(InflateError::TruncatedInput);
                        }
                        return Err(InflateError::Stalled);
                    }
                }
                Status::BufError => {
                    if in_pos >= input.len() {
                        return Err(InflateError::TruncatedInput);
                    }
                }
            }
        }
    })
}
