//! Bulk metadata-graph extraction from Git object databases.
//!
//! Reads a repository's on-disk object database directly, with no `git`
//! binary and no Git library, and produces a flat map from OID to object
//! record: resolved kind, uncompressed size, on-disk location, delta base,
//! and a lazily materialized payload. Built for workloads that sweep many
//! repositories (inventory, archaeology, cross-repo analytics) where
//! forking `git` per repo is the dominant cost.
//!
//! The load path, leaves first:
//! 1. `repo` resolves the root to its `objects` directory.
//! 2. `loose` enumerates `objects/<xx>/` and parses object headers.
//! 3. For each pack pair, `idx` parses the v2 index and `pack` reads
//!    every entry header off the mmapped bytes.
//! 4. `store` merges both populations (loose wins OID collisions) and
//!    resolves every delta chain to a real kind and final size, using
//!    only headers and a few peeked delta bytes.
//! 5. On demand, `inflate` and `delta` materialize payloads, memoized per
//!    record, and the caller's [`ObjectParser`] turns payloads into
//!    domain values exactly once per OID.
//!
//! # Invariants
//! - Stored records only ever carry real kinds; delta states never escape
//!   the reader.
//! - A materialized payload's length always equals the record's size.
//! - Failures are isolated per artifact; a load only fails outright on an
//!   unreadable root or a missing `objects` directory.
//!
//! # Out of scope
//! Writing or packing objects, multi-pack indexes, pack index v1 and v3+,
//! extended 64-bit offsets, checksum verification, ref resolution, and
//! network transport.

pub mod cursor;
pub mod delta;
pub mod idx;
pub mod inflate;
pub mod limits;
pub mod loose;
pub mod object;
pub mod oid;
pub mod pack;
pub mod repo;
pub mod store;
pub mod varint;

pub use cursor::{Cursor, CursorError};
pub use delta::DeltaError;
pub use idx::{IdxEntry, IdxError, PackIndex};
pub use inflate::InflateError;
pub use limits::ReadLimits;
pub use loose::{LooseError, LooseHeader};
pub use object::{Location, NullParser, ObjectKind, ObjectParser, ObjectRecord};
pub use oid::{Oid, OID_HEX_LEN, OID_LEN};
pub use pack::{EntryKind, PackData, PackEntry, PackError};
pub use repo::{OpenError, RepoLayout};
pub use store::{LoadReport, ObjectDb, ResolveError, SkipReason, SkippedArtifact};
pub use varint::VarintError;
