//! The object store: one flat OID-keyed map per repository.
//!
//! Loading walks the object database once: loose headers are parsed, each
//! pack's index and entry headers are read, the two populations merge
//! (loose wins OID collisions), and every delta entry's chain is resolved
//! to a real kind and final size, all without inflating a single payload
//! beyond the few bytes of delta size headers. Payloads and parsed values
//! materialize lazily on demand and are memoized in the record.
//!
//! Failures are isolated per artifact: a corrupt loose object drops that
//! object, a corrupt pack drops that pack, an unresolvable delta drops the
//! record and its dependents. The load reports every drop and only an
//! unreadable root or a missing `objects` directory is fatal.
//!
//! The store is single-threaded (`Send`, not `Sync`); bulk drivers run one
//! store per repository and parallelize across repositories.

use std::cell::OnceCell;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use memmap2::Mmap;

use crate::delta::{self, DeltaError};
use crate::idx::{IdxEntry, IdxError, PackIndex};
use crate::inflate::{inflate_exact, inflate_prefix, InflateError};
use crate::limits::ReadLimits;
use crate::loose::{self, LooseError, LooseHeader};
use crate::object::{Location, ObjectKind, ObjectParser, ObjectRecord, Source};
use crate::oid::Oid;
use crate::pack::{EntryKind, PackData, PackError};
use crate::repo::{OpenError, RepoLayout};

/// Inflated bytes needed to cover a delta stream's two size varints.
const DELTA_SIZE_PEEK: usize = 32;

/// Why an artifact was left out of the store.
#[derive(Debug)]
#[non_exhaustive]
pub enum SkipReason {
    /// File or directory read failed.
    Io(io::Error),
    /// Loose object failed to decode.
    Loose(LooseError),
    /// Pack index was unsupported or corrupt; the pack is dropped.
    Index(IdxError),
    /// Pack entry data was corrupt; the pack is dropped.
    Pack(PackError),
    /// Delta stream was corrupt; the record and its dependents drop.
    Delta(DeltaError),
    /// Delta stream failed to inflate.
    Inflate(InflateError),
    /// A delta base is not present in this repository.
    MissingBase { base: Oid },
    /// The delta chain loops.
    Cycle,
    /// The delta chain exceeds the corruption guard.
    ChainTooLong { max: u32 },
    /// A `.pack` without its sibling `.idx`.
    MissingIndex,
    /// Declared size exceeds a configured cap.
    TooLarge { size: u64, max: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Loose(err) => write!(f, "{err}"),
            Self::Index(err) => write!(f, "{err}"),
            Self::Pack(err) => write!(f, "{err}"),
            Self::Delta(err) => write!(f, "{err}"),
            Self::Inflate(err) => write!(f, "{err}"),
            Self::MissingBase { base } => write!(f, "delta base {base} not in repository"),
            Self::Cycle => write!(f, "delta chain cycle"),
            Self::ChainTooLong { max } => write!(f, "delta chain longer than {max}"),
            Self::MissingIndex => write!(f, "pack has no .idx sibling"),
            Self::TooLarge { size, max } => {
                write!(f, "declared size {size} exceeds cap {max}")
            }
        }
    }
}

/// One dropped artifact: a loose object, a whole pack, or a pack record.
#[derive(Debug)]
pub struct SkippedArtifact {
    /// The containing file (loose object or pack).
    pub path: PathBuf,
    /// The affected OID, when the drop is narrower than a whole file.
    pub oid: Option<Oid>,
    pub reason: SkipReason,
}

/// Per-load account of everything that was dropped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub skipped: Vec<SkippedArtifact>,
}

impl LoadReport {
    /// True if nothing was dropped.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Error materializing a payload or value after load.
#[derive(Debug)]
#[non_exhaustive]
pub enum ResolveError {
    /// OID is not in the store (never existed, or dropped during load).
    NotFound,
    /// Loose payload read failed.
    Loose(LooseError),
    /// Pack payload or delta stream failed to inflate.
    Inflate(InflateError),
    /// Delta application failed.
    Delta(DeltaError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "object not in store"),
            Self::Loose(err) => write!(f, "{err}"),
            Self::Inflate(err) => write!(f, "{err}"),
            Self::Delta(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound => None,
            Self::Loose(err) => Some(err),
            Self::Inflate(err) => Some(err),
            Self::Delta(err) => Some(err),
        }
    }
}

impl From<LooseError> for ResolveError {
    fn from(err: LooseError) -> Self {
        Self::Loose(err)
    }
}

impl From<InflateError> for ResolveError {
    fn from(err: InflateError) -> Self {
        Self::Inflate(err)
    }
}

impl From<DeltaError> for ResolveError {
    fn from(err: DeltaError) -> Self {
        Self::Delta(err)
    }
}

/// One mmapped pack kept alive for the store's lifetime.
#[derive(Debug)]
struct PackHandle {
    path: Arc<PathBuf>,
    mmap: Arc<Mmap>,
    /// Index entries sorted ascending by offset; this is the map that
    /// translated `OFS_DELTA` bases and it stays with the pack.
    #[allow(dead_code)]
    by_offset: Vec<IdxEntry>,
}

/// Pre-resolution record state during load.
enum Pending {
    Loose {
        path: PathBuf,
        header: LooseHeader,
    },
    Pack(PendingPack),
}

struct PendingPack {
    pack_id: u32,
    offset: u64,
    data_start: usize,
    compressed_len: usize,
    header_size: u64,
    kind: PendingKind,
}

enum PendingKind {
    Real(ObjectKind),
    /// Delta with its base OID (`OFS_DELTA` bases already translated
    /// through the pack's offset order).
    Delta { base: Oid },
}

/// Resolved metadata for one surviving record.
struct ResolvedMeta {
    kind: ObjectKind,
    size: u64,
    base_oid: Option<Oid>,
}

/// The loaded object database.
pub struct ObjectDb<P: ObjectParser> {
    layout: RepoLayout,
    parser: P,
    limits: ReadLimits,
    packs: Vec<PackHandle>,
    records: AHashMap<Oid, ObjectRecord<P::Value>>,
}

impl<P: ObjectParser> ObjectDb<P> {
    /// Loads a repository's object database.
    ///
    /// Returns the store plus the report of everything dropped along the
    /// way. The store is immutable afterwards; payloads and parsed values
    /// materialize lazily through [`payload`](Self::payload) and
    /// [`value`](Self::value).
    ///
    /// # Errors
    /// Only an unreadable root or a missing `objects` directory.
    pub fn open(root: &Path, parser: P, limits: ReadLimits) -> Result<(Self, LoadReport), OpenError> {
        limits.validate();
        let layout = RepoLayout::resolve(root)?;
        let mut report = LoadReport::default();

        let loose_scan = loose::scan(&layout.objects_dir, &limits)?;
        for (path, err) in loose_scan.skipped {
            report.skipped.push(SkippedArtifact {
                path,
                oid: None,
                reason: SkipReason::Loose(err),
            });
        }

        let mut pending: AHashMap<Oid, Pending> =
            AHashMap::with_capacity(loose_scan.entries.len());
        for entry in loose_scan.entries {
            pending.insert(
                entry.oid,
                Pending::Loose {
                    path: entry.path,
                    header: entry.header,
                },
            );
        }

        let mut packs: Vec<PackHandle> = Vec::new();
        for pack_path in list_packs(&layout.pack_dir, &mut report) {
            let pack_id = packs.len() as u32;
            match scan_pack(&pack_path, pack_id, &limits) {
                Ok((handle, entries)) => {
                    merge_pack_entries(&handle, entries, &limits, &mut pending, &mut report);
                    packs.push(handle);
                }
                Err(reason) => report.skipped.push(SkippedArtifact {
                    path: pack_path,
                    oid: None,
                    reason,
                }),
            }
        }

        let resolution = resolve_chains(&pending, &packs, &limits, &mut report);

        let mut records = AHashMap::with_capacity(resolution.len());
        for (oid, state) in pending {
            let Some(meta) = resolution.get(&oid) else {
                continue;
            };
            let (location, source) = match state {
                Pending::Loose { path, header } => (
                    Location::Loose(path),
                    Source::Loose {
                        header_len: header.header_len,
                    },
                ),
                Pending::Pack(pp) => (
                    Location::Packed {
                        pack: packs[pp.pack_id as usize].path.clone(),
                        offset: pp.offset,
                    },
                    Source::Packed {
                        pack_id: pp.pack_id,
                        data_start: pp.data_start,
                        compressed_len: pp.compressed_len,
                        header_size: pp.header_size,
                    },
                ),
            };
            records.insert(
                oid,
                ObjectRecord {
                    oid,
                    kind: meta.kind,
                    size: meta.size,
                    location,
                    base_oid: meta.base_oid,
                    source,
                    payload: OnceCell::new(),
                    value: OnceCell::new(),
                },
            );
        }

        Ok((
            Self {
                layout,
                parser,
                limits,
                packs,
                records,
            },
            report,
        ))
    }

    /// The resolved repository layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    /// Number of records in the store.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the store holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up one record.
    #[inline]
    #[must_use]
    pub fn get(&self, oid: &Oid) -> Option<&ObjectRecord<P::Value>> {
        self.records.get(oid)
    }

    /// True if the OID survived the load.
    #[inline]
    #[must_use]
    pub fn contains(&self, oid: &Oid) -> bool {
        self.records.contains_key(oid)
    }

    /// Iterates over all records in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord<P::Value>> {
        self.records.values()
    }

    /// Materializes a payload, resolving the delta chain if needed.
    ///
    /// Memoized: repeated calls return the same bytes at the same address.
    pub fn payload(&self, oid: &Oid) -> Result<&[u8], ResolveError> {
        let record = self.records.get(oid).ok_or(ResolveError::NotFound)?;
        self.payload_of(record)
    }

    /// Materializes and parses a record through the caller's parser.
    ///
    /// Returns `None` without touching the payload when the parser does
    /// not want the record's kind (the usual arrangement for blobs in
    /// metadata workloads). The parser runs at most once per OID; the
    /// value is cached in the record.
    pub fn value(&self, oid: &Oid) -> Result<Option<&P::Value>, ResolveError> {
        let record = self.records.get(oid).ok_or(ResolveError::NotFound)?;
        if !self.parser.wants(record.kind) {
            return Ok(None);
        }
        if let Some(value) = record.value.get() {
            return Ok(Some(value));
        }
        let payload = self.payload_of(record)?;
        let value = self.parser.parse(record.kind, payload);
        let _ = record.value.set(value);
        Ok(record.value.get())
    }

    fn payload_of<'s>(
        &'s self,
        record: &'s ObjectRecord<P::Value>,
    ) -> Result<&'s [u8], ResolveError> {
        if let Some(payload) = record.payload.get() {
            return Ok(payload);
        }

        // Walk toward the chain root until something is already
        // materialized or a non-delta record is reached. Cycles were
        // eliminated during load, so this terminates.
        let mut chain = vec![record];
        loop {
            let cur = *chain.last().expect("chain starts non-empty");
            if cur.payload.get().is_some() {
                break;
            }
            let Some(base_oid) = cur.base_oid else {
                break;
            };
            let base = self
                .records
                .get(&base_oid)
                .expect("delta bases are resolved at load");
            chain.push(base);
        }

        let mut chain = chain.into_iter().rev();
        let root = chain.next().expect("chain starts non-empty");
        let mut payload = match root.payload.get() {
            Some(payload) => &payload[..],
            None => self.materialize_root(root)?,
        };
        for rec in chain {
            payload = self.materialize_delta(rec, payload)?;
        }
        Ok(payload)
    }

    /// Inflates a non-delta record's payload and memoizes it.
    fn materialize_root<'s>(
        &'s self,
        record: &'s ObjectRecord<P::Value>,
    ) -> Result<&'s [u8], ResolveError> {
        let bytes: Box<[u8]> = match record.source {
            Source::Loose { header_len } => {
                let header = LooseHeader {
                    kind: record.kind,
                    size: record.size,
                    header_len,
                };
                loose::read_payload(record.location.path(), &header)?
            }
            Source::Packed {
                pack_id,
                data_start,
                compressed_len,
                header_size,
            } => {
                let slice = self.pack_slice(pack_id, data_start, compressed_len);
                let mut out = Vec::with_capacity(header_size as usize);
                inflate_exact(slice, &mut out, header_size as usize)?;
                out.into_boxed_slice()
            }
        };
        debug_assert_eq!(bytes.len() as u64, record.size);

        let _ = record.payload.set(bytes);
        Ok(record.payload.get().expect("just set"))
    }

    /// Inflates a delta stream, applies it to the base, memoizes.
    fn materialize_delta<'s>(
        &'s self,
        record: &'s ObjectRecord<P::Value>,
        base: &[u8],
    ) -> Result<&'s [u8], ResolveError> {
        let Source::Packed {
            pack_id,
            data_start,
            compressed_len,
            header_size,
        } = record.source
        else {
            unreachable!("delta records are always pack-backed")
        };

        let slice = self.pack_slice(pack_id, data_start, compressed_len);
        let mut stream = Vec::with_capacity(header_size as usize);
        inflate_exact(slice, &mut stream, header_size as usize)?;

        let mut out = Vec::new();
        delta::apply(base, &stream, &mut out, self.limits.max_object_bytes)?;
        debug_assert_eq!(out.len() as u64, record.size);

        let _ = record.payload.set(out.into_boxed_slice());
        Ok(record.payload.get().expect("just set"))
    }

    #[inline]
    fn pack_slice(&self, pack_id: u32, data_start: usize, compressed_len: usize) -> &[u8] {
        let mmap = &self.packs[pack_id as usize].mmap;
        &mmap[data_start..data_start + compressed_len]
    }
}

impl<P: ObjectParser> fmt::Debug for ObjectDb<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDb")
            .field("root", &self.layout.root)
            .field("records", &self.records.len())
            .field("packs", &self.packs.len())
            .finish()
    }
}

/// Lists `*.pack` files; `*.midx` and anything else are ignored.
///
/// A missing pack directory is an empty repository, not an error. Sorted
/// for deterministic pack ids.
fn list_packs(pack_dir: &Path, report: &mut LoadReport) -> Vec<PathBuf> {
    let entries = match fs::read_dir(pack_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            report.skipped.push(SkippedArtifact {
                path: pack_dir.to_path_buf(),
                oid: None,
                reason: SkipReason::Io(err),
            });
            return Vec::new();
        }
    };

    let mut packs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "pack"))
        .collect();
    packs.sort();
    packs
}

/// Opens one pack pair, parses the index, and reads every entry header.
///
/// `OFS_DELTA` base offsets are translated to OIDs through the index's
/// offset order here; a base offset that is not an indexed entry means the
/// pack and index disagree, which condemns the pack.
fn scan_pack(
    path: &Path,
    pack_id: u32,
    limits: &ReadLimits,
) -> Result<(PackHandle, Vec<(Oid, PendingPack)>), SkipReason> {
    let idx_path = path.with_extension("idx");
    if !fs::metadata(&idx_path).map(|m| m.is_file()).unwrap_or(false) {
        return Err(SkipReason::MissingIndex);
    }

    let idx_file = File::open(&idx_path).map_err(SkipReason::Io)?;
    // SAFETY: object database files are treated as immutable while a
    // repository is being read; this mmap is dropped after parsing.
    let idx_mmap = unsafe { Mmap::map(&idx_file) }.map_err(SkipReason::Io)?;
    let index = PackIndex::parse(&idx_mmap).map_err(SkipReason::Index)?;
    drop(idx_mmap);

    let file = File::open(path).map_err(SkipReason::Io)?;
    // SAFETY: as above; the pack mmap lives as long as the store.
    let mmap = unsafe { Mmap::map(&file) }.map_err(SkipReason::Io)?;
    advise_sequential(&file, &mmap);

    let pack = PackData::parse(&mmap).map_err(SkipReason::Pack)?;
    let by_offset = index.into_entries();

    let mut entries = Vec::with_capacity(by_offset.len());
    for (i, idx_entry) in by_offset.iter().enumerate() {
        let span_end = match by_offset.get(i + 1) {
            Some(next) => next.offset,
            None => pack.data_end() as u64,
        };
        let entry_len = span_end.checked_sub(idx_entry.offset).ok_or(
            SkipReason::Pack(PackError::OffsetOutOfRange {
                offset: idx_entry.offset,
            }),
        )?;

        let parsed = pack
            .entry_at(idx_entry.offset, entry_len, limits)
            .map_err(SkipReason::Pack)?;

        let kind = match parsed.kind {
            EntryKind::Real(kind) => PendingKind::Real(kind),
            EntryKind::RefDelta { base_oid } => PendingKind::Delta { base: base_oid },
            EntryKind::OfsDelta { base_offset } => {
                let base_idx = by_offset
                    .binary_search_by_key(&base_offset, |e| e.offset)
                    .map_err(|_| {
                        SkipReason::Pack(PackError::OfsBaseNotAnEntry { base_offset })
                    })?;
                PendingKind::Delta {
                    base: by_offset[base_idx].oid,
                }
            }
        };

        entries.push((
            idx_entry.oid,
            PendingPack {
                pack_id,
                offset: idx_entry.offset,
                data_start: parsed.data_start,
                compressed_len: parsed.compressed.len(),
                header_size: parsed.header_size,
                kind,
            },
        ));
    }

    Ok((
        PackHandle {
            path: Arc::new(path.to_path_buf()),
            mmap: Arc::new(mmap),
            by_offset,
        },
        entries,
    ))
}

/// Merges one pack's entries into the pending map.
///
/// Loose objects and earlier packs win OID collisions; size caps are
/// enforced here so a capped entry is reported once and only when it
/// would actually have entered the store.
fn merge_pack_entries(
    handle: &PackHandle,
    entries: Vec<(Oid, PendingPack)>,
    limits: &ReadLimits,
    pending: &mut AHashMap<Oid, Pending>,
    report: &mut LoadReport,
) {
    for (oid, pp) in entries {
        if pending.contains_key(&oid) {
            continue;
        }

        let cap = match pp.kind {
            PendingKind::Real(_) => limits.max_object_bytes,
            PendingKind::Delta { .. } => limits.max_delta_bytes,
        };
        if pp.header_size > cap as u64 {
            report.skipped.push(SkippedArtifact {
                path: handle.path.as_ref().clone(),
                oid: Some(oid),
                reason: SkipReason::TooLarge {
                    size: pp.header_size,
                    max: cap,
                },
            });
            continue;
        }

        pending.insert(oid, Pending::Pack(pp));
    }
}

/// Resolves every delta chain to a real kind, final size, and base OID.
///
/// Works on headers and delta size peeks only; no payload is built here.
/// Unresolvable records (missing base, cycle, overlong chain, corrupt
/// delta header) are dropped with their dependents and reported.
fn resolve_chains(
    pending: &AHashMap<Oid, Pending>,
    packs: &[PackHandle],
    limits: &ReadLimits,
    report: &mut LoadReport,
) -> AHashMap<Oid, ResolvedMeta> {
    let mut resolved: AHashMap<Oid, ResolvedMeta> = AHashMap::with_capacity(pending.len());
    let mut dropped: AHashSet<Oid> = AHashSet::new();

    // Sorted order keeps resolution (and the report) deterministic for
    // identical repository state.
    let mut oids: Vec<Oid> = pending.keys().copied().collect();
    oids.sort_unstable();
    for oid in oids {
        if resolved.contains_key(&oid) || dropped.contains(&oid) {
            continue;
        }
        resolve_one(oid, pending, packs, limits, &mut resolved, &mut dropped, report);
    }

    resolved
}

fn resolve_one(
    start: Oid,
    pending: &AHashMap<Oid, Pending>,
    packs: &[PackHandle],
    limits: &ReadLimits,
    resolved: &mut AHashMap<Oid, ResolvedMeta>,
    dropped: &mut AHashSet<Oid>,
    report: &mut LoadReport,
) {
    // Phase 1: walk base references until something resolvable. `path`
    // collects the delta records awaiting a kind, tip first.
    let mut path: Vec<Oid> = Vec::new();
    let mut cur = start;

    let root_kind = loop {
        if let Some(meta) = resolved.get(&cur) {
            break meta.kind;
        }
        if dropped.contains(&cur) {
            drop_chain(&path, pending, packs, dropped, report, |_| {
                SkipReason::MissingBase { base: cur }
            });
            return;
        }
        match pending.get(&cur) {
            None => {
                drop_chain(&path, pending, packs, dropped, report, |_| {
                    SkipReason::MissingBase { base: cur }
                });
                return;
            }
            Some(Pending::Loose { header, .. }) => {
                resolved.insert(
                    cur,
                    ResolvedMeta {
                        kind: header.kind,
                        size: header.size,
                        base_oid: None,
                    },
                );
                break header.kind;
            }
            Some(Pending::Pack(pp)) => match pp.kind {
                PendingKind::Real(kind) => {
                    resolved.insert(
                        cur,
                        ResolvedMeta {
                            kind,
                            size: pp.header_size,
                            base_oid: None,
                        },
                    );
                    break kind;
                }
                PendingKind::Delta { base } => {
                    if path.len() as u32 >= limits.max_chain_len {
                        path.push(cur);
                        drop_chain(&path, pending, packs, dropped, report, |_| {
                            SkipReason::ChainTooLong {
                                max: limits.max_chain_len,
                            }
                        });
                        return;
                    }
                    path.push(cur);
                    if cur == base || path.contains(&base) {
                        drop_chain(&path, pending, packs, dropped, report, |_| {
                            SkipReason::Cycle
                        });
                        return;
                    }
                    cur = base;
                }
            },
        }
    };

    // Phase 2: resolve the collected deltas base-to-tip. Each record's
    // size comes from its delta stream's result-size header; the declared
    // base size is checked against the base's resolved size right away.
    for i in (0..path.len()).rev() {
        let oid = path[i];
        let Some(Pending::Pack(pp)) = pending.get(&oid) else {
            unreachable!("path holds pack delta records only")
        };
        let PendingKind::Delta { base } = pp.kind else {
            unreachable!("path holds delta records only")
        };

        let base_size = resolved
            .get(&base)
            .expect("base resolved before its dependents")
            .size;

        let outcome = match peek_delta_sizes(pp, packs) {
            Ok((declared_base, _)) if declared_base != base_size => {
                Err(SkipReason::Delta(DeltaError::BaseSizeMismatch {
                    declared: declared_base,
                    actual: base_size,
                }))
            }
            Ok((_, result)) if result > limits.max_object_bytes as u64 => {
                Err(SkipReason::TooLarge {
                    size: result,
                    max: limits.max_object_bytes,
                })
            }
            Ok((_, result)) => Ok(result),
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(result_size) => {
                resolved.insert(
                    oid,
                    ResolvedMeta {
                        kind: root_kind,
                        size: result_size,
                        base_oid: Some(base),
                    },
                );
            }
            Err(reason) => {
                // This record drops with its specific reason; everything
                // above it in the chain cascades as a missing base.
                drop_one(oid, reason, pending, packs, dropped, report);
                drop_chain(&path[..i], pending, packs, dropped, report, |_| {
                    SkipReason::MissingBase { base: oid }
                });
                return;
            }
        }
    }
}

/// Drops every record in `chain`, reporting each with `reason(oid)`.
fn drop_chain(
    chain: &[Oid],
    pending: &AHashMap<Oid, Pending>,
    packs: &[PackHandle],
    dropped: &mut AHashSet<Oid>,
    report: &mut LoadReport,
    mut reason: impl FnMut(Oid) -> SkipReason,
) {
    for &oid in chain {
        if !dropped.insert(oid) {
            continue;
        }
        report.skipped.push(SkippedArtifact {
            path: artifact_path(oid, pending, packs),
            oid: Some(oid),
            reason: reason(oid),
        });
    }
}

/// Drops a single record with a by-value reason.
fn drop_one(
    oid: Oid,
    reason: SkipReason,
    pending: &AHashMap<Oid, Pending>,
    packs: &[PackHandle],
    dropped: &mut AHashSet<Oid>,
    report: &mut LoadReport,
) {
    if !dropped.insert(oid) {
        return;
    }
    report.skipped.push(SkippedArtifact {
        path: artifact_path(oid, pending, packs),
        oid: Some(oid),
        reason,
    });
}

/// The containing file for a pending record.
fn artifact_path(oid: Oid, pending: &AHashMap<Oid, Pending>, packs: &[PackHandle]) -> PathBuf {
    match pending.get(&oid) {
        Some(Pending::Loose { path, .. }) => path.clone(),
        Some(Pending::Pack(pp)) => packs[pp.pack_id as usize].path.as_ref().clone(),
        None => PathBuf::new(),
    }
}

/// Peeks a delta stream's `(base_size, result_size)` header varints.
fn peek_delta_sizes(pp: &PendingPack, packs: &[PackHandle]) -> Result<(u64, u64), SkipReason> {
    let mmap = &packs[pp.pack_id as usize].mmap;
    let slice = &mmap[pp.data_start..pp.data_start + pp.compressed_len];

    let mut buf = Vec::with_capacity(DELTA_SIZE_PEEK * 2);
    inflate_prefix(slice, &mut buf, DELTA_SIZE_PEEK).map_err(SkipReason::Inflate)?;
    delta::delta_sizes(&buf).map_err(SkipReason::Delta)
}

#[cfg(unix)]
fn advise_sequential(file: &File, mmap: &Mmap) {
    #[cfg(target_os = "linux")]
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor and mapping are valid for the duration of the
    // calls; both are advisory and their errors are ignored.
    unsafe {
        #[cfg(target_os = "linux")]
        let _ = libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
        #[cfg(not(target_os = "linux"))]
        let _ = file;
        let _ = libc::madvise(
            mmap.as_ptr() as *mut libc::c_void,
            mmap.len(),
            libc::MADV_SEQUENTIAL,
        );
    }
}

#[cfg(not(unix))]
fn advise_sequential(_file: &File, _mmap: &Mmap) {}
