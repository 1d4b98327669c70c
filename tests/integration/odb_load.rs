//! End-to-end loads over synthetic repositories mixing loose objects,
//! packs, deltas, and deliberate corruption.

use odbmap::{NullParser, ObjectDb, ObjectKind, ObjectParser, PackError, ReadLimits, SkipReason};

use crate::fixtures::{filler, insert_only_delta, oid, PackBuilder, RepoFixture};

/// Parser that extracts the first line of commits and tags.
struct FirstLineParser;

impl ObjectParser for FirstLineParser {
    type Value = Vec<u8>;

    fn wants(&self, kind: ObjectKind) -> bool {
        matches!(kind, ObjectKind::Commit | ObjectKind::Tag)
    }

    fn parse(&self, _kind: ObjectKind, payload: &[u8]) -> Self::Value {
        payload
            .split(|&b| b == b'\n')
            .next()
            .unwrap_or_default()
            .to_vec()
    }
}

#[test]
fn mixed_repository_inventory() {
    let repo = RepoFixture::new();

    // Loose population.
    repo.write_loose(oid(0x10), "commit", b"tree 11\nauthor a\n");
    repo.write_loose(oid(0x11), "tree", b"100644 f\0....................");
    repo.write_loose(oid(0x12), "blob", b"file body");

    // Packed population: two real objects and a ref delta onto the loose
    // tree.
    let mut builder = PackBuilder::new();
    builder.add_real(4, b"object 1234\ntag v1\n");
    builder.add_real(3, &filler(4096, 7));
    builder.add_ref_delta(oid(0x11), &insert_only_delta(29, b"rebuilt tree payload"));
    repo.write_pack("0a", &builder, &[oid(0x20), oid(0x21), oid(0x22)]);

    let (db, report) = ObjectDb::open(repo.root(), FirstLineParser, ReadLimits::DEFAULT).unwrap();
    assert!(report.is_clean(), "skipped: {:?}", report.skipped);
    assert_eq!(db.len(), 6);

    // Every stored record carries a real kind.
    for record in db.iter() {
        assert!(matches!(
            record.kind(),
            ObjectKind::Commit | ObjectKind::Tree | ObjectKind::Blob | ObjectKind::Tag
        ));
    }

    // Loose records point at their loose files.
    let loose_commit = db.get(&oid(0x10)).unwrap();
    assert!(loose_commit.location().is_loose());
    assert_eq!(loose_commit.size(), 17);

    // The packed tag parses through the caller's parser.
    assert_eq!(
        db.value(&oid(0x20)).unwrap().unwrap().as_slice(),
        b"object 1234"
    );
    // Blobs are unwanted and stay cold.
    assert_eq!(db.value(&oid(0x21)).unwrap(), None);
    assert!(db.get(&oid(0x21)).unwrap().payload_if_materialized().is_none());

    // The ref delta resolved against the loose tree.
    let delta_tree = db.get(&oid(0x22)).unwrap();
    assert_eq!(delta_tree.kind(), ObjectKind::Tree);
    assert_eq!(delta_tree.base_oid(), Some(oid(0x11)));
    assert_eq!(db.payload(&oid(0x22)).unwrap(), b"rebuilt tree payload");

    // Materialized payloads always match their declared size.
    for record in db.iter() {
        let payload = db.payload(&record.oid()).unwrap();
        assert_eq!(payload.len() as u64, record.size());
    }
}

#[test]
fn corruption_is_isolated_per_artifact() {
    let repo = RepoFixture::new();

    repo.write_loose(oid(0x31), "blob", b"survives");

    // Healthy pack.
    let mut good = PackBuilder::new();
    good.add_real(3, b"good payload");
    repo.write_pack("0b", &good, &[oid(0x32)]);

    // Pack with a truncated idx: dropped whole.
    let mut orphan = PackBuilder::new();
    orphan.add_real(3, b"unreachable");
    let pack_dir = repo.objects.join("pack");
    std::fs::write(pack_dir.join("pack-0c.pack"), orphan.build()).unwrap();
    std::fs::write(pack_dir.join("pack-0c.idx"), b"\xfftOc\x00\x00\x00\x02short").unwrap();

    // Pack with no idx at all: dropped whole.
    std::fs::write(pack_dir.join("pack-0d.pack"), orphan.build()).unwrap();

    // Garbage loose object: dropped alone.
    let hex = oid(0x33).to_hex();
    let dir = repo.objects.join(std::str::from_utf8(&hex[..2]).unwrap());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(std::str::from_utf8(&hex[2..]).unwrap()), b"not zlib").unwrap();

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::DEFAULT).unwrap();

    assert_eq!(db.len(), 2);
    assert!(db.contains(&oid(0x31)));
    assert!(db.contains(&oid(0x32)));
    assert_eq!(db.payload(&oid(0x32)).unwrap(), b"good payload");

    assert_eq!(report.skipped.len(), 3);
    assert!(report
        .skipped
        .iter()
        .any(|s| matches!(s.reason, SkipReason::Loose(_))));
    assert!(report
        .skipped
        .iter()
        .any(|s| matches!(s.reason, SkipReason::Index(_))));
    assert!(report
        .skipped
        .iter()
        .any(|s| matches!(s.reason, SkipReason::MissingIndex)));
}

#[test]
fn reserved_entry_type_condemns_only_its_pack() {
    let repo = RepoFixture::new();

    let mut bad = PackBuilder::new();
    bad.add_raw(&[0x50, 0x00]); // type code 5
    repo.write_pack("0e", &bad, &[oid(0x41)]);

    let mut good = PackBuilder::new();
    good.add_real(2, b"tree data here");
    repo.write_pack("0f", &good, &[oid(0x42)]);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::DEFAULT).unwrap();
    assert_eq!(db.len(), 1);
    assert!(db.contains(&oid(0x42)));
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::Pack(PackError::ReservedType { code: 5 })
    ));
}

#[test]
fn multiple_packs_merge_into_one_map() {
    let repo = RepoFixture::new();

    let mut first = PackBuilder::new();
    first.add_real(3, b"pack one blob");
    repo.write_pack("10", &first, &[oid(0x51)]);

    let mut second = PackBuilder::new();
    second.add_real(3, b"pack two blob!");
    // Cross-pack ref delta: base lives in the first pack.
    second.add_ref_delta(oid(0x51), &insert_only_delta(13, b"derived"));
    repo.write_pack("11", &second, &[oid(0x52), oid(0x53)]);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::DEFAULT).unwrap();
    assert!(report.is_clean(), "skipped: {:?}", report.skipped);
    assert_eq!(db.len(), 3);
    assert_eq!(db.payload(&oid(0x53)).unwrap(), b"derived");
    assert_eq!(db.get(&oid(0x53)).unwrap().kind(), ObjectKind::Blob);
}

#[test]
fn oversized_entries_are_skipped_not_fatal() {
    let repo = RepoFixture::new();

    let mut builder = PackBuilder::new();
    builder.add_real(3, b"small enough");
    builder.add_real(3, &filler(2 * 1024 * 1024, 3));
    repo.write_pack("12", &builder, &[oid(0x61), oid(0x62)]);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::RESTRICTIVE).unwrap();
    assert_eq!(db.len(), 1);
    assert!(db.contains(&oid(0x61)));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].oid, Some(oid(0x62)));
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::TooLarge { .. }
    ));
}
