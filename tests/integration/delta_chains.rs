//! Delta chain shapes: depth, ordering, and offset-encoding edges.

use odbmap::{NullParser, ObjectDb, ObjectKind, ReadLimits};

use crate::fixtures::{
    copy_then_insert_delta, filler, insert_only_delta, oid, PackBuilder, RepoFixture,
};

#[test]
fn chain_of_depth_five_resolves() {
    let repo = RepoFixture::new();

    let root_payload = b"root commit payload\n".to_vec();
    let mut builder = PackBuilder::new();
    let mut prev_offset = builder.add_real(1, &root_payload);
    let mut prev_payload = root_payload;
    let mut oids = vec![oid(0x80)];

    for depth in 1..=5u8 {
        let next: Vec<u8> = copy_then_insert_delta(
            &prev_payload,
            4,
            format!("depth {depth} tail").as_bytes(),
        );
        prev_offset = builder.add_ofs_delta(prev_offset, &next);
        let mut expected = prev_payload[..4].to_vec();
        expected.extend_from_slice(format!("depth {depth} tail").as_bytes());
        prev_payload = expected;
        oids.push(oid(0x80 + depth));
    }

    repo.write_pack("20", &builder, &oids);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::DEFAULT).unwrap();
    assert!(report.is_clean(), "skipped: {:?}", report.skipped);
    assert_eq!(db.len(), 6);

    let tip = oid(0x85);
    let record = db.get(&tip).unwrap();
    assert_eq!(record.kind(), ObjectKind::Commit);
    assert_eq!(record.base_oid(), Some(oid(0x84)));
    assert_eq!(db.payload(&tip).unwrap(), prev_payload.as_slice());

    // Every link in the chain resolved to the root's kind.
    for n in 0x80..=0x85u8 {
        assert_eq!(db.get(&oid(n)).unwrap().kind(), ObjectKind::Commit);
    }
}

#[test]
fn last_entry_delta_onto_first() {
    // The final entry's span runs to the pack trailer; make that entry a
    // delta whose base is the first entry.
    let repo = RepoFixture::new();

    let base_payload = b"the very first entry";
    let mut builder = PackBuilder::new();
    let base_offset = builder.add_real(3, base_payload);
    builder.add_real(3, b"middle entry");
    builder.add_ofs_delta(
        base_offset,
        &copy_then_insert_delta(base_payload, 8, b" + tail"),
    );
    repo.write_pack("21", &builder, &[oid(0x90), oid(0x91), oid(0x92)]);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::DEFAULT).unwrap();
    assert!(report.is_clean(), "skipped: {:?}", report.skipped);
    assert_eq!(db.payload(&oid(0x92)).unwrap(), b"the very + tail");
}

#[test]
fn long_backward_distance_uses_offset_recurrence() {
    // Put enough incompressible bytes between base and delta that the
    // backward distance needs a multi-byte offset encoding; a decoder
    // that concatenated bits instead of applying the (v+1)<<7 recurrence
    // would land off the base entry and fail.
    let repo = RepoFixture::new();

    let base_payload = b"distant base";
    let mut builder = PackBuilder::new();
    let base_offset = builder.add_real(3, base_payload);
    builder.add_real(3, &filler(512, 11));
    let delta_offset = builder.add_ofs_delta(
        base_offset,
        &insert_only_delta(base_payload.len(), b"reached"),
    );
    assert!(
        delta_offset - base_offset > 127,
        "distance must not fit a single offset byte"
    );
    repo.write_pack("22", &builder, &[oid(0xa0), oid(0xa1), oid(0xa2)]);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, ReadLimits::DEFAULT).unwrap();
    assert!(report.is_clean(), "skipped: {:?}", report.skipped);
    assert_eq!(db.payload(&oid(0xa2)).unwrap(), b"reached");
    assert_eq!(db.get(&oid(0xa2)).unwrap().base_oid(), Some(oid(0xa0)));
}

#[test]
fn overlong_chain_hits_the_guard() {
    let repo = RepoFixture::new();

    let limits = ReadLimits {
        max_chain_len: 3,
        ..ReadLimits::DEFAULT
    };

    // Chain of four deltas onto a real root. OIDs descend toward the
    // root so resolution (which runs in OID order) starts at the tip and
    // has to walk the full chain in one go.
    let mut builder = PackBuilder::new();
    let mut prev_offset = builder.add_real(3, b"root");
    let mut prev_len = 4usize;
    let mut oids = vec![oid(0xb0)];
    for n in 1..=4u8 {
        let result = format!("result {n}");
        prev_offset =
            builder.add_ofs_delta(prev_offset, &insert_only_delta(prev_len, result.as_bytes()));
        prev_len = result.len();
        oids.push(oid(5 - n));
    }
    repo.write_pack("23", &builder, &oids);

    let (db, report) = ObjectDb::open(repo.root(), NullParser, limits).unwrap();

    // Only the real root survives; all four chain links drop together.
    assert_eq!(db.len(), 1);
    assert!(db.contains(&oid(0xb0)));
    assert_eq!(report.skipped.len(), 4);
    for skip in &report.skipped {
        assert!(matches!(
            skip.reason,
            odbmap::SkipReason::ChainTooLong { max: 3 }
        ));
    }
}
