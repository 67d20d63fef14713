//! End-to-end fixtures for `gix_pack_stream::parse`, built programmatically
//! with `flate2` rather than checked-in binary packs, per `DESIGN.md`.
//!
//! Grouped into `mod`s by concern, matching `gix-pack`'s own
//! `tests/pack/data/file.rs` layout (`mod method`, `mod decode_entry`, ...).

use std::io::Write;
use std::sync::atomic::AtomicBool;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use gix_features::progress::Discard;
use gix_hash::{oid, ObjectId};
use gix_pack_stream::{parse, Error, ObjectKind, Options, PackedObjectInfo, Sink};

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn encode_size_header(type_tag: u8, mut size: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut first = (type_tag << 4) | (size & 0x0f) as u8;
    size >>= 4;
    if size > 0 {
        first |= 0x80;
    }
    bytes.push(first);
    while size > 0 {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
    bytes
}

fn encode_ofs_delta_distance(mut distance: u64) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    bytes
}

fn encode_varint_size(mut size: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if size == 0 {
            break;
        }
    }
    bytes
}

/// `copy(offset, size)` instruction bytes for a delta payload.
fn delta_copy(offset: u32, size: u32) -> Vec<u8> {
    let mut cmd = 0x80u8;
    let mut bytes = Vec::new();
    for i in 0..4 {
        let byte = (offset >> (8 * i)) as u8;
        if byte != 0 {
            cmd |= 1 << i;
            bytes.push(byte);
        }
    }
    for i in 0..3 {
        let byte = (size >> (8 * i)) as u8;
        if byte != 0 {
            cmd |= 1 << (4 + i);
            bytes.push(byte);
        }
    }
    let mut out = vec![cmd];
    out.extend(bytes);
    out
}

/// `insert(bytes)` instruction bytes for a delta payload.
fn delta_insert(bytes: &[u8]) -> Vec<u8> {
    assert!(!bytes.is_empty() && bytes.len() <= 0x7f);
    let mut out = vec![bytes.len() as u8];
    out.extend_from_slice(bytes);
    out
}

fn delta_payload(base_len: u64, result_len: u64, instructions: &[u8]) -> Vec<u8> {
    let mut payload = encode_varint_size(base_len);
    payload.extend(encode_varint_size(result_len));
    payload.extend_from_slice(instructions);
    payload
}

/// A single `copy(whole base)` instruction, used to chain long offset-delta
/// runs where each link just reproduces its parent unchanged.
fn delta_copy_whole(base_len: u32) -> Vec<u8> {
    delta_copy(0, base_len)
}

struct PackBuilder {
    entries: Vec<Vec<u8>>,
    count: u32,
}

impl PackBuilder {
    fn new() -> Self {
        PackBuilder {
            entries: Vec::new(),
            count: 0,
        }
    }

    fn offset(&self) -> u64 {
        12 + self.entries.iter().map(|e| e.len() as u64).sum::<u64>()
    }

    fn push_whole(&mut self, type_tag: u8, body: &[u8]) -> u64 {
        let offset = self.offset();
        let mut entry = encode_size_header(type_tag, body.len() as u64);
        entry.extend(deflate(body));
        self.entries.push(entry);
        self.count += 1;
        offset
    }

    fn push_ofs_delta(&mut self, base_offset: u64, payload: &[u8]) -> u64 {
        let offset = self.offset();
        let mut entry = encode_size_header(6, payload.len() as u64);
        entry.extend(encode_ofs_delta_distance(offset - base_offset));
        entry.extend(deflate(payload));
        self.entries.push(entry);
        self.count += 1;
        offset
    }

    fn push_ref_delta(&mut self, base_id: &oid, payload: &[u8]) -> u64 {
        let offset = self.offset();
        let mut entry = encode_size_header(7, payload.len() as u64);
        entry.extend_from_slice(base_id.as_bytes());
        entry.extend(deflate(payload));
        self.entries.push(entry);
        self.count += 1;
        offset
    }

    fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PACK");
        out.extend_from_slice(&2u32.to_be_bytes());
        out.extend_from_slice(&self.count.to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
        let mut hasher = gix_hash::hasher(gix_hash::Kind::Sha1);
        hasher.update(&out);
        let digest = hasher.try_finalize().expect("hash never collides in tests");
        out.extend_from_slice(digest.as_bytes());
        out
    }
}

#[derive(Default)]
struct TestSink {
    buffer: Vec<u8>,
    cursor: usize,
    crc: Option<crc32fast::Hasher>,
    local_objects: gix_hashtable::HashMap<ObjectId, (ObjectKind, Vec<u8>)>,
    appended: usize,
    /// When set, `on_append_base` declines inclusion for every thin-pack
    /// base it is asked about, while still returning `true`'s usual side
    /// effects are skipped — used to exercise that declined bases still get
    /// their children resolved.
    decline_append: bool,
}

impl TestSink {
    fn with_local_object(mut self, id: ObjectId, kind: ObjectKind, bytes: Vec<u8>) -> Self {
        self.local_objects.insert(id, (kind, bytes));
        self
    }

    fn declining_append(mut self) -> Self {
        self.decline_append = true;
        self
    }
}

impl Sink for TestSink {
    fn on_store_stream(&mut self, offset: u64, bytes: &[u8]) {
        let start = offset as usize;
        let end = start + bytes.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[start..end].copy_from_slice(bytes);
    }

    fn seek_database(&mut self, offset: u64) -> Result<(), Error> {
        self.cursor = offset as usize;
        self.crc = Some(crc32fast::Hasher::new());
        Ok(())
    }

    fn read_database(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let available = self.buffer.len().saturating_sub(self.cursor);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
        if let Some(crc) = &mut self.crc {
            crc.update(&buf[..n]);
        }
        self.cursor += n;
        Ok(n)
    }

    fn check_crc(&mut self, expected: u32) -> bool {
        let computed = self.crc.take().map(|crc| crc.finalize()).unwrap_or(0);
        computed == expected
    }

    fn find_local_object(&mut self, id: &oid, out: &mut Vec<u8>) -> Result<Option<ObjectKind>, Error> {
        match self.local_objects.get(id) {
            Some((kind, bytes)) => {
                out.clear();
                out.extend_from_slice(bytes);
                Ok(Some(*kind))
            }
            None => Ok(None),
        }
    }

    fn on_append_base(&mut self, _kind: ObjectKind, _bytes: &[u8], _info: &PackedObjectInfo) -> bool {
        if self.decline_append {
            return false;
        }
        self.appended += 1;
        true
    }
}

/// Hands the parser a `Cursor` over the fixture bytes, the way a real
/// transport would hand it any other `Read` implementation.
fn parse_pack(pack: Vec<u8>, sink: &mut TestSink, options: &Options) -> Result<gix_pack_stream::ParsedPack, Error> {
    let cursor = std::io::Cursor::new(pack);
    parse(Box::new(cursor), sink, options, &mut Discard, &AtomicBool::new(false))
}

mod whole_objects {
    use super::*;

    #[test]
    fn empty_pack_succeeds() {
        let pack = PackBuilder::new().finish();
        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("empty pack parses");
        assert!(outcome.objects.is_empty());
        assert_eq!(outcome.stats.whole_objects(), 0);
    }

    #[test]
    fn single_blob_gets_the_known_git_hash() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("single blob parses");

        assert_eq!(outcome.objects.len(), 1);
        let info = &outcome.objects[0];
        assert_eq!(info.kind, ObjectKind::Blob);
        assert_eq!(
            info.id,
            ObjectId::from_hex(b"ce013625030ba8dba906f756967f9e9ca394464a").unwrap()
        );
        assert_eq!(outcome.stats.blobs, 1);
    }

    #[test]
    fn commit_tree_blob_without_deltas_parses_in_order() {
        let mut builder = PackBuilder::new();
        builder.push_whole(1, b"commit body");
        builder.push_whole(2, b"tree body");
        builder.push_whole(3, b"blob body");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("parses");

        assert_eq!(outcome.objects.len(), 3);
        assert_eq!(outcome.objects[0].kind, ObjectKind::Commit);
        assert_eq!(outcome.objects[1].kind, ObjectKind::Tree);
        assert_eq!(outcome.objects[2].kind, ObjectKind::Blob);
        assert_eq!(outcome.stats.commits, 1);
        assert_eq!(outcome.stats.trees, 1);
        assert_eq!(outcome.stats.blobs, 1);
        assert_eq!(outcome.stats.total_deltas(), 0);
    }
}

mod offset_delta {
    use super::*;

    #[test]
    fn reconstructs_child_against_in_stream_base() {
        let mut builder = PackBuilder::new();
        let base_offset = builder.push_whole(3, b"hello\n");
        let instructions = {
            let mut i = delta_copy(0, 5); // "hello"
            i.extend(delta_insert(b"!\n"));
            i
        };
        let payload = delta_payload(6, 7, &instructions);
        builder.push_ofs_delta(base_offset, &payload);
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("parses");

        assert_eq!(outcome.objects.len(), 2);
        assert_eq!(outcome.stats.offset_deltas, 1);
        let child = &outcome.objects[1];
        assert_eq!(child.kind, ObjectKind::Blob);
        assert_ne!(child.id, outcome.objects[0].id);
    }

    /// spec.md §8: "Offset-delta chain of depth ≥ 50: resolves in bounded
    /// memory (peak held payloads ≤ depth)." Each link copies its parent
    /// unchanged and appends one more marker byte, so the final content's
    /// length is a direct check that every link in the chain actually ran.
    #[test]
    fn chain_of_depth_fifty_resolves() {
        const DEPTH: usize = 50;
        let mut builder = PackBuilder::new();
        let mut base_offset = builder.push_whole(3, b"x");
        let mut base_len = 1u32;

        for _ in 0..DEPTH {
            let result_len = base_len + 1;
            let instructions = {
                let mut i = delta_copy_whole(base_len);
                i.extend(delta_insert(b"x"));
                i
            };
            let payload = delta_payload(base_len as u64, result_len as u64, &instructions);
            base_offset = builder.push_ofs_delta(base_offset, &payload);
            base_len = result_len;
        }
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("deep delta chain resolves");

        assert_eq!(outcome.objects.len(), DEPTH + 1);
        assert_eq!(outcome.stats.offset_deltas, DEPTH as u64);
        let tip = outcome.objects.iter().find(|info| info.offset == Some(base_offset)).unwrap();
        assert_eq!(tip.kind, ObjectKind::Blob);
    }

    /// spec.md §4.3 point 3: the computed base position "must be positive".
    /// A distance equal to the entry's own stream offset resolves to base
    /// position 0 — the `PACK` magic, never a valid object — and must be
    /// rejected right at header-decode time, not surface later as a vague
    /// `UnresolvedDeltas`.
    #[test]
    fn base_distance_pointing_at_the_pack_header_is_rejected() {
        let mut builder = PackBuilder::new();
        let payload = delta_payload(1, 2, &{
            let mut i = delta_copy(0, 1);
            i.extend(delta_insert(b"!"));
            i
        });
        // base_offset 0 makes the computed distance equal this entry's own
        // stream offset, i.e. a base position of exactly 0 (the `PACK`
        // magic), the boundary spec.md §4.3 point 3 requires rejecting.
        builder.push_ofs_delta(0, &payload);
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let err = parse_pack(pack, &mut sink, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::CorruptObject { .. }));
    }
}

mod ref_delta {
    use super::*;

    #[test]
    fn resolves_once_its_base_arrives_later_in_stream() {
        let mut builder = PackBuilder::new();
        // The ref-delta entry is written first; its base, a whole blob, follows.
        let base_id_placeholder = ObjectId::null(gix_hash::Kind::Sha1);
        let instructions = {
            let mut i = delta_copy(0, 5);
            i.extend(delta_insert(b"!\n"));
            i
        };
        let payload = delta_payload(6, 7, &instructions);
        // We need the base's id ahead of time since ref-deltas key by id, not
        // position; computing it requires knowing the base bytes up front.
        let base_id = {
            let mut hasher = gix_hash::hasher(gix_hash::Kind::Sha1);
            hasher.update(b"blob");
            hasher.update(b" ");
            hasher.update(b"6");
            hasher.update(b"\0");
            hasher.update(b"hello\n");
            hasher.try_finalize().unwrap()
        };
        assert_ne!(base_id, base_id_placeholder);
        let delta_offset = builder.push_ref_delta(&base_id, &payload);
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("parses");

        assert_eq!(outcome.objects.len(), 2);
        assert_eq!(outcome.stats.ref_deltas, 1);
        let delta_child = outcome.objects.iter().find(|info| info.offset == Some(delta_offset)).unwrap();
        assert_eq!(delta_child.kind, ObjectKind::Blob);
    }
}

mod thin_pack {
    use super::*;

    fn single_ref_delta_pack(base_id: &oid) -> Vec<u8> {
        let instructions = {
            let mut i = delta_copy(0, 5);
            i.extend(delta_insert(b"!\n"));
            i
        };
        let payload = delta_payload(6, 7, &instructions);
        let mut builder = PackBuilder::new();
        builder.push_ref_delta(base_id, &payload);
        builder.finish()
    }

    #[test]
    fn completes_against_a_sink_supplied_base() {
        let base_bytes = b"hello\n".to_vec();
        let base_id = {
            let mut hasher = gix_hash::hasher(gix_hash::Kind::Sha1);
            hasher.update(b"blob 6\0");
            hasher.update(&base_bytes);
            hasher.try_finalize().unwrap()
        };
        let pack = single_ref_delta_pack(&base_id);

        let mut sink = TestSink::default().with_local_object(base_id, ObjectKind::Blob, base_bytes);
        let mut options = Options::default();
        options.allow_thin = true;
        let outcome = parse_pack(pack, &mut sink, &options).expect("thin pack completes");

        assert_eq!(outcome.objects.len(), 2);
        assert_eq!(sink.appended, 1);
        let appended = outcome.objects.iter().find(|info| info.offset.is_none()).unwrap();
        assert_eq!(appended.id, base_id);
    }

    /// spec.md §4.5: "ask the sink to open the base...; if successful, let
    /// the sink decide whether to append it..., then resolve its children
    /// as above." `on_append_base` gates only list membership — a sink that
    /// declines must still see its children resolved, and the parse must
    /// still succeed with zero remaining unresolved deltas.
    #[test]
    fn resolves_children_even_when_the_sink_declines_to_append_the_base() {
        let base_bytes = b"hello\n".to_vec();
        let base_id = {
            let mut hasher = gix_hash::hasher(gix_hash::Kind::Sha1);
            hasher.update(b"blob 6\0");
            hasher.update(&base_bytes);
            hasher.try_finalize().unwrap()
        };
        let pack = single_ref_delta_pack(&base_id);

        let mut sink = TestSink::default()
            .with_local_object(base_id, ObjectKind::Blob, base_bytes)
            .declining_append();
        let mut options = Options::default();
        options.allow_thin = true;
        let outcome = parse_pack(pack, &mut sink, &options).expect("declined base still resolves its children");

        assert_eq!(sink.appended, 0, "the base itself was declined");
        assert_eq!(
            outcome.objects.len(),
            1,
            "only the in-stream delta child is in the final list, not the declined base"
        );
        assert_ne!(outcome.objects[0].id, base_id);
    }

    #[test]
    fn without_allow_thin_fails_with_unresolved_deltas() {
        let base_id = ObjectId::from_hex(b"ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let pack = single_ref_delta_pack(&base_id);

        let mut sink = TestSink::default();
        let err = parse_pack(pack, &mut sink, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDeltas { .. }));
    }

    #[test]
    fn new_and_base_object_id_enumeration_respects_options() {
        let base_bytes = b"hello\n".to_vec();
        let base_id = ObjectId::from_hex(b"ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let pack = single_ref_delta_pack(&base_id);

        let mut sink = TestSink::default().with_local_object(base_id, ObjectKind::Blob, base_bytes);
        let mut options = Options::default();
        options.allow_thin = true;
        options.need_new_object_ids = true;
        options.need_base_object_ids = true;
        let outcome = parse_pack(pack, &mut sink, &options).expect("thin pack with id enumeration");

        assert_eq!(outcome.new_object_ids.as_ref().unwrap().len(), 1);
        assert_eq!(outcome.base_object_ids.as_ref().unwrap().len(), 1);
        assert_eq!(outcome.base_object_ids.unwrap()[0], base_id);
    }

    #[test]
    fn disabled_enumeration_options_leave_fields_empty() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let outcome = parse_pack(pack, &mut sink, &Options::default()).expect("parses");
        assert!(outcome.new_object_ids.is_none());
        assert!(outcome.base_object_ids.is_none());
    }
}

mod size_limit {
    use super::*;

    #[test]
    fn object_exceeding_limit_fails() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let mut options = Options::default();
        options.max_object_size = 5; // "hello\n" is 6 bytes
        let err = parse_pack(pack, &mut sink, &options).unwrap_err();
        assert!(matches!(err, Error::TooLargeObject { .. }));
    }

    #[test]
    fn object_at_exactly_the_limit_succeeds() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let mut options = Options::default();
        options.max_object_size = 6;
        parse_pack(pack, &mut sink, &options).expect("exactly-at-limit object parses");
    }
}

mod corruption {
    use super::*;

    #[test]
    fn truncated_stream_fails_with_unexpected_end() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let mut pack = builder.finish();
        pack.truncate(pack.len() - 3);

        let mut sink = TestSink::default();
        let err = parse_pack(pack, &mut sink, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEnd { .. } | Error::CorruptObject { .. }));
    }

    #[test]
    fn corrupted_trailing_digest_is_rejected() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let mut pack = builder.finish();
        let last = pack.len() - 1;
        pack[last] ^= 0xff;

        let mut sink = TestSink::default();
        let err = parse_pack(pack, &mut sink, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::CorruptObject { .. }));
    }
}

mod collision {
    use super::*;

    #[test]
    fn with_local_object_is_detected() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let colliding_id = ObjectId::from_hex(b"ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let mut sink = TestSink::default().with_local_object(colliding_id, ObjectKind::Blob, b"different content".to_vec());
        let err = parse_pack(pack, &mut sink, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::CollisionDetected { .. }));
    }

    #[test]
    fn matching_local_object_is_not_a_collision() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let id = ObjectId::from_hex(b"ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let mut sink = TestSink::default().with_local_object(id, ObjectKind::Blob, b"hello\n".to_vec());
        parse_pack(pack, &mut sink, &Options::default()).expect("identical local object is not a collision");
    }

    #[test]
    fn check_can_be_disabled() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let id = ObjectId::from_hex(b"ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let mut sink = TestSink::default().with_local_object(id, ObjectKind::Blob, b"different".to_vec());
        let mut options = Options::default();
        options.check_object_collisions = false;
        parse_pack(pack, &mut sink, &options).expect("collision check disabled");
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn is_observed_at_an_object_boundary() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        builder.push_whole(1, b"second object");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let cancel = AtomicBool::new(true);
        let err = parse(Box::new(std::io::Cursor::new(pack)), &mut sink, &Options::default(), &mut Discard, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}

mod object_checker {
    use super::*;
    use gix_pack_stream::ObjectChecker;
    use std::sync::Arc;

    struct RejectEverything;
    impl ObjectChecker for RejectEverything {
        fn check(&self, _kind: ObjectKind, _bytes: &[u8]) -> Result<(), String> {
            Err("rejected for testing".into())
        }
    }

    #[test]
    fn can_reject_structurally_invalid_content() {
        let mut builder = PackBuilder::new();
        builder.push_whole(3, b"hello\n");
        let pack = builder.finish();

        let mut sink = TestSink::default();
        let mut options = Options::default();
        options.object_checker = Some(Arc::new(RejectEverything));
        let err = parse_pack(pack, &mut sink, &options).unwrap_err();
        assert!(matches!(err, Error::InvalidObject { .. }));
    }
}
