//! The collaborator contract, per spec.md §6 ("Sink interface") and §9's
//! re-design note: "expose a *sink capability set* ... no inheritance
//! required". A single trait replaces the abstract-base-class-with-hooks
//! shape of the upstream parser; every purely observational callback has a
//! no-op default so a minimal sink implements only the I/O-bearing and
//! decision-bearing methods.

use gix_hash::{oid, ObjectId};

use crate::error::Error;
use crate::types::{ObjectKind, PackedObjectInfo};

/// Identifies which kind of base a newly-minted [`PackedObjectInfo`] was
/// reconstructed against, passed to [`Sink::new_info`] (spec.md §6:
/// "newInfo(id, delta?, deltaBaseId?)").
#[derive(Debug, Clone, Copy)]
pub enum DeltaBase {
    Offset(u64),
    Ref(ObjectId),
}

pub trait Sink {
    /// Called once, right after the 12-byte pack header is decoded. Returning
    /// `Some(n)` overrides the header's own object count (spec.md §6:
    /// "opportunity for the sink to override the expected count").
    fn on_pack_header(&mut self, _version: u32, _count: u32) -> Option<u32> {
        None
    }

    /// Raw forward bytes, in stream order, excluding the final trailing
    /// digest (which arrives via [`Sink::on_pack_footer`] instead).
    fn on_store_stream(&mut self, _offset: u64, _bytes: &[u8]) {}

    /// Framed per-object header bytes.
    fn on_object_header(&mut self, _offset: u64, _bytes: &[u8]) {}

    /// Deflated object-body bytes; may be called multiple times per object.
    fn on_object_data(&mut self, _offset: u64, _bytes: &[u8]) {}

    fn on_begin_whole_object(&mut self, _stream_pos: u64, _kind: ObjectKind, _inflated_size: u64) {}
    fn on_end_whole_object(&mut self, _info: &PackedObjectInfo) {}

    fn on_begin_ofs_delta(&mut self, _stream_pos: u64, _base_pos: u64, _inflated_size: u64) {}
    fn on_begin_ref_delta(&mut self, _stream_pos: u64, _base_id: &oid, _inflated_size: u64) {}
    fn on_end_delta(&mut self) {}

    /// Reconstructed content; not called for blobs whose content was
    /// streamed straight through the hasher without materializing, per
    /// spec.md §4.4 (this crate always materializes, see `DESIGN.md`, so in
    /// practice this fires for every resolved object).
    fn on_inflated_object_data(&mut self, _info: &PackedObjectInfo, _kind: ObjectKind, _bytes: &[u8]) {}

    /// Asked during thin-pack completion whether to include an externally
    /// supplied base in the final object list. Default: include it.
    fn on_append_base(&mut self, _kind: ObjectKind, _bytes: &[u8], _info: &PackedObjectInfo) -> bool {
        true
    }

    fn on_end_thin_pack(&mut self) {}

    /// The verified trailing 20 (or 32, for SHA-256) byte stream digest.
    fn on_pack_footer(&mut self, _digest: &oid) {}

    /// Position the re-read cursor at `offset` within the pack's own
    /// already-stored bytes (as previously handed to [`Sink::on_store_stream`]).
    /// Implementations typically seek into a temp file or an mmap. Must
    /// reset whatever CRC state it accumulates from [`Sink::read_database`].
    fn seek_database(&mut self, offset: u64) -> Result<(), Error>;

    /// Read forward from the cursor positioned by [`Sink::seek_database`],
    /// exactly like [`std::io::Read::read`] (`0` means exhausted). The sink
    /// folds every returned byte into the CRC-32 state [`Sink::check_crc`]
    /// later inspects; the parser's contract in return is to never request
    /// more bytes than belong to the object currently being re-read (no
    /// speculative read-ahead past its end), so "since `seek_database`
    /// through the last `read_database` call" and "this object's bytes"
    /// coincide.
    fn read_database(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Compare `expected` (the CRC-32 recorded for this object during the
    /// scan phase) against what the sink has accumulated over its own
    /// [`Sink::read_database`] calls since the matching [`Sink::seek_database`].
    fn check_crc(&mut self, expected: u32) -> bool;

    /// Look up an object already known to the local store by id — used both
    /// to fetch thin-pack bases (spec.md §4.5) and to fetch bytes to compare
    /// against during collision checking (spec.md §4.6). `out` is filled
    /// with the object's raw content on a hit.
    fn find_local_object(&mut self, id: &oid, out: &mut Vec<u8>) -> Result<Option<ObjectKind>, Error>;

    /// Factory for a per-object handle, carrying whatever bookkeeping the
    /// sink itself needs (spec.md §6: "newInfo(id, delta?, deltaBaseId?)").
    fn new_info(&mut self, id: ObjectId, kind: ObjectKind, offset: Option<u64>, crc32: Option<u32>, _delta_base: Option<DeltaBase>) -> PackedObjectInfo {
        PackedObjectInfo {
            id,
            kind,
            offset,
            crc32,
        }
    }
}
