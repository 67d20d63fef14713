//! The resolve phase, per spec.md §4.5.
//!
//! Deltas are walked depth-first starting from each whole object recorded
//! during the scan phase. Per the re-design note in spec.md §9 ("model as an
//! explicit stack of frames where each frame owns its inflated payload"),
//! the walk uses an explicit [`Vec`]-backed stack of `(info, content)` pairs
//! instead of recursion, so a long delta chain never grows the native call
//! stack.

use std::sync::atomic::{AtomicBool, Ordering};

use gix_features::progress::Progress;
use gix_hash::ObjectId;

use crate::collision;
use crate::delta;
use crate::error::Error;
use crate::hash::object_id;
use crate::header;
use crate::index::UnresolvedDelta;
use crate::options::Options;
use crate::reader::Window;
use crate::scan::ScanOutcome;
use crate::sink::{DeltaBase, Sink};
use crate::types::{EntryHeader, ObjectKind, PackedObjectInfo};
use crate::zlib::Decompressor;

/// Re-read and decompress the single entry at `offset` through the sink's
/// database cursor. Returns the decoded header together with the inflated
/// body (for a whole object, the object's content; for a delta, the delta
/// payload still awaiting [`delta::apply`]). Checks the CRC-32 the sink
/// accumulated across exactly this re-read against `expected_crc32`
/// (spec.md §4.5 point 1).
fn read_entry<S: Sink>(
    sink: &mut S,
    offset: u64,
    expected_crc32: u32,
    object_hash_len: usize,
    decompressor: &mut Decompressor,
    options: &Options,
) -> Result<(EntryHeader, Vec<u8>), Error> {
    sink.seek_database(offset)?;
    let mut window = Window::new(|buf: &mut [u8]| sink.read_database(buf));
    let decoded = header::decode(&mut window, object_hash_len)?;
    if decoded.header.inflated_size > options.max_object_size {
        return Err(Error::TooLargeObject {
            offset,
            size: decoded.header.inflated_size,
            limit: options.max_object_size,
        });
    }
    let body = decompressor.inflate(&mut window, decoded.header.inflated_size, offset, |_, _| {})?;
    if !sink.check_crc(expected_crc32) {
        return Err(Error::corrupt(
            offset,
            "CRC-32 of re-read bytes does not match the value recorded during scan",
        ));
    }
    Ok((decoded.header.header, body))
}

/// Reconstruct the content of the delta entry `delta` against `base_content`,
/// compute its id, and hand the result to the sink (spec.md §4.5 points 1-4).
fn resolve_one_delta<S: Sink>(
    sink: &mut S,
    delta: UnresolvedDelta,
    base_content: &[u8],
    kind: ObjectKind,
    base: DeltaBase,
    object_hash_len: usize,
    decompressor: &mut Decompressor,
    options: &Options,
) -> Result<(PackedObjectInfo, Vec<u8>), Error> {
    let (entry_header, payload) = read_entry(
        sink,
        delta.stream_offset,
        delta.crc32,
        object_hash_len,
        decompressor,
        options,
    )?;
    match entry_header {
        EntryHeader::OfsDelta { .. } | EntryHeader::RefDelta { .. } => {}
        EntryHeader::Whole(_) => {
            return Err(Error::corrupt(
                delta.stream_offset,
                "re-read entry header no longer decodes as a delta",
            ))
        }
    }

    let (base_size, result_size, header_len) = delta::decode_payload_header(&payload, delta.stream_offset)?;
    if base_size != base_content.len() as u64 {
        return Err(Error::corrupt(
            delta.stream_offset,
            format!(
                "delta declares a base of {base_size} bytes but the resolved base is {} bytes",
                base_content.len()
            ),
        ));
    }
    let content = delta::apply(
        base_content,
        &payload[header_len..],
        result_size,
        delta.stream_offset,
        options.max_object_size,
    )?;

    if let Some(checker) = &options.object_checker {
        checker
            .check(kind, &content)
            .map_err(|message| Error::InvalidObject {
                offset: delta.stream_offset,
                message,
            })?;
    }
    let id = object_id(kind, &content, options.hash_kind)?;
    #[cfg(feature = "tracing")]
    tracing::trace!(offset = delta.stream_offset, %id, "resolved delta");
    collision::check(sink, &id, &content, options.check_object_collisions)?;
    let info = sink.new_info(id, kind, Some(delta.stream_offset), Some(delta.crc32), Some(base));
    sink.on_inflated_object_data(&info, kind, &content);
    sink.on_end_delta();
    Ok((info, content))
}

/// Gather every delta still waiting on `info`, whether registered by this
/// object's in-stream offset (offset-deltas) or by its id (ref-deltas) —
/// both maps must be consulted for every materialized object since a
/// ref-delta may target any object regardless of how it itself arrived.
fn take_children(scan: &mut ScanOutcome, info: &PackedObjectInfo) -> Vec<UnresolvedDelta> {
    let mut children = match info.offset {
        Some(offset) => scan.delta_index.take_children_by_offset(offset),
        None => Vec::new(),
    };
    children.extend(scan.delta_index.take_children_by_id(&info.id));
    children
}

/// Run the resolve phase over the output of [`crate::scan::run`], walking
/// every delta chain to completion and, if `options.allow_thin`, completing
/// any chains whose root base lives outside the pack (spec.md §4.5's
/// thin-pack paragraph).
pub(crate) fn run<S: Sink>(
    scan: &mut ScanOutcome,
    sink: &mut S,
    options: &Options,
    progress: &mut dyn Progress,
    should_cancel: &AtomicBool,
) -> Result<(), Error> {
    let object_hash_len = options.hash_kind.len_in_bytes();
    let mut decompressor = Decompressor::new();

    // Explicit DFS stack: each frame is a materialized object's id/kind/
    // offset handle together with its full content, since resolving a
    // child requires the parent's bytes as the delta base.
    let mut stack: Vec<(PackedObjectInfo, Vec<u8>)> = Vec::new();

    for &root_index in &scan.whole_object_indices.clone() {
        if should_cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        let root_info = scan.objects[root_index as usize]
            .clone()
            .expect("whole_object_indices only names populated slots");
        let root_offset = root_info.offset.expect("whole objects always carry a stream offset");
        let (_entry_header, content) = read_entry(
            sink,
            root_offset,
            root_info.crc32.expect("whole objects always carry a crc32"),
            object_hash_len,
            &mut decompressor,
            options,
        )?;
        stack.push((root_info, content));

        while let Some((parent_info, parent_content)) = stack.pop() {
            if should_cancel.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }
            let kind = parent_info.kind;
            let base = parent_info
                .offset
                .map(DeltaBase::Offset)
                .unwrap_or(DeltaBase::Ref(parent_info.id));
            for child in take_children(scan, &parent_info) {
                let child_index = *scan
                    .offset_to_index
                    .get(&child.stream_offset)
                    .expect("every registered delta corresponds to a scanned entry");
                let (child_info, child_content) = resolve_one_delta(
                    sink,
                    child,
                    &parent_content,
                    kind,
                    base,
                    object_hash_len,
                    &mut decompressor,
                    options,
                )?;
                scan.objects[child_index as usize] = Some(child_info.clone());
                stack.push((child_info, child_content));
            }
            progress.inc();
        }
    }

    if !scan.delta_index.is_empty() {
        complete_thin_pack(scan, sink, options, &mut decompressor, object_hash_len, progress, should_cancel)?;
    }

    Ok(())
}

/// Complete a thin pack: for each delta-chain head whose base never arrived
/// in-stream, ask the sink for it by id, append it to the output if the sink
/// agrees, and resolve its now-unblocked children (spec.md §4.5's
/// thin-pack paragraph).
fn complete_thin_pack<S: Sink>(
    scan: &mut ScanOutcome,
    sink: &mut S,
    options: &Options,
    decompressor: &mut Decompressor,
    object_hash_len: usize,
    progress: &mut dyn Progress,
    should_cancel: &AtomicBool,
) -> Result<(), Error> {
    if !options.allow_thin {
        return Err(Error::UnresolvedDeltas {
            count: scan.delta_index.remaining_count(),
        });
    }

    let heads: Vec<ObjectId> = scan.delta_index.remaining_ref_delta_heads().collect();
    let mut stack: Vec<(PackedObjectInfo, Vec<u8>)> = Vec::new();

    for base_id in heads {
        if should_cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        let mut content = Vec::new();
        let kind = sink
            .find_local_object(&base_id, &mut content)?
            .ok_or(Error::MissingObject { id: base_id })?;
        let info = sink.new_info(base_id, kind, None, None, None);
        // `on_append_base` only decides whether this base joins the final
        // object list (spec.md §6); its children are resolved regardless —
        // otherwise a sink declining inclusion would strand them in
        // `DeltaIndex` forever and the parse would spuriously end in
        // `UnresolvedDeltas` (spec.md §4.5: "if successful, let the sink
        // decide whether to append it..., then resolve its children as
        // above").
        if sink.on_append_base(kind, &content, &info) {
            scan.objects.push(Some(info.clone()));
            scan.stats.appended_bases += 1;
        }
        stack.push((info, content));

        while let Some((parent_info, parent_content)) = stack.pop() {
            if should_cancel.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }
            let kind = parent_info.kind;
            let base = DeltaBase::Ref(parent_info.id);
            for child in take_children(scan, &parent_info) {
                let child_index = *scan
                    .offset_to_index
                    .get(&child.stream_offset)
                    .expect("every registered delta corresponds to a scanned entry");
                let (child_info, child_content) = resolve_one_delta(
                    sink,
                    child,
                    &parent_content,
                    kind,
                    base,
                    object_hash_len,
                    decompressor,
                    options,
                )?;
                scan.objects[child_index as usize] = Some(child_info.clone());
                stack.push((child_info, child_content));
            }
            progress.inc();
        }
    }

    if !scan.delta_index.is_empty() {
        return Err(Error::UnresolvedDeltas {
            count: scan.delta_index.remaining_count(),
        });
    }
    sink.on_end_thin_pack();
    Ok(())
}
