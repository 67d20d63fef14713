//! The scan phase, per spec.md §4.4.

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use gix_features::progress::Progress;
use gix_hash::ObjectId;

use crate::collision;
use crate::error::Error;
use crate::hash::{object_id, StreamHasher};
use crate::header;
use crate::index::{DeltaIndex, UnresolvedDelta};
use crate::options::Options;
use crate::reader::{ForwardSource, Window};
use crate::sink::Sink;
use crate::stats::PackStatistics;
use crate::types::{EntryHeader, ObjectKind, PackedObjectInfo};
use crate::zlib::Decompressor;

const MAGIC: &[u8; 4] = b"PACK";

pub(crate) struct ScanOutcome {
    pub(crate) objects: Vec<Option<PackedObjectInfo>>,
    pub(crate) offset_to_index: HashMap<u64, u32>,
    /// Indices of `objects` that were whole objects, in scan order — the
    /// roots the resolve phase walks (spec.md §4.5: "process every whole
    /// object in order"). Kept separate from `objects` itself so the
    /// resolve phase's own writes into delta slots never get mistaken for
    /// additional roots.
    pub(crate) whole_object_indices: Vec<u32>,
    pub(crate) delta_index: DeltaIndex,
    pub(crate) stats: PackStatistics,
    /// Bytes already buffered past the pack footer, captured only when
    /// `options.expect_data_after_pack_footer` is set (spec.md §6): the
    /// caller expects more data to follow and wants whatever the window had
    /// already pulled in rather than losing it when the window is dropped.
    pub(crate) trailing_bytes: Option<Vec<u8>>,
}

fn read_be_u32<Src: crate::reader::ByteSource>(window: &mut Window<Src>, context: &'static str) -> Result<u32, Error> {
    window.fill(4, context)?;
    let (_, bytes) = window.consume(4);
    Ok(u32::from_be_bytes(bytes.try_into().expect("exactly 4 bytes")))
}

/// Run the scan phase over `input`, driving `sink` as described in spec.md §6.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run<S: Sink>(
    input: Box<dyn Read>,
    sink: &mut S,
    options: &Options,
    progress: &mut dyn Progress,
    should_cancel: &AtomicBool,
) -> Result<ScanOutcome, Error> {
    let mut window = Window::new(ForwardSource { inner: input });
    let mut hasher = StreamHasher::new(options.hash_kind);

    window.fill(4, "pack magic")?;
    let (pos, bytes) = window.consume(4);
    if bytes != MAGIC {
        return Err(Error::corrupt(pos, "missing 'PACK' magic"));
    }
    hasher.update(bytes);
    sink.on_store_stream(pos, bytes);

    let version_pos = window.stream_position();
    let version = read_be_u32(&mut window, "pack version")?;
    {
        let (pos, bytes) = (version_pos, &version.to_be_bytes()[..]);
        hasher.update(bytes);
        sink.on_store_stream(pos, bytes);
    }
    if version != 2 && version != 3 {
        return Err(Error::corrupt(version_pos, format!("unsupported pack version {version}")));
    }

    let count_pos = window.stream_position();
    let declared_count = read_be_u32(&mut window, "pack object count")?;
    {
        let (pos, bytes) = (count_pos, &declared_count.to_be_bytes()[..]);
        hasher.update(bytes);
        sink.on_store_stream(pos, bytes);
    }

    let effective_count = sink.on_pack_header(version, declared_count).unwrap_or(declared_count);
    #[cfg(feature = "tracing")]
    tracing::debug!(version, declared_count, effective_count, "scanning pack stream");

    let mut objects: Vec<Option<PackedObjectInfo>> = vec![None; effective_count as usize];
    let mut offset_to_index = HashMap::with_capacity(effective_count as usize);
    let mut whole_object_indices = Vec::new();
    let mut delta_index = DeltaIndex::new();
    let mut stats = PackStatistics::default();
    let object_hash_len = options.hash_kind.len_in_bytes();
    let mut decompressor = Decompressor::new();

    for index in 0..effective_count {
        if should_cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }

        let decoded = header::decode(&mut window, object_hash_len)?;
        let entry_offset = decoded.header.stream_offset;
        offset_to_index.insert(entry_offset, index);
        hasher.update(&decoded.raw);
        sink.on_store_stream(entry_offset, &decoded.raw);
        sink.on_object_header(entry_offset, &decoded.raw);

        if decoded.header.inflated_size > options.max_object_size {
            return Err(Error::TooLargeObject {
                offset: entry_offset,
                size: decoded.header.inflated_size,
                limit: options.max_object_size,
            });
        }

        let mut crc = crc32fast::Hasher::new();
        crc.update(&decoded.raw);

        match decoded.header.header {
            EntryHeader::Whole(kind) => {
                sink.on_begin_whole_object(entry_offset, kind, decoded.header.inflated_size);
                let body = decompressor.inflate(&mut window, decoded.header.inflated_size, entry_offset, |pos, bytes| {
                    hasher.update(bytes);
                    sink.on_store_stream(pos, bytes);
                    sink.on_object_data(pos, bytes);
                    crc.update(bytes);
                })?;
                if let Some(checker) = &options.object_checker {
                    checker
                        .check(kind, &body)
                        .map_err(|message| Error::InvalidObject { offset: entry_offset, message })?;
                }
                let id = object_id(kind, &body, options.hash_kind)?;
                let crc32 = crc.finalize();
                collision::check(sink, &id, &body, options.check_object_collisions)?;
                let info = sink.new_info(id, kind, Some(entry_offset), Some(crc32), None);
                sink.on_inflated_object_data(&info, kind, &body);
                sink.on_end_whole_object(&info);
                stats.record_whole(kind);
                stats.bytes_read = window.stream_position();
                objects[index as usize] = Some(info);
                whole_object_indices.push(index);
            }
            EntryHeader::OfsDelta { base_distance } => {
                let base_offset = entry_offset - base_distance;
                sink.on_begin_ofs_delta(entry_offset, base_offset, decoded.header.inflated_size);
                decompressor.inflate(&mut window, decoded.header.inflated_size, entry_offset, |pos, bytes| {
                    hasher.update(bytes);
                    sink.on_store_stream(pos, bytes);
                    sink.on_object_data(pos, bytes);
                    crc.update(bytes);
                })?;
                let crc32 = crc.finalize();
                sink.on_end_delta();
                delta_index.push_ofs(
                    base_offset,
                    UnresolvedDelta {
                        stream_offset: entry_offset,
                        crc32,
                    },
                );
                stats.offset_deltas += 1;
                stats.bytes_read = window.stream_position();
            }
            EntryHeader::RefDelta { base_id } => {
                sink.on_begin_ref_delta(entry_offset, base_id.as_ref(), decoded.header.inflated_size);
                decompressor.inflate(&mut window, decoded.header.inflated_size, entry_offset, |pos, bytes| {
                    hasher.update(bytes);
                    sink.on_store_stream(pos, bytes);
                    sink.on_object_data(pos, bytes);
                    crc.update(bytes);
                })?;
                let crc32 = crc.finalize();
                sink.on_end_delta();
                delta_index.push_ref(
                    base_id,
                    UnresolvedDelta {
                        stream_offset: entry_offset,
                        crc32,
                    },
                );
                stats.ref_deltas += 1;
                stats.bytes_read = window.stream_position();
            }
        }

        progress.inc();
    }

    let digest_len = object_hash_len;
    window.fill(digest_len, "trailing pack digest")?;
    let (_, trailer_bytes) = window.consume(digest_len);
    let expected = ObjectId::from_bytes_or_panic(trailer_bytes);
    let computed = hasher.finalize()?;
    if expected != computed {
        return Err(Error::corrupt(
            window.stream_position(),
            "trailing pack digest does not match the hash of the preceding bytes",
        ));
    }
    sink.on_pack_footer(expected.as_ref());

    if options.check_eof_after_pack_footer && !window.unconsumed().is_empty() {
        return Err(Error::corrupt(
            window.stream_position(),
            "unexpected bytes found after the pack footer",
        ));
    }

    let trailing_bytes = options
        .expect_data_after_pack_footer
        .then(|| window.unconsumed().to_vec());

    Ok(ScanOutcome {
        objects,
        offset_to_index,
        whole_object_indices,
        delta_index,
        stats,
        trailing_bytes,
    })
}
