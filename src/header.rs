//! Per-object header decoding, per spec.md §4.3.

use gix_hash::ObjectId;
use smallvec::SmallVec;

use crate::error::Error;
use crate::reader::{ByteSource, Window};
use crate::types::{EntryHeader, Header, ObjectKind};

/// A decoded header together with the exact raw bytes it was parsed from —
/// captured byte-by-byte as they're read rather than sliced out of the
/// window afterwards, since a window compaction between reads would have
/// already moved them (spec.md §4.1's window has no notion of "this span is
/// still needed for later slicing").
pub(crate) struct Decoded {
    pub(crate) header: Header,
    pub(crate) raw: SmallVec<[u8; 32]>,
}

/// Decode one entry header at the window's current position.
///
/// `object_hash_len` is the size in bytes of a ref-delta base id (20 for
/// SHA-1, 32 for SHA-256).
pub(crate) fn decode<Src: ByteSource>(window: &mut Window<Src>, object_hash_len: usize) -> Result<Decoded, Error> {
    let stream_offset = window.stream_position();
    let mut raw = SmallVec::<[u8; 32]>::new();

    let first = read_tracked(window, &mut raw, "object header")?;
    let type_tag = (first >> 4) & 0b0111;
    let mut size = u64::from(first & 0b0000_1111);
    let mut shift = 4u32;
    let mut more = first & 0b1000_0000 != 0;
    while more {
        let byte = read_tracked(window, &mut raw, "object header size")?;
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
        more = byte & 0x80 != 0;
    }

    let header = match type_tag {
        1 => EntryHeader::Whole(ObjectKind::Commit),
        2 => EntryHeader::Whole(ObjectKind::Tree),
        3 => EntryHeader::Whole(ObjectKind::Blob),
        4 => EntryHeader::Whole(ObjectKind::Tag),
        6 => {
            let distance = decode_ofs_delta_distance(window, &mut raw)?;
            if distance == 0 || distance >= stream_offset {
                return Err(Error::corrupt(
                    stream_offset,
                    "offset-delta base distance does not point to an earlier position",
                ));
            }
            EntryHeader::OfsDelta {
                base_distance: distance,
            }
        }
        7 => {
            for _ in 0..object_hash_len {
                read_tracked(window, &mut raw, "ref-delta base id")?;
            }
            let id = ObjectId::from_bytes_or_panic(&raw[raw.len() - object_hash_len..]);
            EntryHeader::RefDelta { base_id: id }
        }
        other => {
            return Err(Error::corrupt(
                stream_offset,
                format!("unknown pack entry type tag {other}"),
            ))
        }
    };

    let header_len = raw.len() as u64;
    Ok(Decoded {
        header: Header {
            header,
            inflated_size: size,
            stream_offset,
            header_len,
        },
        raw,
    })
}

fn read_tracked<Src: ByteSource>(
    window: &mut Window<Src>,
    raw: &mut SmallVec<[u8; 32]>,
    context: &'static str,
) -> Result<u8, Error> {
    let byte = window.read_one(context)?;
    raw.push(byte);
    Ok(byte)
}

/// Decode the "negative offset" varint used by offset-deltas: each
/// continuation byte adds one before shifting, the classical layout used by
/// the upstream pack format (spec.md §4.3 point 3).
fn decode_ofs_delta_distance<Src: ByteSource>(
    window: &mut Window<Src>,
    raw: &mut SmallVec<[u8; 32]>,
) -> Result<u64, Error> {
    let mut byte = read_tracked(window, raw, "offset-delta distance")?;
    let mut distance = u64::from(byte & 0x7f);
    while byte & 0x80 != 0 {
        byte = read_tracked(window, raw, "offset-delta distance")?;
        distance = (distance + 1) << 7 | u64::from(byte & 0x7f);
    }
    Ok(distance)
}
