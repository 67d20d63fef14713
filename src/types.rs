use gix_hash::ObjectId;

/// The four semantic object types a pack stream can carry as a whole object.
///
/// This mirrors `gix_object::Kind` in spirit; we keep our own copy so the
/// numeric pack type-tag mapping (1..4) lives right next to the type it
/// names, rather than depending on `gix-object`'s own type-code table which
/// is oriented around loose-object headers, not pack entry headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// The ASCII keyword used in the object-id hash preimage (`"blob"`, `"tree"`, ...).
    pub fn as_keyword(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }
}

impl From<ObjectKind> for gix_object::Kind {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Commit => gix_object::Kind::Commit,
            ObjectKind::Tree => gix_object::Kind::Tree,
            ObjectKind::Blob => gix_object::Kind::Blob,
            ObjectKind::Tag => gix_object::Kind::Tag,
        }
    }
}

/// What kind of entry a pack-stream record decodes to, per spec.md §4.3.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EntryHeader {
    Whole(ObjectKind),
    OfsDelta { base_distance: u64 },
    RefDelta { base_id: ObjectId },
}

/// The decoded, but not yet inflated, per-object header (spec.md §4.3/§4.4).
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub(crate) header: EntryHeader,
    /// Declared inflated (decompressed) size of the object body.
    pub(crate) inflated_size: u64,
    /// Absolute stream position of the first byte of this entry's header.
    pub(crate) stream_offset: u64,
    /// Number of header bytes consumed (type/size varint, plus the
    /// offset-delta varint or the 20-byte ref-delta id, if present).
    pub(crate) header_len: u64,
}

/// A handle to a fully-resolved object, as reported to the sink and stored
/// in the parser's ordered output array (spec.md §3 "Packed object info").
#[derive(Debug, Clone)]
pub struct PackedObjectInfo {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Stream offset of the entry that produced this object, or `None` for
    /// objects appended from the local store to complete a thin pack.
    pub offset: Option<u64>,
    pub crc32: Option<u32>,
}
