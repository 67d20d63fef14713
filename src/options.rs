//! Parser configuration, per spec.md §6 ("Configuration").

use std::sync::Arc;

use crate::types::ObjectKind;

/// Structural validator invoked on each reconstructed object body (spec.md §6
/// `objectChecker`), independent of the hash and CRC checks the parser
/// always performs. A rejection surfaces as [`crate::Error::InvalidObject`].
pub trait ObjectChecker: Send + Sync {
    fn check(&self, kind: ObjectKind, bytes: &[u8]) -> Result<(), String>;
}

/// Tunables recognized by [`crate::parser::Parser`]. All defaults match the
/// literal defaults spec.md §6 specifies.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Options {
    /// Permits in-stream deltas to resolve against objects the sink loads
    /// from outside the pack (spec.md: thin packs).
    pub allow_thin: bool,
    /// Enables the collision verifier of spec.md §4.6.
    pub check_object_collisions: bool,
    /// Whether to retain the enumeration of ids created from in-stream
    /// objects on [`crate::parser::ParsedPack::new_object_ids`].
    pub need_new_object_ids: bool,
    /// Whether to retain the enumeration of ids appended to complete a thin
    /// pack on [`crate::parser::ParsedPack::base_object_ids`].
    pub need_base_object_ids: bool,
    /// Whether the input must be exactly exhausted right after the footer.
    pub check_eof_after_pack_footer: bool,
    /// If set, the caller expects additional data after the pack footer and
    /// any surplus already-buffered bytes are returned rather than discarded.
    pub expect_data_after_pack_footer: bool,
    /// Hard ceiling on any single object's inflated (or delta-reconstructed)
    /// size, enforced at header decode and at delta apply time.
    ///
    /// The upstream parser this crate's design is descended from caps this
    /// at `i32::MAX - 8`; see `DESIGN.md` for why this crate instead defaults
    /// to `u64::MAX / 2`, a ceiling explicitly raised for 64-bit targets
    /// while still rejecting absurd allocation requests.
    pub max_object_size: u64,
    /// Hash algorithm used for object ids and the whole-stream digest.
    pub hash_kind: gix_hash::Kind,
    /// Optional structural validator run on every reconstructed body.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub object_checker: Option<Arc<dyn ObjectChecker>>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("allow_thin", &self.allow_thin)
            .field("check_object_collisions", &self.check_object_collisions)
            .field("need_new_object_ids", &self.need_new_object_ids)
            .field("need_base_object_ids", &self.need_base_object_ids)
            .field("check_eof_after_pack_footer", &self.check_eof_after_pack_footer)
            .field("expect_data_after_pack_footer", &self.expect_data_after_pack_footer)
            .field("max_object_size", &self.max_object_size)
            .field("hash_kind", &self.hash_kind)
            .field("object_checker", &self.object_checker.is_some())
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            allow_thin: false,
            check_object_collisions: true,
            need_new_object_ids: false,
            need_base_object_ids: false,
            check_eof_after_pack_footer: false,
            expect_data_after_pack_footer: false,
            max_object_size: u64::MAX / 2,
            hash_kind: gix_hash::Kind::Sha1,
            object_checker: None,
        }
    }
}
