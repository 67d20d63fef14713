//! Object id computation, per spec.md §3 and §6:
//! "the 20-byte digest of the ASCII type keyword, a space, the decimal ASCII
//! representation of the body length, a NUL byte, then the raw body bytes."
//!
//! Built on `gix_hash`, the same crate the rest of the gitoxide stack uses
//! for object ids; with its `sha1` feature this routes through
//! `sha1-checked`, so a crafted SHA-1 collision in the *hash preimage itself*
//! is detected independently of the store-level [`crate::error::Error::CollisionDetected`]
//! check in spec.md §4.6.

use gix_hash::{Kind, ObjectId};

use crate::error::Error;
use crate::types::ObjectKind;

/// Compute the object id of `body` under `kind`.
pub(crate) fn object_id(kind: ObjectKind, body: &[u8], hash_kind: Kind) -> Result<ObjectId, Error> {
    let mut hasher = gix_hash::hasher(hash_kind);
    hasher.update(kind.as_keyword().as_bytes());
    hasher.update(b" ");
    hasher.update(body.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(body);
    hasher
        .try_finalize()
        .map_err(|_| Error::corrupt(0, "hash finalization failed (possible crafted collision)"))
}

/// Rolling hash over the whole forward input stream (spec.md §4.1: "every
/// byte consumed from INPUT flows through the whole-stream hasher exactly
/// once"), finalized once, right before the trailing digest is read.
pub(crate) struct StreamHasher {
    hasher: gix_hash::Hasher,
}

impl StreamHasher {
    pub(crate) fn new(kind: Kind) -> Self {
        StreamHasher {
            hasher: gix_hash::hasher(kind),
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub(crate) fn finalize(self) -> Result<ObjectId, Error> {
        self.hasher
            .try_finalize()
            .map_err(|_| Error::corrupt(0, "whole-stream hash finalization failed"))
    }
}
