//! The collision verifier, per spec.md §4.6.

use gix_hash::oid;

use crate::error::Error;
use crate::sink::Sink;

/// If collision checking is enabled, compare `content` byte-for-byte against
/// whatever the local store already holds under `id`, failing with
/// [`Error::CollisionDetected`] on any difference. A miss in the local store
/// is not a collision — the object is simply new to it.
pub(crate) fn check<S: Sink>(sink: &mut S, id: &oid, content: &[u8], enabled: bool) -> Result<(), Error> {
    if !enabled {
        return Ok(());
    }
    let mut existing = Vec::new();
    if sink.find_local_object(id, &mut existing)?.is_some() && existing != content {
        return Err(Error::CollisionDetected { id: id.to_owned() });
    }
    Ok(())
}
