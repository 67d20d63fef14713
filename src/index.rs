//! The delta-chain index, per spec.md §4.3/§9.
//!
//! Re-architected per the "Cyclic sibling lists" design note: an arena of
//! [`UnresolvedDelta`] nodes addressed by `u32` index, with `NONE` as the
//! sentinel, instead of an intrusive linked list built from shared-ownership
//! pointers. Two head maps point into the same arena: one keyed by the
//! in-stream base's byte offset (offset-deltas), one keyed by the base's
//! object id (ref-deltas) — spec.md §3's invariant that "each unresolved
//! delta is linked under exactly one base" is enforced simply by only ever
//! calling one of [`DeltaIndex::push_ofs`] / [`DeltaIndex::push_ref`] per node.

use gix_hash::ObjectId;
use std::collections::HashMap;

const NONE: u32 = u32::MAX;

/// A delta pack entry whose base has not yet been resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnresolvedDelta {
    pub(crate) stream_offset: u64,
    pub(crate) crc32: u32,
}

struct Node {
    delta: UnresolvedDelta,
    next: u32,
}

#[derive(Default)]
pub(crate) struct DeltaIndex {
    arena: Vec<Node>,
    by_offset: HashMap<u64, u32>,
    by_id: gix_hashtable::HashMap<ObjectId, u32>,
}

impl DeltaIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ofs(&mut self, base_offset: u64, delta: UnresolvedDelta) {
        let head = self.by_offset.entry(base_offset).or_insert(NONE);
        self.arena.push(Node { delta, next: *head });
        *head = (self.arena.len() - 1) as u32;
    }

    pub(crate) fn push_ref(&mut self, base_id: ObjectId, delta: UnresolvedDelta) {
        let head = self.by_id.entry(base_id).or_insert(NONE);
        self.arena.push(Node { delta, next: *head });
        *head = (self.arena.len() - 1) as u32;
    }

    /// Detach and return every delta waiting on the in-stream object at
    /// `base_offset`, in arbitrary order (the resolver sorts them).
    pub(crate) fn take_children_by_offset(&mut self, base_offset: u64) -> Vec<UnresolvedDelta> {
        match self.by_offset.remove(&base_offset) {
            Some(head) => self.collect_chain(head),
            None => Vec::new(),
        }
    }

    /// Detach and return every delta waiting on `base_id`, whether or not
    /// that id was ever seen as a producer inside this pack (thin packs
    /// register an empty head the first time a ref-delta names an unknown
    /// id, per spec.md §4.4).
    pub(crate) fn take_children_by_id(&mut self, base_id: &gix_hash::oid) -> Vec<UnresolvedDelta> {
        match self.by_id.remove(base_id) {
            Some(head) => self.collect_chain(head),
            None => Vec::new(),
        }
    }

    fn collect_chain(&self, mut head: u32) -> Vec<UnresolvedDelta> {
        let mut out = Vec::new();
        while head != NONE {
            let node = &self.arena[head as usize];
            out.push(node.delta);
            head = node.next;
        }
        out
    }

    /// The base ids that still have at least one unresolved child, i.e. the
    /// thin-pack bases a sink must supply (spec.md §4.5).
    pub(crate) fn remaining_ref_delta_heads(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.by_id.keys().copied()
    }

    /// True once both maps are empty — spec.md invariant 4: "the set of
    /// unresolved deltas is empty" after a successful parse.
    pub(crate) fn is_empty(&self) -> bool {
        self.by_offset.is_empty() && self.by_id.is_empty()
    }

    pub(crate) fn remaining_count(&self) -> usize {
        self.by_offset
            .values()
            .map(|&head| self.collect_chain(head).len())
            .sum::<usize>()
            + self
                .by_id
                .values()
                .map(|&head| self.collect_chain(head).len())
                .sum::<usize>()
    }
}
