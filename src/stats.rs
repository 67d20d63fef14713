//! Parse-wide statistics, per spec.md §3 ("Pack statistics").

/// Counters accumulated across both the scan and resolve phases.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackStatistics {
    pub commits: u64,
    pub trees: u64,
    pub blobs: u64,
    pub tags: u64,
    pub offset_deltas: u64,
    pub ref_deltas: u64,
    pub bytes_read: u64,
    /// Objects fetched from the local store to complete a thin pack.
    pub appended_bases: u64,
}

impl PackStatistics {
    pub fn whole_objects(&self) -> u64 {
        self.commits + self.trees + self.blobs + self.tags
    }

    pub fn total_deltas(&self) -> u64 {
        self.offset_deltas + self.ref_deltas
    }

    pub(crate) fn record_whole(&mut self, kind: crate::types::ObjectKind) {
        match kind {
            crate::types::ObjectKind::Commit => self.commits += 1,
            crate::types::ObjectKind::Tree => self.trees += 1,
            crate::types::ObjectKind::Blob => self.blobs += 1,
            crate::types::ObjectKind::Tag => self.tags += 1,
        }
    }
}
