//! The AS-path cache: a keyed store from [`PathId`] to the AS-path it was
//! computed from, shared by every update that happens to carry the same
//! sequence of hops, address family, and relationship direction.
//!
//! Grounded in `aspath_cache.c`'s UT_hash-based table guarded by a single
//! read-write lock; the hash table itself is [`std::collections::HashMap`]
//! here, with the same store/find/delete/modify surface. An entry holds
//! (Path-ID, AS-sequence copy, segment-kind, relationship-direction,
//! address-family, cached ASPA outcome) as one unit, since the ASPA walk
//! needs the direction and afi alongside the hops to reproduce its
//! result without the caller re-supplying them.

use std::collections::HashMap;

use crate::as_path::{AsPath, RelationshipDirection, SegmentKind};
use crate::ids::{AsNumber, PathId};
use crate::outcome::{Afi, ValidationOutcome};
use crate::utils::sync::RwLock;

/// One cached AS-path and the context needed to re-run its ASPA walk.
#[derive(Clone)]
pub struct PathCacheEntry {
    pub path: AsPath,
    pub direction: RelationshipDirection,
    pub afi: Afi,
    pub aspa_result: ValidationOutcome,
}

/// The AS-path cache.
pub struct AsPathCache {
    entries: RwLock<HashMap<PathId, PathCacheEntry>>,
}

impl AsPathCache {
    pub fn new() -> Self {
        AsPathCache { entries: RwLock::new(HashMap::new()) }
    }

    /// Stores `path` under `path_id`, taking a deep copy of its hop
    /// sequence. Fails if `path_id` is already present -- callers must go
    /// through [`AsPathCache::modify_aspa_result`] to update an existing
    /// entry instead.
    pub fn store(
        &self,
        path_id: PathId,
        path: AsPath,
        direction: RelationshipDirection,
        afi: Afi,
        aspa_result: ValidationOutcome,
    ) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&path_id) {
            return false;
        }
        entries.insert(path_id, PathCacheEntry { path, direction, afi, aspa_result });
        true
    }

    /// Returns a clone of the cached entry.
    pub fn find(&self, path_id: PathId) -> Option<PathCacheEntry> {
        let entries = self.entries.read();
        entries.get(&path_id).cloned()
    }

    pub fn delete(&self, path_id: PathId) -> bool {
        self.entries.write().remove(&path_id).is_some()
    }

    /// Overwrites the cached ASPA result for an existing entry. Returns
    /// `false` if no entry exists for `path_id`.
    pub fn modify_aspa_result(
        &self,
        path_id: PathId,
        aspa_result: ValidationOutcome,
    ) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(&path_id) {
            Some(entry) => {
                entry.aspa_result = aspa_result;
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns every cached `(PathId, segment-kind, hop-count)` triple,
    /// sorted by `PathId`. Used by diagnostics and tests; production
    /// dispatch never needs a full scan.
    pub fn iterate_sorted_by_path_id(&self) -> Vec<(PathId, SegmentKind, usize)> {
        let entries = self.entries.read();
        let mut rows: Vec<_> = entries
            .iter()
            .map(|(id, entry)| (*id, entry.path.segment_kind(), entry.path.len()))
            .collect();
        rows.sort_by_key(|(id, _, _)| *id);
        rows
    }
}

impl Default for AsPathCache {
    fn default() -> Self {
        Self::new()
    }
}
