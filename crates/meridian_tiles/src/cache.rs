//! # Payload Cache
//!
//! Per-cell state machine plus reference-counted payload storage.
//!
//! The configured limit is a soft target: eviction only considers
//! `Loaded` entries with a zero reference count, least recently released
//! first. A currently visible (referenced) entry is never evicted, even
//! over the limit; correctness outranks capacity.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cell::CellKey;

/// Lifecycle state of one cell address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    /// Nothing known; a request may be issued.
    Absent,
    /// A download is queued or in flight.
    Requested,
    /// Payload available.
    Loaded,
    /// Download or decode failed terminally (retries exhausted).
    Failed,
}

/// One cache slot.
struct Entry<P> {
    state: CellState,
    payload: Option<Arc<P>>,
    refs: u32,
    /// Monotonic stamp of the most recent release; orders eviction.
    released: u64,
}

/// Reference-counted cache for decoded cell payloads.
///
/// Mutated only on the frame thread by the loader's own systems; worker
/// threads hand payload values in through queues, never through here.
pub struct PayloadCache<P> {
    entries: HashMap<CellKey, Entry<P>>,
    clock: u64,
}

impl<P> PayloadCache<P> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            clock: 0,
        }
    }

    /// Current state of a cell address.
    #[must_use]
    pub fn state(&self, key: CellKey) -> CellState {
        self.entries
            .get(&key)
            .map_or(CellState::Absent, |e| e.state)
    }

    /// Marks a cell `Requested`.
    ///
    /// Valid from `Absent` and from `Failed` (a retry after the cell
    /// re-enters visibility); a no-op for `Loaded` and `Requested` cells.
    pub fn mark_requested(&mut self, key: CellKey) {
        let entry = self.entries.entry(key).or_insert(Entry {
            state: CellState::Absent,
            payload: None,
            refs: 0,
            released: 0,
        });
        if matches!(entry.state, CellState::Absent | CellState::Failed) {
            entry.state = CellState::Requested;
        }
    }

    /// Stores a payload, moving the cell to `Loaded`.
    pub fn insert_loaded(&mut self, key: CellKey, payload: P) {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.entry(key).or_insert(Entry {
            state: CellState::Absent,
            payload: None,
            refs: 0,
            released: 0,
        });
        entry.state = CellState::Loaded;
        entry.payload = Some(Arc::new(payload));
        entry.released = clock;
    }

    /// Records a terminal failure for the cell.
    pub fn mark_failed(&mut self, key: CellKey) {
        let entry = self.entries.entry(key).or_insert(Entry {
            state: CellState::Absent,
            payload: None,
            refs: 0,
            released: 0,
        });
        entry.state = CellState::Failed;
        entry.payload = None;
    }

    /// Takes a visibility reference on a loaded cell and returns its
    /// payload.
    ///
    /// Returns `None` unless the cell is `Loaded`.
    pub fn retain(&mut self, key: CellKey) -> Option<Arc<P>> {
        let entry = self.entries.get_mut(&key)?;
        if entry.state != CellState::Loaded {
            return None;
        }
        entry.refs += 1;
        entry.payload.clone()
    }

    /// Reads a loaded payload without taking a reference.
    #[must_use]
    pub fn get(&self, key: CellKey) -> Option<Arc<P>> {
        let entry = self.entries.get(&key)?;
        if entry.state != CellState::Loaded {
            return None;
        }
        entry.payload.clone()
    }

    /// Releases one visibility reference.
    ///
    /// An entry whose reference count reaches zero becomes eligible for
    /// eviction, ordered by this release.
    pub fn release(&mut self, key: CellKey) {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refs = entry.refs.saturating_sub(1);
            entry.released = self.clock;
        }
    }

    /// Reference count of a cell, for invariant checks.
    #[must_use]
    pub fn ref_count(&self, key: CellKey) -> u32 {
        self.entries.get(&key).map_or(0, |e| e.refs)
    }

    /// Drops all record of an unreferenced cell, returning it to
    /// `Absent`.
    ///
    /// Used for `Failed` cells leaving visibility so that re-entering
    /// visibility issues a fresh request.
    pub fn forget(&mut self, key: CellKey) {
        if self.entries.get(&key).is_some_and(|e| e.refs == 0) {
            self.entries.remove(&key);
        }
    }

    /// Number of `Loaded` entries.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == CellState::Loaded)
            .count()
    }

    /// Evicts `Loaded`, zero-reference entries until the loaded count is
    /// within `limit`, least recently released first.
    ///
    /// Returns the evicted keys. Referenced entries are never evicted;
    /// if they alone exceed twice the limit, a capacity warning is
    /// logged.
    pub fn evict_over_limit(&mut self, limit: usize) -> Vec<CellKey> {
        let loaded = self.loaded_count();
        if loaded <= limit {
            return Vec::new();
        }

        let mut candidates: Vec<(u64, CellKey)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == CellState::Loaded && e.refs == 0)
            .map(|(k, e)| (e.released, *k))
            .collect();
        candidates.sort_unstable();

        let excess = loaded - limit;
        let evicted: Vec<CellKey> = candidates
            .into_iter()
            .take(excess)
            .map(|(_, k)| k)
            .collect();
        for key in &evicted {
            self.entries.remove(key);
            tracing::debug!(cell = %key, "evicted payload");
        }

        let remaining = self.loaded_count();
        if remaining > limit * 2 {
            tracing::warn!(
                loaded = remaining,
                limit,
                "cache exceeds limit with referenced entries; capacity-planning concern"
            );
        }
        evicted
    }
}

impl<P> Default for PayloadCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: i32) -> CellKey {
        CellKey::new(4, n, 0)
    }

    #[test]
    fn test_state_machine() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        let k = key(0);

        assert_eq!(cache.state(k), CellState::Absent);
        cache.mark_requested(k);
        assert_eq!(cache.state(k), CellState::Requested);
        cache.insert_loaded(k, 7);
        assert_eq!(cache.state(k), CellState::Loaded);

        // A loaded cell ignores stray request marks.
        cache.mark_requested(k);
        assert_eq!(cache.state(k), CellState::Loaded);
    }

    #[test]
    fn test_failed_can_be_rerequested() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        let k = key(1);
        cache.mark_requested(k);
        cache.mark_failed(k);
        assert_eq!(cache.state(k), CellState::Failed);
        cache.mark_requested(k);
        assert_eq!(cache.state(k), CellState::Requested);
    }

    #[test]
    fn test_retain_release_refcount() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        let k = key(2);
        cache.insert_loaded(k, 42);

        let payload = cache.retain(k).unwrap();
        assert_eq!(*payload, 42);
        assert_eq!(cache.ref_count(k), 1);

        cache.release(k);
        assert_eq!(cache.ref_count(k), 0);
    }

    #[test]
    fn test_eviction_is_least_recently_released() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        // Load 6 cells against a limit of 5; release them in order.
        for n in 0..6 {
            cache.insert_loaded(key(n), n as u32);
            let _ = cache.retain(key(n));
        }
        for n in 0..6 {
            cache.release(key(n));
        }

        let evicted = cache.evict_over_limit(5);
        assert_eq!(evicted, vec![key(0)]);
        assert_eq!(cache.loaded_count(), 5);
        assert_eq!(cache.state(key(0)), CellState::Absent);
    }

    #[test]
    fn test_referenced_entries_never_evicted() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        for n in 0..4 {
            cache.insert_loaded(key(n), 0);
            let _ = cache.retain(key(n));
        }

        // Everything is referenced; nothing may be evicted even with
        // limit 1.
        let evicted = cache.evict_over_limit(1);
        assert!(evicted.is_empty());
        assert_eq!(cache.loaded_count(), 4);
    }

    #[test]
    fn test_cache_invariant_after_mixed_traffic() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        let limit = 3;
        for n in 0..8 {
            cache.insert_loaded(key(n), 0);
            let _ = cache.retain(key(n));
            if n % 2 == 0 {
                cache.release(key(n));
            }
            cache.evict_over_limit(limit);

            // Invariant: within limit, or everything over it is
            // referenced.
            let loaded = cache.loaded_count();
            if loaded > limit {
                let unreferenced = (0..=n).filter(|&m| {
                    cache.state(key(m)) == CellState::Loaded && cache.ref_count(key(m)) == 0
                });
                assert_eq!(unreferenced.count(), 0);
            }
        }
    }

    #[test]
    fn test_forget_requires_zero_refs() {
        let mut cache: PayloadCache<u32> = PayloadCache::new();
        let k = key(9);
        cache.insert_loaded(k, 1);
        let _ = cache.retain(k);

        cache.forget(k);
        assert_eq!(cache.state(k), CellState::Loaded);

        cache.release(k);
        cache.forget(k);
        assert_eq!(cache.state(k), CellState::Absent);
    }
}
