//! # Download Queue
//!
//! Pure bounded-concurrency state machine, kept free of I/O so the
//! concurrency guarantees are testable in isolation. The loader wraps it
//! with the actual provider fetches.
//!
//! Guarantees:
//! - at most `active_limit` addresses are in flight at any time
//! - at most one in-flight download per address; later requesters attach
//!   to the existing one and share its result
//! - overflow requests wait in FIFO order

use std::collections::{HashSet, VecDeque};

use crate::cell::CellKey;

/// What a request call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestAction {
    /// A download slot was free; the caller must start the fetch.
    Started,
    /// The address is already in flight or queued; the caller shares the
    /// pending result.
    Attached,
    /// All slots are busy; the address waits in the FIFO queue.
    Queued,
}

/// Bounded-concurrency download bookkeeping.
pub struct DownloadQueue {
    active_limit: usize,
    in_flight: HashSet<CellKey>,
    pending: VecDeque<CellKey>,
    pending_set: HashSet<CellKey>,
}

impl DownloadQueue {
    /// Creates a queue allowing `active_limit` concurrent downloads.
    #[must_use]
    pub fn new(active_limit: usize) -> Self {
        Self {
            active_limit,
            in_flight: HashSet::new(),
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
        }
    }

    /// Registers interest in an address.
    pub fn request(&mut self, key: CellKey) -> RequestAction {
        if self.in_flight.contains(&key) || self.pending_set.contains(&key) {
            return RequestAction::Attached;
        }
        if self.in_flight.len() < self.active_limit {
            self.in_flight.insert(key);
            RequestAction::Started
        } else {
            self.pending.push_back(key);
            self.pending_set.insert(key);
            RequestAction::Queued
        }
    }

    /// Records completion of an in-flight address.
    ///
    /// Returns the next queued address to start, if a slot opened and
    /// the queue is non-empty. The caller must start that fetch.
    pub fn complete(&mut self, key: CellKey) -> Option<CellKey> {
        if !self.in_flight.remove(&key) {
            return None;
        }
        let next = self.pending.pop_front()?;
        self.pending_set.remove(&next);
        self.in_flight.insert(next);
        Some(next)
    }

    /// Number of downloads currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of addresses waiting for a slot.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether an address is currently in flight.
    #[must_use]
    pub fn is_in_flight(&self, key: CellKey) -> bool {
        self.in_flight.contains(&key)
    }

    /// The configured concurrent-download limit.
    #[must_use]
    pub fn active_limit(&self) -> usize {
        self.active_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: i32) -> CellKey {
        CellKey::new(6, n, n)
    }

    #[test]
    fn test_limit_enforced() {
        let mut q = DownloadQueue::new(2);
        assert_eq!(q.request(key(0)), RequestAction::Started);
        assert_eq!(q.request(key(1)), RequestAction::Started);
        assert_eq!(q.request(key(2)), RequestAction::Queued);
        assert_eq!(q.in_flight_count(), 2);
        assert_eq!(q.pending_count(), 1);
    }

    #[test]
    fn test_duplicate_requests_attach() {
        let mut q = DownloadQueue::new(1);
        assert_eq!(q.request(key(0)), RequestAction::Started);
        // Same address again: no second download.
        assert_eq!(q.request(key(0)), RequestAction::Attached);
        assert_eq!(q.in_flight_count(), 1);

        // Also while waiting in the queue.
        assert_eq!(q.request(key(1)), RequestAction::Queued);
        assert_eq!(q.request(key(1)), RequestAction::Attached);
        assert_eq!(q.pending_count(), 1);
    }

    #[test]
    fn test_completion_promotes_fifo() {
        let mut q = DownloadQueue::new(1);
        q.request(key(0));
        q.request(key(1));
        q.request(key(2));

        assert_eq!(q.complete(key(0)), Some(key(1)));
        assert!(q.is_in_flight(key(1)));
        assert_eq!(q.complete(key(1)), Some(key(2)));
        assert_eq!(q.complete(key(2)), None);
        assert_eq!(q.in_flight_count(), 0);
    }

    #[test]
    fn test_limit_holds_through_churn() {
        let mut q = DownloadQueue::new(3);
        for n in 0..20 {
            q.request(key(n));
            assert!(q.in_flight_count() <= 3);
        }
        let mut done = 0;
        for n in 0..20 {
            if q.is_in_flight(key(n)) {
                q.complete(key(n));
                done += 1;
            }
            assert!(q.in_flight_count() <= 3);
        }
        assert!(done > 0);
    }

    #[test]
    fn test_completing_unknown_key_is_harmless() {
        let mut q = DownloadQueue::new(1);
        assert_eq!(q.complete(key(9)), None);
    }
}
