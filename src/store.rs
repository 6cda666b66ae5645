//! In-memory entry store with snapshot diffing.
//!
//! The store owns the last-known set of feed entries, keyed by external ID.
//! Each successful fetch replaces the whole mapping at once via
//! [`EntryStore::replace_all`], which also reports what changed so the engine
//! can emit lifecycle events.  The store itself never emits anything.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::source::FeedEntry;

/// An entry together with the bookkeeping the store tracks for it.
#[derive(Debug, Clone)]
struct Tracked {
    entry: FeedEntry,
    /// The replace_all cycle this entry was last present in.
    last_seen_tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Tracked>,
    /// Incremented on every successful replace_all.
    tick: u64,
}

/// The IDs affected by one [`EntryStore::replace_all`] call.
///
/// The three sets are disjoint: an ID appears in `added` if it is new, in
/// `changed` if it was already known but its payload differs, and in
/// `removed` if it is gone from the new snapshot.  Entries present with an
/// equal payload appear nowhere — they must not regenerate events.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoreDiff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

impl StoreDiff {
    /// True when the snapshot matched the previous one exactly.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Mapping from external ID to the last-known entry state.
///
/// All access goes through one internal mutex, so readers observe either the
/// fully-old or fully-new mapping during a [`replace_all`](Self::replace_all)
/// — never an intermediate state.  Tick frequency is minutes, so a single
/// lock is not a throughput concern.
#[derive(Debug, Default)]
pub struct EntryStore {
    inner: Mutex<Inner>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the map intact, so the data
        // is still usable; recover the guard rather than poisoning forever.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up an entry by external ID.  Pure read, no side effects.
    pub fn get(&self, external_id: &str) -> Option<FeedEntry> {
        self.lock().entries.get(external_id).map(|t| t.entry.clone())
    }

    /// The tick an entry was last seen in, if it is currently known.
    pub fn last_seen_tick(&self, external_id: &str) -> Option<u64> {
        self.lock().entries.get(external_id).map(|t| t.last_seen_tick)
    }

    /// All currently known external IDs.
    pub fn external_ids(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Atomically replace the whole mapping with a new snapshot.
    ///
    /// Computes the added / changed / removed ID sets against the previous
    /// mapping (payload comparison is value equality), swaps the mapping, and
    /// returns the diff for the caller to act on.  Unchanged entries are
    /// carried over silently but still get their `last_seen_tick` refreshed.
    ///
    /// If the snapshot contains the same external ID twice, the last
    /// occurrence wins.
    pub fn replace_all(&self, new_entries: Vec<FeedEntry>) -> StoreDiff {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        // Build the final mapping first so the diff is computed against what
        // will actually be stored (relevant when an ID is listed twice).
        let mut next: HashMap<String, Tracked> = HashMap::with_capacity(new_entries.len());
        for entry in new_entries {
            let id = entry.external_id.clone();
            next.insert(id, Tracked { entry, last_seen_tick: tick });
        }

        let mut diff = StoreDiff::default();
        for (id, tracked) in &next {
            match inner.entries.get(id) {
                None => diff.added.push(id.clone()),
                Some(known) if known.entry != tracked.entry => diff.changed.push(id.clone()),
                Some(_) => {}
            }
        }
        for id in inner.entries.keys() {
            if !next.contains_key(id) {
                diff.removed.push(id.clone());
            }
        }

        inner.entries = next;
        diff
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
