//! Bounded LRU store for origin responses.
//!
//! The store keeps whole responses (headers and body as streamed) keyed
//! by the request URI. Entries are ordered least-recently-used first;
//! every hit promotes its entry to the most-recently-used end. A [`Lease`]
//! pins an entry while a reader streams it, and eviction skips pinned
//! entries rather than waiting for them.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;

use crate::{MAX_CACHE_SIZE, MAX_OBJECT_SIZE};

/// Shared handle to the response cache.
///
/// Cloning is cheap and every clone observes the same store. A single
/// mutex serialises structural changes and pin-count updates; it is never
/// held across I/O.
#[derive(Debug, Clone)]
pub struct Cache {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    max_object_size: usize,
    max_total_size: usize,
}

#[derive(Debug, Default)]
struct State {
    /// Front is the least recently used entry, back the most recent.
    entries: VecDeque<Entry>,
    total_size: usize,
    next_id: u64,
    stats: CacheStats,
}

#[derive(Debug)]
struct Entry {
    /// Identifies this entry to the leases pinning it, across promotions.
    id: u64,
    key: String,
    bytes: Bytes,
    in_use: u32,
}

/// Counters describing cache effectiveness since startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub admissions: u64,
    pub evictions: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    /// Creates a cache with the standard limits, [`MAX_OBJECT_SIZE`] and
    /// [`MAX_CACHE_SIZE`].
    pub fn new() -> Self {
        Self::with_limits(MAX_OBJECT_SIZE, MAX_CACHE_SIZE)
    }

    /// Creates a cache with custom per-object and total size limits.
    pub fn with_limits(max_object_size: usize, max_total_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                max_object_size,
                max_total_size,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // The state is consistent at every unlock point, so a lock
        // poisoned by a panicking worker is safe to recover.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up a cached response by its request URI.
    ///
    /// A hit pins the entry against eviction and promotes it to the
    /// most-recently-used position. The pin is released when the returned
    /// lease is dropped.
    pub fn lookup(&self, key: &str) -> Option<Lease> {
        let mut state = self.state();
        let Some(pos) = state.entries.iter().position(|e| e.key == key) else {
            state.stats.misses += 1;
            return None;
        };
        state.stats.hits += 1;
        let mut entry = state.entries.remove(pos)?;
        entry.in_use += 1;
        let lease = Lease {
            shared: Arc::clone(&self.shared),
            id: entry.id,
            bytes: entry.bytes.clone(),
        };
        state.entries.push_back(entry);
        Some(lease)
    }

    /// Inserts a response at the most-recently-used position.
    ///
    /// Admission never reports failure: empty or oversize payloads,
    /// duplicate keys (the first writer wins) and a cache full of pinned
    /// entries all silently drop the new object. Capacity is reclaimed by
    /// evicting unpinned entries in LRU order.
    pub fn admit(&self, key: impl Into<String>, bytes: Bytes) {
        let key = key.into();
        let size = bytes.len();
        if size == 0 || size > self.shared.max_object_size {
            return;
        }
        let mut state = self.state();
        if state.entries.iter().any(|e| e.key == key) {
            return;
        }
        while state.total_size + size > self.shared.max_total_size {
            let Some(victim) = state.entries.iter().position(|e| e.in_use == 0) else {
                return;
            };
            if let Some(evicted) = state.entries.remove(victim) {
                state.total_size -= evicted.bytes.len();
                state.stats.evictions += 1;
            }
        }
        let id = state.next_id;
        state.next_id += 1;
        state.total_size += size;
        state.stats.admissions += 1;
        state.entries.push_back(Entry {
            id,
            key,
            bytes,
            in_use: 0,
        });
    }

    /// Whether a response for `key` is resident. Does not promote.
    pub fn contains(&self, key: &str) -> bool {
        self.state().entries.iter().any(|e| e.key == key)
    }

    /// Number of resident responses.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    /// Sum of the sizes of all resident responses, in bytes.
    pub fn total_size(&self) -> usize {
        self.state().total_size
    }

    pub fn stats(&self) -> CacheStats {
        self.state().stats
    }

    /// Keys, sizes and pin counts from the LRU front to the MRU back.
    #[cfg(test)]
    fn snapshot(&self) -> Vec<(String, usize, u32)> {
        self.state()
            .entries
            .iter()
            .map(|e| (e.key.clone(), e.bytes.len(), e.in_use))
            .collect()
    }
}

/// Scoped borrow of a cached response.
///
/// While the lease is alive its entry cannot be evicted. Dropping the
/// lease releases the pin under the store lock, so release happens
/// exactly once per successful lookup.
#[derive(Debug)]
pub struct Lease {
    shared: Arc<Shared>,
    id: u64,
    bytes: Bytes,
}

impl Lease {
    /// The cached response, headers and body as streamed from the origin.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The entry is still resident: a pinned entry is never evicted.
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == self.id) {
            entry.in_use -= 1;
        }
    }
}
