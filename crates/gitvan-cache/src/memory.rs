//! In-memory LRU tier, mirroring the workflow engine's
//! `Arc<Mutex<LruCache<K, Arc<V>>>>` shape.
//!
//! Bounded by both entry count (`lru::LruCache`'s own capacity) and
//! aggregate byte size: every [`Self::put`] tops up a running total and
//! evicts least-recently-used entries — via `push`, not `put`, so a
//! capacity-triggered automatic eviction reports its evicted value back
//! to us instead of disappearing silently — until the total is back
//! under the configured byte ceiling.

use crate::key::CacheKey;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

struct State {
    entries: LruCache<CacheKey, Arc<Vec<u8>>>,
    total_bytes: usize,
}

pub struct MemoryTier {
    state: Mutex<State>,
    max_bytes: usize,
}

impl MemoryTier {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            state: Mutex::new(State {
                entries: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<u8>>> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, value: Arc<Vec<u8>>) {
        let mut state = self.state.lock();
        let incoming_len = value.len();
        if let Some((_, evicted)) = state.entries.push(key, value) {
            state.total_bytes = state.total_bytes.saturating_sub(evicted.len());
        }
        state.total_bytes += incoming_len;

        // A single entry larger than `max_bytes` is kept rather than
        // evicted down to an always-empty tier: stop once it alone
        // remains, even though the ceiling is still technically breached.
        while state.total_bytes > self.max_bytes && state.entries.len() > 1 {
            match state.entries.pop_lru() {
                Some((_, evicted)) => state.total_bytes = state.total_bytes.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        let mut state = self.state.lock();
        if let Some(value) = state.entries.pop(key) {
            state.total_bytes = state.total_bytes.saturating_sub(value.len());
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }
}
