//! Two-tier, content-addressed artifact cache: an in-memory LRU in
//! front of an on-disk, integrity-checked, LZ4-compressed store.
//!
//! Used for parsed graphs, parsed hooks, and SPARQL result sets alike —
//! callers pick a `namespace` and derive a [`CacheKey`] from whatever
//! makes an entry's inputs unique (commit sha, file blob shas, query
//! text), so the same `Cache` backs every cache type in the engine.

pub mod disk;
pub mod entry;
pub mod error;
pub mod key;
pub mod memory;

pub use error::{CacheError, CacheResult};
pub use key::CacheKey;

use memory::MemoryTier;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub corruption_evictions: u64,
    pub expirations: u64,
}

struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    corruption_evictions: AtomicU64,
    expirations: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            memory_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            corruption_evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }
}

/// Default aggregate byte ceiling for the in-memory tier when a caller
/// only cares about the entry-count bound. 64 MiB holds a comfortable
/// handful of parsed graphs/result sets without needing per-deployment
/// tuning; [`Cache::with_memory_limits`] overrides it explicitly.
pub const DEFAULT_MEMORY_CAPACITY_BYTES: usize = 64 * 1024 * 1024;

pub struct Cache {
    root: PathBuf,
    memory: MemoryTier,
    counters: Counters,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>, memory_capacity: usize) -> Self {
        Self::with_memory_limits(root, memory_capacity, DEFAULT_MEMORY_CAPACITY_BYTES)
    }

    /// Like [`Self::new`] but with an explicit aggregate byte ceiling for
    /// the in-memory tier (§4.2: Tier 1 is "bounded by entry count and
    /// aggregate byte size").
    pub fn with_memory_limits(root: impl Into<PathBuf>, memory_capacity: usize, memory_capacity_bytes: usize) -> Self {
        Self {
            root: root.into(),
            memory: MemoryTier::new(memory_capacity, memory_capacity_bytes),
            counters: Counters::default(),
        }
    }

    /// Look up `key` under `namespace`. A hit whose stored schema
    /// version no longer matches `expected_schema_version`, or whose TTL
    /// has elapsed, or whose integrity hash no longer checks out, is
    /// treated as a miss and the stale disk entry is removed.
    pub fn get(&self, namespace: &str, key: &CacheKey, expected_schema_version: u32) -> CacheResult<Option<Vec<u8>>> {
        if let Some(hit) = self.memory.get(key) {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some((*hit).clone()));
        }

        let path = disk::entry_path(&self.root, namespace, key);
        let Some(bytes) = disk::read(&path)? else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        match entry::decode(&bytes, &key.as_hex()) {
            Ok((raw, meta)) => {
                if meta.schema_version != expected_schema_version {
                    disk::remove(&path)?;
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                if meta.is_expired(now_unix()) {
                    disk::remove(&path)?;
                    self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                self.memory.put(*key, Arc::new(raw.clone()));
                self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(raw))
            }
            Err(CacheError::Integrity { .. }) => {
                disk::remove(&path)?;
                self.counters.corruption_evictions.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn put(&self, namespace: &str, key: CacheKey, raw: &[u8], schema_version: u32, ttl_secs: Option<u64>) -> CacheResult<()> {
        let framed = entry::encode(raw, schema_version, now_unix(), ttl_secs)?;
        let path = disk::entry_path(&self.root, namespace, &key);
        disk::write_atomic(&path, &framed)?;
        self.memory.put(key, Arc::new(raw.to_vec()));
        Ok(())
    }

    pub fn invalidate(&self, namespace: &str, key: &CacheKey) -> CacheResult<()> {
        self.memory.invalidate(key);
        disk::remove(&disk::entry_path(&self.root, namespace, key))
    }

    /// Walk every on-disk entry under `namespace`, dropping anything
    /// expired, schema-stale, or failing its integrity hash. Intended to
    /// be driven by a periodic background task owned by the binary
    /// rather than run inline on every request.
    pub fn revalidate_all(&self, namespace: &str, expected_schema_version: u32) -> CacheResult<RevalidationReport> {
        let mut report = RevalidationReport::default();
        for path in disk::list_namespace(&self.root, namespace)? {
            let Some(bytes) = disk::read(&path)? else { continue };
            report.scanned += 1;
            match entry::decode(&bytes, &path.display().to_string()) {
                Ok((_, meta)) if meta.schema_version != expected_schema_version => {
                    disk::remove(&path)?;
                    report.schema_evicted += 1;
                }
                Ok((_, meta)) if meta.is_expired(now_unix()) => {
                    disk::remove(&path)?;
                    report.expired += 1;
                }
                Ok(_) => {}
                Err(_) => {
                    disk::remove(&path)?;
                    report.corrupted += 1;
                }
            }
        }
        self.counters
            .corruption_evictions
            .fetch_add(report.corrupted as u64, Ordering::Relaxed);
        self.counters.expirations.fetch_add(report.expired as u64, Ordering::Relaxed);
        Ok(report)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            corruption_evictions: self.counters.corruption_evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RevalidationReport {
    pub scanned: u64,
    pub expired: u64,
    pub schema_evicted: u64,
    pub corrupted: u64,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_hits_memory_then_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 8);
        let key = CacheKey::derive("graph", &[b"commit1"]);
        cache.put("graph", key, b"hello world", 1, None).unwrap();

        let got = cache.get("graph", &key, 1).unwrap();
        assert_eq!(got.as_deref(), Some(b"hello world".as_slice()));
        assert_eq!(cache.stats().memory_hits, 1);
    }

    #[test]
    fn disk_hit_after_memory_eviction() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 1);
        let k1 = CacheKey::derive("graph", &[b"commit1"]);
        let k2 = CacheKey::derive("graph", &[b"commit2"]);
        cache.put("graph", k1, b"one", 1, None).unwrap();
        cache.put("graph", k2, b"two", 1, None).unwrap();

        let got = cache.get("graph", &k1, 1).unwrap();
        assert_eq!(got.as_deref(), Some(b"one".as_slice()));
        assert_eq!(cache.stats().disk_hits, 1);
    }

    #[test]
    fn schema_version_mismatch_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 8);
        let key = CacheKey::derive("graph", &[b"commit1"]);
        cache.put("graph", key, b"hello", 1, None).unwrap();

        let got = cache.get("graph", &key, 2).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn ttl_expiry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 8);
        let key = CacheKey::derive("graph", &[b"commit1"]);
        cache.put("graph", key, b"hello", 1, Some(0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        let got = cache.get("graph", &key, 1).unwrap();
        assert!(got.is_none());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn revalidate_all_removes_stale_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path(), 8);
        let key = CacheKey::derive("graph", &[b"commit1"]);
        cache.put("graph", key, b"hello", 1, None).unwrap();

        let report = cache.revalidate_all("graph", 2).unwrap();
        assert_eq!(report.schema_evicted, 1);
    }
}
