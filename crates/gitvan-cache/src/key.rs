//! Content-addressed cache keys.

use sha2::{Digest, Sha256};
use std::fmt;

/// A 128-bit content-address: the low half of a SHA-256 digest over a
/// namespace tag plus an arbitrary list of component byte strings.
/// 128 bits is plenty of collision resistance for the cardinality of
/// any single cache type (graphs, hook parses, query results) and keeps
/// on-disk paths short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 16]);

impl CacheKey {
    pub fn derive(namespace: &str, components: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        for component in components {
            hasher.update(b"\0");
            hasher.update(component);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(bytes)
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First two hex characters, used as the on-disk shard directory so
    /// no single directory accumulates more than ~1/256th of all entries.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}
