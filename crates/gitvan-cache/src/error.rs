//! Error taxonomy for the artifact cache.

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("integrity check failed for key {key}: expected {expected}, found {found}")]
    Integrity {
        key: String,
        expected: String,
        found: String,
    },

    #[error("entry for key {0} has an unsupported schema version {1}")]
    SchemaVersion(String, u32),
}
