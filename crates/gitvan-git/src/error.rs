//! Error taxonomy for the Git interface.

use thiserror::Error;

pub type GitResult<T> = Result<T, GitError>;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("ref {reference} already exists, pointing at {existing}")]
    RefConflict { reference: String, existing: String },

    #[error("ref {0} not found")]
    RefNotFound(String),

    #[error("blob not found at path {0}")]
    BlobNotFound(String),

    #[error("lock ref {reference} held by {holder}, acquired {age_secs}s ago")]
    LockHeld {
        reference: String,
        holder: String,
        age_secs: i64,
    },
}
