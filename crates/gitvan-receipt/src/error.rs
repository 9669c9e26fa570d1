//! Error taxonomy for the Receipt Writer and index.

use thiserror::Error;

pub type ReceiptResult<T> = Result<T, ReceiptError>;

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error(transparent)]
    Git(#[from] gitvan_git::GitError),

    #[error("failed to (de)serialize receipt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("existing note for commit {commit} is not a valid gitvan receipt: {reason}")]
    Corrupt { commit: String, reason: String },

    #[error("merge-write for commit {commit} did not converge after {attempts} attempts")]
    MergeRetriesExhausted { commit: String, attempts: u32 },
}
