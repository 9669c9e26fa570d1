//! Merges one orchestrator run's hook outcomes into the commit's
//! receipt note, under `refs/notes/gitvan/receipts` by convention
//! (§6.1), via read-merge-overwrite.
//!
//! This is not a true compare-and-swap the way [`gitvan_git::GitInterface::ref_create_if_absent`]
//! is — libgit2 notes have no CAS primitive — so it only provides the
//! "merge by replacing the current hook's entry only" contract safely
//! when callers are already serialized by the evaluation lock (§4.10
//! step 1). The read-verify-retry loop below is a defensive backstop
//! against a second writer slipping in during the same process (e.g. a
//! test harness without a lock), not the sole correctness mechanism.

use crate::error::{ReceiptError, ReceiptResult};
use crate::types::{HookReceipt, Receipt};
use chrono::{DateTime, Utc};
use git2::Oid;
use gitvan_git::GitInterface;

const DEFAULT_NOTES_REF: &str = "refs/notes/gitvan/receipts";
const MAX_MERGE_ATTEMPTS: u32 = 8;

pub struct ReceiptWriter<'a> {
    git: &'a GitInterface,
    notes_ref: &'a str,
    author: &'a str,
    email: &'a str,
}

impl<'a> ReceiptWriter<'a> {
    pub fn new(git: &'a GitInterface, author: &'a str, email: &'a str) -> Self {
        Self { git, notes_ref: DEFAULT_NOTES_REF, author, email }
    }

    pub fn with_notes_ref(mut self, notes_ref: &'a str) -> Self {
        self.notes_ref = notes_ref;
        self
    }

    pub fn read(&self, commit: Oid) -> ReceiptResult<Option<Receipt>> {
        let Some(text) = self.git.note_read(self.notes_ref, commit)? else {
            return Ok(None);
        };
        let receipt = serde_json::from_str(&text).map_err(|e| ReceiptError::Corrupt {
            commit: commit.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(receipt))
    }

    /// Merge `hooks` into whatever receipt already exists for `commit`
    /// (creating one if absent), write it back, and return the merged
    /// receipt. `started_at` is only used the first time a receipt is
    /// created for this commit; subsequent calls keep the original.
    pub fn merge_write(&self, commit: Oid, commit_sha: &str, hooks: Vec<HookReceipt>, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> ReceiptResult<Receipt> {
        for _ in 0..MAX_MERGE_ATTEMPTS {
            let mut receipt = self.read(commit)?.unwrap_or_else(|| Receipt::new(commit_sha, started_at));
            receipt.finished_at = finished_at;
            receipt.merge_hooks(hooks.clone());

            let canonical = receipt.to_canonical_json()?;
            self.git.note_overwrite(self.notes_ref, commit, &canonical, self.author, self.email)?;

            let verify = self.git.note_read(self.notes_ref, commit)?;
            if verify.as_deref() == Some(canonical.as_str()) {
                return Ok(receipt);
            }
            tracing::debug!(commit = %commit, "receipt note changed during merge-write, retrying");
        }
        Err(ReceiptError::MergeRetriesExhausted { commit: commit.to_string(), attempts: MAX_MERGE_ATTEMPTS })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepReceipt;
    use git2::{Repository, Signature};
    use serde_json::Map;
    use std::path::Path;

    fn repo_with_commit(dir: &Path) -> Oid {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("a.txt"), "x").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("t", "t@example.org").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap()
    }

    fn hook(id: &str, ok: bool) -> HookReceipt {
        HookReceipt {
            hook_id: id.to_string(),
            predicate_type: "ask".to_string(),
            fired: true,
            context: Map::new(),
            workflow_ok: ok,
            steps: vec![StepReceipt { id: "s1".to_string(), ok, duration_ms: 5, error: None, outputs: Map::new() }],
        }
    }

    #[test]
    fn merge_write_creates_then_merges_second_hook() {
        let tmp = tempfile::tempdir().unwrap();
        let commit = repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let writer = ReceiptWriter::new(&git, "gitvan", "gitvan@local");
        let now = Utc::now();

        writer.merge_write(commit, &commit.to_string(), vec![hook("h1", true)], now, now).unwrap();
        let receipt = writer.merge_write(commit, &commit.to_string(), vec![hook("h2", false)], now, now).unwrap();

        assert_eq!(receipt.hooks.len(), 2);
        assert_eq!(receipt.hooks[0].hook_id, "h1");
        assert_eq!(receipt.hooks[1].hook_id, "h2");
    }

    #[test]
    fn merge_write_replaces_same_hook_id() {
        let tmp = tempfile::tempdir().unwrap();
        let commit = repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let writer = ReceiptWriter::new(&git, "gitvan", "gitvan@local");
        let now = Utc::now();

        writer.merge_write(commit, &commit.to_string(), vec![hook("h1", true)], now, now).unwrap();
        let receipt = writer.merge_write(commit, &commit.to_string(), vec![hook("h1", false)], now, now).unwrap();

        assert_eq!(receipt.hooks.len(), 1);
        assert!(!receipt.hooks[0].workflow_ok);
    }

    #[test]
    fn writing_the_same_receipt_twice_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let commit = repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let writer = ReceiptWriter::new(&git, "gitvan", "gitvan@local");
        let now = Utc::now();

        writer.merge_write(commit, &commit.to_string(), vec![hook("h1", true)], now, now).unwrap();
        let first = git.note_read("refs/notes/gitvan/receipts", commit).unwrap();

        writer.merge_write(commit, &commit.to_string(), vec![hook("h1", true)], now, now).unwrap();
        let second = git.note_read("refs/notes/gitvan/receipts", commit).unwrap();

        assert_eq!(first, second);
    }
}
