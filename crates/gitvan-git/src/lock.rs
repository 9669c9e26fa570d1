//! Advisory, ref-based locking so only one orchestrator run processes a
//! given branch at a time.

use crate::error::GitResult;
use crate::GitInterface;
use git2::Oid;

/// Holds an advisory lock ref for the lifetime of the guard. Dropping it
/// deletes the ref; a crash before drop leaves it for
/// [`GitInterface::reap_stale_locks`] to clean up on a later run.
pub struct LockGuard<'a> {
    git: &'a GitInterface,
    reference: String,
    released: bool,
}

impl<'a> LockGuard<'a> {
    /// Acquire `reference` (e.g. `refs/gitvan/locks/<branch>`) pointing
    /// at `target`, failing if another run already holds it.
    pub fn acquire(git: &'a GitInterface, reference: &str, target: Oid) -> GitResult<Self> {
        git.ref_create_if_absent(reference, target, "gitvan: acquire lock")?;
        Ok(Self {
            git,
            reference: reference.to_string(),
            released: false,
        })
    }

    pub fn release(mut self) -> GitResult<()> {
        self.git.ref_delete(&self.reference)?;
        self.released = true;
        Ok(())
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.git.ref_delete(&self.reference) {
                tracing::warn!(reference = %self.reference, error = %e, "failed to release lock ref on drop");
            }
        }
    }
}
