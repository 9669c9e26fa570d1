//! Abstract, deterministic interface to a single Git repository.
//!
//! Everything the orchestrator needs from Git goes through [`GitInterface`]:
//! reading the graph directory as it existed at a commit, compare-and-swap
//! ref creation for advisory locks, and Git-notes read/write for receipts.
//! No method here mutates the working tree; all writes go through the
//! object database and refs directly (blob -> index -> tree -> commit)
//! without ever touching a checkout.

pub mod error;
pub mod lock;

pub use error::{GitError, GitResult};
pub use lock::LockGuard;

use chrono::{DateTime, Utc};
use git2::{ObjectType, Oid, Repository, Signature};
use std::path::Path;
use std::time::Duration;

/// Thin wrapper over a `git2::Repository` exposing only the operations
/// the Knowledge Hook Engine needs, each one deterministic given the
/// same repository state.
pub struct GitInterface {
    repo: Repository,
}

impl GitInterface {
    pub fn open(path: impl AsRef<Path>) -> GitResult<Self> {
        Ok(Self {
            repo: Repository::open(path)?,
        })
    }

    pub fn discover(path: impl AsRef<Path>) -> GitResult<Self> {
        Ok(Self {
            repo: Repository::discover(path)?,
        })
    }

    /// The commit `HEAD` currently resolves to.
    pub fn head(&self) -> GitResult<Oid> {
        let head = self.repo.head()?;
        Ok(head.peel_to_commit()?.id())
    }

    /// `commit`'s first parent, or `None` for a root commit.
    pub fn parent(&self, commit: Oid) -> GitResult<Option<Oid>> {
        let commit = self.repo.find_commit(commit)?;
        Ok(commit.parent_id(0).ok())
    }

    /// `None` when `HEAD` is detached.
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Read a blob's bytes as it existed in `commit`'s tree, at `path`
    /// (repo-relative, forward-slash separated).
    pub fn read_blob(&self, commit: Oid, path: &str) -> GitResult<Vec<u8>> {
        let commit = self.repo.find_commit(commit)?;
        let tree = commit.tree()?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|_| GitError::BlobNotFound(path.to_string()))?;
        let object = entry.to_object(&self.repo)?;
        let blob = object
            .as_blob()
            .ok_or_else(|| GitError::BlobNotFound(path.to_string()))?;
        Ok(blob.content().to_vec())
    }

    /// Repo-relative paths of every blob under `dir` in `commit`'s tree,
    /// filtered to `extension` (without the leading dot; e.g. `"ttl"`).
    /// Returned in tree order (which `git2` already yields depth-first,
    /// lexicographic per directory).
    pub fn list_files(&self, commit: Oid, dir: &str, extension: &str) -> GitResult<Vec<String>> {
        Ok(self
            .list_files_with_oid(commit, dir, extension)?
            .into_iter()
            .map(|(path, _)| path)
            .collect())
    }

    /// As [`Self::list_files`], but also returns each file's blob OID —
    /// the Knowledge Loader uses these, not just the commit SHA, to key
    /// its cache entry so an amend that touches unrelated files still
    /// invalidates correctly.
    pub fn list_files_with_oid(&self, commit: Oid, dir: &str, extension: &str) -> GitResult<Vec<(String, Oid)>> {
        let commit = self.repo.find_commit(commit)?;
        let tree = commit.tree()?;
        let mut out = Vec::new();
        let suffix = format!(".{extension}");
        let prefix = if dir.is_empty() { String::new() } else { format!("{dir}/") };
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                let name = entry.name().unwrap_or_default();
                let full_path = format!("{root}{name}");
                if full_path.starts_with(&prefix) && full_path.ends_with(&suffix) {
                    out.push((full_path, entry.id()));
                }
            }
            git2::TreeWalkResult::Ok
        })?;
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Read a Git note attached to `commit` under `notes_ref` (e.g.
    /// `refs/notes/gitvan/receipts`). `None` if no note exists.
    pub fn note_read(&self, notes_ref: &str, commit: Oid) -> GitResult<Option<String>> {
        match self.repo.find_note(Some(notes_ref), commit) {
            Ok(note) => Ok(note.message().map(|m| m.to_string())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `content` as a note on `commit` under `notes_ref`. If a
    /// note already exists, the new content is appended below a blank
    /// line separator (git2's `note` append semantics), so concurrent
    /// receipt writers never clobber each other's entries outright; the
    /// caller is still responsible for serializing writers via a lock
    /// ref, since `git notes append` is not itself atomic across
    /// processes.
    pub fn note_write(&self, notes_ref: &str, commit: Oid, content: &str, author: &str, email: &str) -> GitResult<Oid> {
        let sig = Signature::now(author, email)?;
        let existing = self.repo.find_note(Some(notes_ref), commit).ok();
        let combined = match existing {
            Some(note) => match note.message() {
                Some(msg) => format!("{msg}\n{content}"),
                None => content.to_string(),
            },
            None => content.to_string(),
        };
        let oid = self
            .repo
            .note(&sig, &sig, Some(notes_ref), commit, &combined, true)?;
        Ok(oid)
    }

    /// Replace whatever note is attached to `commit` under `notes_ref`
    /// with `content` outright, rather than appending below it. The
    /// Receipt Writer needs this: a receipt note is a single JSON
    /// document, and [`Self::note_write`]'s append semantics would
    /// concatenate two JSON documents into one invalid blob. Callers
    /// that need compare-and-swap semantics across concurrent writers
    /// should read-merge-overwrite under an external lock (see
    /// `gitvan-receipt`'s writer), since libgit2 notes have no built-in
    /// CAS primitive analogous to [`Self::ref_create_if_absent`].
    pub fn note_overwrite(&self, notes_ref: &str, commit: Oid, content: &str, author: &str, email: &str) -> GitResult<Oid> {
        let sig = Signature::now(author, email)?;
        let oid = self.repo.note(&sig, &sig, Some(notes_ref), commit, content, true)?;
        Ok(oid)
    }

    /// Create `reference` pointing at `target` only if it does not
    /// already exist. `git2::Repository::reference` with `force = false`
    /// already performs this compare-and-swap at the libgit2 layer: it
    /// fails if the ref exists, rather than racily reading-then-writing.
    pub fn ref_create_if_absent(&self, reference: &str, target: Oid, message: &str) -> GitResult<()> {
        match self.repo.reference(reference, target, false, message) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::Exists => {
                let existing = self
                    .repo
                    .find_reference(reference)
                    .ok()
                    .and_then(|r| r.target())
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                Err(GitError::RefConflict {
                    reference: reference.to_string(),
                    existing,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn ref_delete(&self, reference: &str) -> GitResult<()> {
        let mut r = self
            .repo
            .find_reference(reference)
            .map_err(|_| GitError::RefNotFound(reference.to_string()))?;
        r.delete()?;
        Ok(())
    }

    pub fn ref_target(&self, reference: &str) -> GitResult<Option<Oid>> {
        match self.repo.find_reference(reference) {
            Ok(r) => Ok(r.target()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every ref under `prefix` whose target commit's author time is
    /// older than `ttl`, interpreted as an abandoned lock (the holder
    /// crashed or was killed before releasing it) and deleted.
    ///
    /// This resolves the question of how a lock ref ever gets cleaned up
    /// when its owner never runs its `Drop`: the engine itself reaps
    /// locks on every invocation before attempting to acquire its own,
    /// rather than relying on a separate daemon.
    pub fn reap_stale_locks(&self, prefix: &str, ttl: Duration) -> GitResult<Vec<String>> {
        let mut reaped = Vec::new();
        let now: DateTime<Utc> = Utc::now();
        let refs = self.repo.references_glob(&format!("{prefix}*"))?;
        for r in refs {
            let r = r?;
            let Some(name) = r.name() else { continue };
            let name = name.to_string();
            let Some(target) = r.target() else { continue };
            let Ok(commit) = self.repo.find_commit(target) else {
                continue;
            };
            let author_time = commit.author().when();
            let authored_at = DateTime::from_timestamp(author_time.seconds(), 0).unwrap_or(now);
            let age = now.signed_duration_since(authored_at);
            if age.to_std().unwrap_or_default() > ttl {
                drop(r);
                self.ref_delete(&name)?;
                reaped.push(name);
            }
        }
        Ok(reaped)
    }

    pub(crate) fn repo(&self) -> &Repository {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo_with_commit(dir: &Path) -> (Repository, Oid) {
        let repo = Repository::init(dir).unwrap();
        fs::create_dir_all(dir.join("graph")).unwrap();
        fs::write(dir.join("graph/a.ttl"), "@prefix ex: <http://example.org/> .\nex:a ex:p ex:1 .").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("graph/a.ttl")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@example.org").unwrap();
        let commit_id = repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
        (repo, commit_id)
    }

    #[test]
    fn head_resolves_to_latest_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        assert_eq!(git.head().unwrap(), commit_id);
    }

    #[test]
    fn list_files_filters_by_extension_and_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let files = git.list_files(commit_id, "graph", "ttl").unwrap();
        assert_eq!(files, vec!["graph/a.ttl".to_string()]);
    }

    #[test]
    fn read_blob_returns_file_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let content = git.read_blob(commit_id, "graph/a.ttl").unwrap();
        assert!(String::from_utf8(content).unwrap().contains("ex:p"));
    }

    #[test]
    fn ref_create_if_absent_rejects_second_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        git.ref_create_if_absent("refs/gitvan/locks/main", commit_id, "lock").unwrap();
        let err = git
            .ref_create_if_absent("refs/gitvan/locks/main", commit_id, "lock")
            .unwrap_err();
        matches!(err, GitError::RefConflict { .. });
    }

    #[test]
    fn note_write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        git.note_write("refs/notes/gitvan/receipts", commit_id, "receipt-1", "gitvan", "gitvan@local")
            .unwrap();
        let note = git.note_read("refs/notes/gitvan/receipts", commit_id).unwrap();
        assert_eq!(note.as_deref(), Some("receipt-1"));
    }

    #[test]
    fn note_overwrite_replaces_rather_than_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        git.note_write("refs/notes/gitvan/receipts", commit_id, "first", "gitvan", "gitvan@local")
            .unwrap();
        git.note_overwrite("refs/notes/gitvan/receipts", commit_id, "second", "gitvan", "gitvan@local")
            .unwrap();
        let note = git.note_read("refs/notes/gitvan/receipts", commit_id).unwrap();
        assert_eq!(note.as_deref(), Some("second"));
    }

    #[test]
    fn stale_lock_beyond_ttl_is_reaped() {
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        git.ref_create_if_absent("refs/gitvan/locks/main", commit_id, "lock").unwrap();
        // The commit's author time is "now" at repo creation, so a TTL of
        // zero duration always counts it as already stale.
        let reaped = git.reap_stale_locks("refs/gitvan/locks/", Duration::from_secs(0)).unwrap();
        assert_eq!(reaped, vec!["refs/gitvan/locks/main".to_string()]);
        assert!(git.ref_target("refs/gitvan/locks/main").unwrap().is_none());
    }
}
