//! Receipt query/index API: an audit-trail read path over whatever
//! history of commits a caller hands in, grounded on the workflow
//! engine's in-memory `ReceiptStore` but backed by Git notes — each
//! commit carries at most one receipt, so the index is built by
//! walking a caller-supplied commit list and reading each one's note,
//! rather than maintaining its own append-only log.

use crate::error::ReceiptResult;
use crate::types::Receipt;
use crate::writer::ReceiptWriter;
use git2::Oid;
use gitvan_git::GitInterface;
use std::collections::HashMap;

/// One receipt plus the commit it was read from, since [`Receipt::commit`]
/// is a string the caller supplied at write time and may not always be
/// trusted to match the note's actual commit in exotic setups (a
/// rebased or grafted history, a hand-edited note).
#[derive(Debug, Clone)]
pub struct ReceiptRecord {
    pub commit: Oid,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Default)]
pub struct ReceiptQuery {
    pub hook_id: Option<String>,
    pub only_fired: Option<bool>,
    pub only_failed_workflows: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReceiptStats {
    pub total_receipts: usize,
    pub total_hook_evaluations: usize,
    pub fired_hook_evaluations: usize,
    pub failed_workflows: usize,
    pub total_steps: usize,
    pub total_step_duration_ms: u64,
}

impl ReceiptStats {
    pub fn avg_step_duration_ms(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.total_step_duration_ms as f64 / self.total_steps as f64
        }
    }
}

/// An in-memory index built once over a commit range (typically the
/// branch history since the last release, or since the repository's
/// root commit for a full audit), then queried repeatedly.
pub struct ReceiptIndex {
    records: Vec<ReceiptRecord>,
    by_hook: HashMap<String, Vec<usize>>,
}

impl ReceiptIndex {
    /// Read every commit in `commits`' receipt note (skipping commits
    /// with none) and index it by hook ID.
    pub fn build(git: &GitInterface, commits: impl IntoIterator<Item = Oid>) -> ReceiptResult<Self> {
        let writer = ReceiptWriter::new(git, "gitvan", "gitvan@local");
        let mut records = Vec::new();
        let mut by_hook: HashMap<String, Vec<usize>> = HashMap::new();

        for commit in commits {
            let Some(receipt) = writer.read(commit)? else { continue };
            let index = records.len();
            for hook in &receipt.hooks {
                by_hook.entry(hook.hook_id.clone()).or_default().push(index);
            }
            records.push(ReceiptRecord { commit, receipt });
        }

        Ok(Self { records, by_hook })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, commit: Oid) -> Option<&Receipt> {
        self.records.iter().find(|r| r.commit == commit).map(|r| &r.receipt)
    }

    pub fn by_hook_id(&self, hook_id: &str) -> Vec<&ReceiptRecord> {
        self.by_hook
            .get(hook_id)
            .map(|indices| indices.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Every `(commit, hook receipt)` pair matching `query`, newest
    /// commit first (the order `commits` was supplied in is assumed to
    /// already run oldest-to-newest, as a `git2::Revwalk` over `HEAD`
    /// does by default without `git2::Sort::REVERSE`).
    pub fn query(&self, query: &ReceiptQuery) -> Vec<(Oid, &crate::types::HookReceipt)> {
        let mut results: Vec<(Oid, &crate::types::HookReceipt)> = self
            .records
            .iter()
            .rev()
            .flat_map(|record| record.receipt.hooks.iter().map(move |hook| (record.commit, hook)))
            .filter(|(_, hook)| {
                if let Some(hook_id) = &query.hook_id {
                    if &hook.hook_id != hook_id {
                        return false;
                    }
                }
                if let Some(only_fired) = query.only_fired {
                    if hook.fired != only_fired {
                        return false;
                    }
                }
                if let Some(only_failed) = query.only_failed_workflows {
                    if hook.workflow_ok == only_failed {
                        return false;
                    }
                }
                true
            })
            .collect();

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        results
    }

    pub fn stats(&self) -> ReceiptStats {
        let mut stats = ReceiptStats { total_receipts: self.records.len(), ..ReceiptStats::default() };
        for record in &self.records {
            for hook in &record.receipt.hooks {
                stats.total_hook_evaluations += 1;
                if hook.fired {
                    stats.fired_hook_evaluations += 1;
                }
                if !hook.workflow_ok {
                    stats.failed_workflows += 1;
                }
                for step in &hook.steps {
                    stats.total_step_duration_ms += step.duration_ms;
                    stats.total_steps += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HookReceipt, StepReceipt};
    use chrono::Utc;
    use git2::{Repository, Signature};
    use serde_json::Map;
    use std::path::Path;

    fn repo_with_commits(dir: &Path, n: usize) -> Vec<Oid> {
        let repo = Repository::init(dir).unwrap();
        let mut commits = Vec::new();
        let sig = Signature::now("t", "t@example.org").unwrap();
        let mut parents_ids: Vec<Oid> = Vec::new();
        for i in 0..n {
            std::fs::write(dir.join("a.txt"), format!("{i}")).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("a.txt")).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let parents: Vec<_> = parents_ids.last().map(|id| repo.find_commit(*id).unwrap()).into_iter().collect();
            let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
            let commit_id = repo.commit(Some("HEAD"), &sig, &sig, &format!("commit {i}"), &tree, &parent_refs).unwrap();
            parents_ids.push(commit_id);
            commits.push(commit_id);
        }
        commits
    }

    #[test]
    fn index_builds_over_commits_with_and_without_receipts() {
        let tmp = tempfile::tempdir().unwrap();
        let commits = repo_with_commits(tmp.path(), 3);
        let git = GitInterface::open(tmp.path()).unwrap();
        let writer = ReceiptWriter::new(&git, "gitvan", "gitvan@local");
        let now = Utc::now();

        let hook = HookReceipt {
            hook_id: "h1".to_string(),
            predicate_type: "ask".to_string(),
            fired: true,
            context: Map::new(),
            workflow_ok: true,
            steps: vec![StepReceipt { id: "s1".to_string(), ok: true, duration_ms: 10, error: None, outputs: Map::new() }],
        };
        writer.merge_write(commits[1], &commits[1].to_string(), vec![hook], now, now).unwrap();

        let index = ReceiptIndex::build(&git, commits.clone()).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get(commits[1]).is_some());
        assert!(index.get(commits[0]).is_none());
    }

    #[test]
    fn query_filters_by_hook_id() {
        let tmp = tempfile::tempdir().unwrap();
        let commits = repo_with_commits(tmp.path(), 2);
        let git = GitInterface::open(tmp.path()).unwrap();
        let writer = ReceiptWriter::new(&git, "gitvan", "gitvan@local");
        let now = Utc::now();

        for (i, commit) in commits.iter().enumerate() {
            let hook = HookReceipt {
                hook_id: format!("h{i}"),
                predicate_type: "ask".to_string(),
                fired: true,
                context: Map::new(),
                workflow_ok: true,
                steps: vec![],
            };
            writer.merge_write(*commit, &commit.to_string(), vec![hook], now, now).unwrap();
        }

        let index = ReceiptIndex::build(&git, commits).unwrap();
        let results = index.query(&ReceiptQuery { hook_id: Some("h0".to_string()), ..Default::default() });
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.hook_id, "h0");
    }

    #[test]
    fn stats_counts_fired_and_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let commits = repo_with_commits(tmp.path(), 1);
        let git = GitInterface::open(tmp.path()).unwrap();
        let writer = ReceiptWriter::new(&git, "gitvan", "gitvan@local");
        let now = Utc::now();

        let hooks = vec![
            HookReceipt { hook_id: "h1".to_string(), predicate_type: "ask".to_string(), fired: true, context: Map::new(), workflow_ok: true, steps: vec![] },
            HookReceipt { hook_id: "h2".to_string(), predicate_type: "ask".to_string(), fired: false, context: Map::new(), workflow_ok: false, steps: vec![] },
        ];
        writer.merge_write(commits[0], &commits[0].to_string(), hooks, now, now).unwrap();

        let index = ReceiptIndex::build(&git, commits).unwrap();
        let stats = index.stats();
        assert_eq!(stats.total_hook_evaluations, 2);
        assert_eq!(stats.fired_hook_evaluations, 1);
        assert_eq!(stats.failed_workflows, 1);
    }
}
