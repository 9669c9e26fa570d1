//! Git step: a narrow, read-only window onto the repository for
//! workflows that need to inspect history rather than the knowledge
//! graph — e.g. "does this commit have a parent", "what note is already
//! attached". Mutating subcommands are deliberately absent: every write
//! the engine itself performs (locks, receipts) goes through the
//! orchestrator, never through a workflow-authored step.

use crate::error::{StepError, StepExecResult};
use crate::RunnerConfig;
use gitvan_git::GitInterface;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ALLOWED_SUBCOMMANDS: &[&str] = &["head", "current-branch", "read-blob", "list-files", "note-read"];

pub async fn run(step_id: &str, config: &BTreeMap<String, Value>, git: &GitInterface, runner_config: &RunnerConfig) -> StepExecResult<Map<String, Value>> {
    let subcommand = config
        .get("subcommand")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "subcommand".to_string() })?;

    if !ALLOWED_SUBCOMMANDS.contains(&subcommand) {
        return Err(StepError::Security {
            step: step_id.to_string(),
            reason: format!("git subcommand '{subcommand}' is not on the allowed list"),
        });
    }
    if !runner_config.allowed_git_subcommands.is_empty() && !runner_config.allowed_git_subcommands.contains(subcommand) {
        return Err(StepError::Security {
            step: step_id.to_string(),
            reason: format!("git subcommand '{subcommand}' is disabled by runner configuration"),
        });
    }

    let mut outputs = Map::new();
    match subcommand {
        "head" => {
            let head = git.head().map_err(StepError::Git)?;
            outputs.insert("oid".to_string(), Value::String(head.to_string()));
        }
        "current-branch" => {
            let branch = git.current_branch().map_err(StepError::Git)?;
            outputs.insert("branch".to_string(), branch.map(Value::String).unwrap_or(Value::Null));
        }
        "read-blob" => {
            let path = config
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "path".to_string() })?;
            let head = git.head().map_err(StepError::Git)?;
            let content = git.read_blob(head, path).map_err(StepError::Git)?;
            outputs.insert("content".to_string(), Value::String(String::from_utf8_lossy(&content).into_owned()));
        }
        "list-files" => {
            let dir = config.get("dir").and_then(Value::as_str).unwrap_or("");
            let extension = config.get("extension").and_then(Value::as_str).unwrap_or("ttl");
            let head = git.head().map_err(StepError::Git)?;
            let files = git.list_files(head, dir, extension).map_err(StepError::Git)?;
            outputs.insert("files".to_string(), serde_json::json!(files));
        }
        "note-read" => {
            let notes_ref = config
                .get("notes_ref")
                .and_then(Value::as_str)
                .ok_or_else(|| StepError::MissingField { step: step_id.to_string(), field: "notes_ref".to_string() })?;
            let head = git.head().map_err(StepError::Git)?;
            let note = git.note_read(notes_ref, head).map_err(StepError::Git)?;
            outputs.insert("note".to_string(), note.map(Value::String).unwrap_or(Value::Null));
        }
        _ => unreachable!("checked against ALLOWED_SUBCOMMANDS above"),
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use std::path::Path;

    fn repo_with_commit(dir: &Path) -> git2::Oid {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("a.txt"), "hello").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("t", "t@example.org").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap()
    }

    #[tokio::test]
    async fn head_subcommand_returns_oid() {
        let tmp = tempfile::tempdir().unwrap();
        let commit = repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let runner_config = RunnerConfig::default();
        let mut cfg = BTreeMap::new();
        cfg.insert("subcommand".to_string(), Value::String("head".to_string()));
        let out = run("s1", &cfg, &git, &runner_config).await.unwrap();
        assert_eq!(out["oid"], Value::String(commit.to_string()));
    }

    #[tokio::test]
    async fn disallowed_subcommand_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        repo_with_commit(tmp.path());
        let git = GitInterface::open(tmp.path()).unwrap();
        let runner_config = RunnerConfig::default();
        let mut cfg = BTreeMap::new();
        cfg.insert("subcommand".to_string(), Value::String("push".to_string()));
        let err = run("s1", &cfg, &git, &runner_config).await.unwrap_err();
        matches!(err, StepError::Security { .. });
    }
}
