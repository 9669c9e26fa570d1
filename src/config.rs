//! `GitVanConfig`: the binary's one configuration surface, loaded from an
//! optional TOML file and overridden by `GITVAN_*` environment variables,
//! collapsed onto a single flat struct since the engine has no
//! per-subsystem config files to merge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gitvan_orchestrator::OrchestratorConfig;
use gitvan_runner::RunnerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitVanConfig {
    pub repo_root: PathBuf,
    pub graph_dir: String,
    pub base_iri: String,
    pub cache_dir: PathBuf,
    pub cache_memory_capacity: usize,
    pub cache_memory_capacity_bytes: usize,
    pub predicate_timeout_ms: u64,
    pub max_shacl_violations: usize,
    pub step_default_timeout_ms: u64,
    pub concurrency_limit: usize,
    pub lock_ttl_secs: u64,
    pub locks_prefix: String,
    pub notes_ref: String,
    pub author_name: String,
    pub author_email: String,
    pub allowed_shell_commands: Vec<String>,
    pub allowed_git_subcommands: Vec<String>,
    pub http_allow_non_2xx: bool,
}

impl Default for GitVanConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            graph_dir: "hooks".to_string(),
            base_iri: "http://gitvan.dev/ns/repo#".to_string(),
            cache_dir: PathBuf::from(".gitvan/cache"),
            cache_memory_capacity: 256,
            cache_memory_capacity_bytes: gitvan_cache::DEFAULT_MEMORY_CAPACITY_BYTES,
            predicate_timeout_ms: 5_000,
            max_shacl_violations: 100,
            step_default_timeout_ms: 30_000,
            concurrency_limit: 4,
            lock_ttl_secs: 60 * 60,
            locks_prefix: "refs/gitvan/locks/eval/".to_string(),
            notes_ref: "refs/notes/gitvan/receipts".to_string(),
            author_name: "gitvan".to_string(),
            author_email: "gitvan@local".to_string(),
            allowed_shell_commands: Vec::new(),
            allowed_git_subcommands: vec!["status".to_string(), "log".to_string(), "diff".to_string(), "show".to_string()],
            http_allow_non_2xx: false,
        }
    }
}

impl GitVanConfig {
    /// Loads the config file at `path` (if given and present), then
    /// layers `GITVAN_*` environment variables on top — nested fields use
    /// a double-underscore separator (e.g. `GITVAN__CONCURRENCY_LIMIT`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("repo_root", defaults.repo_root.to_string_lossy().into_owned())?
            .set_default("graph_dir", defaults.graph_dir.clone())?
            .set_default("base_iri", defaults.base_iri.clone())?
            .set_default("cache_dir", defaults.cache_dir.to_string_lossy().into_owned())?
            .set_default("cache_memory_capacity", defaults.cache_memory_capacity as i64)?
            .set_default("cache_memory_capacity_bytes", defaults.cache_memory_capacity_bytes as i64)?
            .set_default("predicate_timeout_ms", defaults.predicate_timeout_ms as i64)?
            .set_default("max_shacl_violations", defaults.max_shacl_violations as i64)?
            .set_default("step_default_timeout_ms", defaults.step_default_timeout_ms as i64)?
            .set_default("concurrency_limit", defaults.concurrency_limit as i64)?
            .set_default("lock_ttl_secs", defaults.lock_ttl_secs as i64)?
            .set_default("locks_prefix", defaults.locks_prefix.clone())?
            .set_default("notes_ref", defaults.notes_ref.clone())?
            .set_default("author_name", defaults.author_name.clone())?
            .set_default("author_email", defaults.author_email.clone())?
            .set_default("allowed_shell_commands", defaults.allowed_shell_commands.clone())?
            .set_default("allowed_git_subcommands", defaults.allowed_git_subcommands.clone())?
            .set_default("http_allow_non_2xx", defaults.http_allow_non_2xx)?;

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("GITVAN").separator("__"));

        let loaded: Self = builder.build()?.try_deserialize()?;
        Ok(loaded)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            base_iri: self.base_iri.clone(),
            graph_dir: self.graph_dir.clone(),
            predicate_timeout_ms: self.predicate_timeout_ms,
            max_shacl_violations: self.max_shacl_violations,
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            locks_prefix: self.locks_prefix.clone(),
            notes_ref: self.notes_ref.clone(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            workspace_root: self.repo_root.clone(),
            default_timeout_ms: self.step_default_timeout_ms,
            concurrency_limit: self.concurrency_limit,
            allowed_shell_commands: self.allowed_shell_commands.iter().cloned().collect(),
            allowed_git_subcommands: self.allowed_git_subcommands.iter().cloned().collect(),
            http_allow_non_2xx: self.http_allow_non_2xx,
        }
    }
}
