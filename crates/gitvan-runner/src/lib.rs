//! Step Runner: executes a single step of a given [`StepKind`], given the
//! step's already-interpolated config, the workflow's [`ExecutionContext`],
//! and shared references to the Artifact Cache and Git Interface.
//!
//! Steps never interpolate their own config — the orchestrator (or, for
//! nested steps, the control-flow step itself) always calls
//! [`gitvan_context::interpolate_config`] first and hands the runner a
//! fully-resolved [`StepConfig`].

pub mod error;
pub mod steps;

pub use error::{StepError, StepExecResult};

use gitvan_cache::Cache;
use gitvan_context::ExecutionContext;
use gitvan_git::GitInterface;
use gitvan_hooks::{Step, StepKind};
use serde_json::Map;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runner-wide configuration: a plain value type, constructed once at
/// startup and threaded down by reference.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub workspace_root: PathBuf,
    pub default_timeout_ms: u64,
    pub concurrency_limit: usize,
    pub allowed_shell_commands: BTreeSet<String>,
    pub allowed_git_subcommands: BTreeSet<String>,
    pub http_allow_non_2xx: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            default_timeout_ms: 30_000,
            concurrency_limit: 4,
            allowed_shell_commands: BTreeSet::new(),
            allowed_git_subcommands: ["status", "log", "diff", "show"].iter().map(|s| s.to_string()).collect(),
            http_allow_non_2xx: false,
        }
    }
}

/// The outcome of running one step, independent of whether it succeeded —
/// mirrors spec.md's `StepResult{ok, outputs, error?, duration_ms}` record
/// so the planner/orchestrator can build a receipt without re-deriving
/// timing or success from a `Result<_, _>`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub ok: bool,
    pub outputs: Map<String, serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Everything a step implementation may need, bundled so `execute` doesn't
/// grow an ever-longer parameter list as step kinds accrue dependencies.
pub struct StepRunner {
    pub config: RunnerConfig,
    pub cache: Arc<Cache>,
    pub git: Arc<GitInterface>,
    pub database: Arc<dyn DatabaseConnector>,
}

impl StepRunner {
    pub fn new(config: RunnerConfig, cache: Arc<Cache>, git: Arc<GitInterface>, database: Arc<dyn DatabaseConnector>) -> Self {
        Self { config, cache, git, database }
    }

    /// Runs a single step to completion (or timeout), returning a
    /// [`StepOutcome`] rather than propagating the step's own error —
    /// a step failure does not unwind the batch, it is recorded so the
    /// caller (orchestrator, or a Conditional/Loop/ErrorHandler step) can
    /// decide how to react.
    pub async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> StepOutcome {
        let started = Instant::now();
        let timeout_ms = step.timeout_ms.filter(|&t| t > 0).unwrap_or(self.config.default_timeout_ms);

        if ctx.is_canceled() {
            return StepOutcome {
                step_id: step.id.clone(),
                ok: false,
                outputs: Map::new(),
                error: Some(StepError::Canceled { step: step.id.clone() }.to_string()),
                duration_ms: started.elapsed().as_millis() as u64,
            };
        }

        let resolved = match gitvan_context::interpolate_config(&step.id, &step.config, ctx) {
            Ok(config) => Step { config, ..step.clone() },
            Err(err) => {
                return StepOutcome {
                    step_id: step.id.clone(),
                    ok: false,
                    outputs: Map::new(),
                    error: Some(StepError::from(err).to_string()),
                    duration_ms: started.elapsed().as_millis() as u64,
                };
            }
        };

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), self.dispatch(&resolved, ctx, timeout_ms)).await;

        let outcome = match result {
            Ok(Ok(outputs)) => (true, outputs, None),
            Ok(Err(err)) => (false, Map::new(), Some(err.to_string())),
            Err(_) => (false, Map::new(), Some(StepError::Timeout { step: step.id.clone(), timeout_ms }.to_string())),
        };

        if outcome.0 {
            ctx.set_output(&step.id, outcome.1.clone());
        }

        StepOutcome {
            step_id: step.id.clone(),
            ok: outcome.0,
            outputs: outcome.1,
            error: outcome.2,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Boxed because the control-flow kinds recurse back into
    /// [`Self::execute`]/[`Self::execute_batch`], which would otherwise
    /// give this function's future an infinite, statically-unbounded
    /// size (each nested `dispatch` call embeds another copy of itself).
    fn dispatch<'a>(&'a self, step: &'a Step, ctx: &'a ExecutionContext, timeout_ms: u64) -> futures::future::BoxFuture<'a, StepExecResult<Map<String, serde_json::Value>>> {
        use futures::FutureExt;
        async move {
            match step.kind {
                StepKind::Sparql => steps::sparql::run(&step.id, &step.config, ctx, &self.cache, timeout_ms).await,
                StepKind::Template => steps::template::run(&step.id, &step.config, &self.config).await,
                StepKind::File => steps::file::run(&step.id, &step.config, &self.config).await,
                StepKind::Http => steps::http::run(&step.id, &step.config, &self.config).await,
                StepKind::Git => steps::git::run(&step.id, &step.config, &self.git, &self.config).await,
                StepKind::Shell => steps::shell::run(&step.id, &step.config, &self.config).await,
                StepKind::Database => steps::database::run(&step.id, &step.config, self.database.as_ref()).await,
                StepKind::Filesystem => steps::filesystem::run(&step.id, &step.config, &self.config).await,
                StepKind::Notify => steps::notify::run(&step.id, &step.config).await,
                StepKind::Conditional | StepKind::Loop | StepKind::Parallel | StepKind::ErrorHandler => {
                    steps::control::run(step, ctx, self).await
                }
            }
        }
        .boxed()
    }

    /// Runs a batch of independent steps with bounded concurrency, via
    /// `buffer_unordered` rather than `tokio::spawn`, so the runner never
    /// needs its futures to be `'static` — a batch borrows `self` and
    /// `ctx` for its whole lifetime.
    pub async fn execute_batch(&self, steps: &[Step], ctx: &ExecutionContext) -> Vec<StepOutcome> {
        use futures::stream::{self, StreamExt};

        stream::iter(steps.iter())
            .map(|step| self.execute(step, ctx))
            .buffer_unordered(self.config.concurrency_limit.max(1))
            .collect()
            .await
    }
}

/// A pluggable backend for the Database step kind. The runner ships with
/// [`UnconfiguredDatabase`], which refuses every query — a concrete
/// connector (Postgres, SQLite, ...) is wired in by the binary that
/// assembles the [`StepRunner`].
#[async_trait::async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn query(&self, statement: &str, params: &[serde_json::Value]) -> StepExecResult<Map<String, serde_json::Value>>;
}

pub struct UnconfiguredDatabase;

#[async_trait::async_trait]
impl DatabaseConnector for UnconfiguredDatabase {
    async fn query(&self, _statement: &str, _params: &[serde_json::Value]) -> StepExecResult<Map<String, serde_json::Value>> {
        Err(StepError::DatabaseNotConfigured { step: "database".to_string() })
    }
}

/// Resolves a step-supplied relative path against the workspace root,
/// rejecting anything that would escape it. Every step kind that touches
/// the filesystem (Template, File, Filesystem) goes through this.
pub(crate) fn workspace_path(step_id: &str, config: &RunnerConfig, relative: &str) -> StepExecResult<PathBuf> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(StepError::Security { step: step_id.to_string(), reason: "absolute paths are forbidden".to_string() });
    }
    if relative.split('/').any(|segment| segment == "..") {
        return Err(StepError::Security { step: step_id.to_string(), reason: "path traversal (..) is forbidden".to_string() });
    }
    Ok(config.workspace_root.join(candidate))
}
