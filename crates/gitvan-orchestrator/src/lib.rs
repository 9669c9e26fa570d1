//! Orchestrator: the single entry point invoked per Git lifecycle event
//! (§4.10). Acquires the per-commit evaluation lock, loads the current
//! (and previous) knowledge graph, parses hooks tolerantly, evaluates
//! each hook's predicate in lexicographic `hook_id` order, plans and
//! runs the workflows of every fired hook, and writes one merged
//! receipt — releasing the lock whether the run succeeded or not.

pub mod error;

pub use error::{OrchestratorError, OrchestratorResult};

use chrono::Utc;
use git2::Oid;
use gitvan_cache::Cache;
use gitvan_context::ExecutionContext;
use gitvan_git::{GitInterface, LockGuard};
use gitvan_hooks::Hook;
use gitvan_receipt::{HookReceipt, Receipt, ReceiptWriter, StepErrorInfo, StepReceipt};
use gitvan_runner::StepRunner;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Everything about an event run that is not already captured in
/// [`gitvan_runner::RunnerConfig`] (workspace root, step timeouts,
/// allowlists) — the orchestrator's own concerns: where the knowledge
/// graph lives, how predicates are bounded, and where locks/receipts go.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub base_iri: String,
    pub graph_dir: String,
    pub predicate_timeout_ms: u64,
    pub max_shacl_violations: usize,
    pub lock_ttl: Duration,
    pub locks_prefix: String,
    pub notes_ref: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_iri: "http://gitvan.dev/ns/repo#".to_string(),
            graph_dir: "hooks".to_string(),
            predicate_timeout_ms: 5_000,
            max_shacl_violations: 100,
            lock_ttl: Duration::from_secs(60 * 60),
            locks_prefix: "refs/gitvan/locks/eval/".to_string(),
            notes_ref: "refs/notes/gitvan/receipts".to_string(),
            author_name: "gitvan".to_string(),
            author_email: "gitvan@local".to_string(),
        }
    }
}

/// Ties the Git Interface, Artifact Cache, and Step Runner together
/// behind the per-event entry point. Constructed once per process (or
/// per repository, for a long-lived service) and reused across events;
/// nothing here is per-commit state.
pub struct Orchestrator {
    git: Arc<GitInterface>,
    cache: Arc<Cache>,
    runner: StepRunner,
    config: OrchestratorConfig,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(git: Arc<GitInterface>, cache: Arc<Cache>, runner: StepRunner, config: OrchestratorConfig) -> Self {
        Self {
            git,
            cache,
            runner,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative cancellation: observed between steps and between
    /// planner batches (§5), never mid-step. Safe to call from a signal
    /// handler or another thread while [`Self::run_event`] is in flight.
    pub fn request_cancellation(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Run one Git lifecycle event for `commit`. `Ok(None)` means
    /// another process is already handling this commit (the lock CAS
    /// lost the race) — this is the single unrecoverable condition in
    /// §7 and it exits cleanly rather than erroring. Every other
    /// condition, including a hook that fails validation or a step that
    /// fails, is absorbed into the returned receipt.
    pub async fn run_event(&self, commit: Oid) -> OrchestratorResult<Option<Receipt>> {
        self.cancel.store(false, Ordering::Relaxed);

        let _ = self.git.reap_stale_locks(&self.config.locks_prefix, self.config.lock_ttl);

        let lock_ref = format!("{}{}", self.config.locks_prefix, commit);
        let guard = match LockGuard::acquire(&self.git, &lock_ref, commit) {
            Ok(guard) => guard,
            Err(gitvan_git::GitError::RefConflict { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let receipt = self.run_locked(commit).await;

        if let Err(e) = guard.release() {
            tracing::warn!(commit = %commit, error = %e, "failed to release evaluation lock");
        }

        receipt.map(Some)
    }

    async fn run_locked(&self, commit: Oid) -> OrchestratorResult<Receipt> {
        let started_at = Utc::now();
        let commit_sha = commit.to_string();

        let current = gitvan_loader::load_graph(&self.git, &self.cache, &self.config.base_iri, &self.config.graph_dir, commit)?;
        let previous = gitvan_loader::load_previous_graph(&self.git, &self.cache, &self.config.base_iri, &self.config.graph_dir, commit);

        let (hooks, unusable) = gitvan_hooks::parse_hooks_tolerant(&current, &self.cache).await?;
        for (hook_id, err) in &unusable {
            tracing::warn!(hook_id, error = %err, "excluded hook from this event");
        }

        let mut hook_receipts = Vec::with_capacity(hooks.len());
        for hook in &hooks {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            hook_receipts.push(self.evaluate_and_run(hook, &current, previous.as_ref(), &commit_sha).await);
        }

        let finished_at = Utc::now();
        let writer = ReceiptWriter::new(&self.git, &self.config.author_name, &self.config.author_email).with_notes_ref(&self.config.notes_ref);
        let receipt = writer.merge_write(commit, &commit_sha, hook_receipts, started_at, finished_at)?;
        Ok(receipt)
    }

    async fn evaluate_and_run(
        &self,
        hook: &Hook,
        current: &gitvan_rdf::Graph,
        previous: Option<&gitvan_rdf::Graph>,
        commit_sha: &str,
    ) -> HookReceipt {
        let predicate_type = hook.predicate.type_name().to_string();

        let outcome = match gitvan_predicate::evaluate(hook, current, previous, self.config.predicate_timeout_ms, self.config.max_shacl_violations).await {
            Ok(o) => o,
            Err(e) => {
                let mut context = Map::new();
                context.insert("error".to_string(), json!(e.to_string()));
                gitvan_predicate::PredicateOutcome { fired: false, context }
            }
        };

        if !outcome.fired || !hook.is_fireable() {
            return HookReceipt {
                hook_id: hook.id.clone(),
                predicate_type,
                fired: outcome.fired,
                context: outcome.context,
                workflow_ok: true,
                steps: Vec::new(),
            };
        }

        let cancel_flag = self.cancel.clone();
        let mut steps = Vec::new();
        let mut workflow_ok = true;

        for workflow in &hook.workflows {
            if cancel_flag.load(Ordering::Relaxed) {
                workflow_ok = false;
                steps.push(canceled_step_receipt(&workflow.id));
                break;
            }

            let plan = match gitvan_planner::plan(workflow) {
                Ok(plan) => plan,
                Err(e) => {
                    workflow_ok = false;
                    steps.push(StepReceipt {
                        id: workflow.id.clone(),
                        ok: false,
                        duration_ms: 0,
                        error: Some(StepErrorInfo { kind: "ValidationError".to_string(), message: e.to_string() }),
                        outputs: Map::new(),
                    });
                    continue;
                }
            };

            let ctx = ExecutionContext::with_cancellation(
                workflow.id.clone(),
                commit_sha.to_string(),
                Map::new(),
                current.clone(),
                previous.cloned(),
                cancel_flag.clone(),
            );

            for batch in &plan.batches {
                if cancel_flag.load(Ordering::Relaxed) {
                    workflow_ok = false;
                    steps.push(canceled_step_receipt(&workflow.id));
                    break;
                }
                let batch_steps: Vec<_> = batch.steps.iter().map(|p| p.step.clone()).collect();
                let outcomes = self.runner.execute_batch(&batch_steps, &ctx).await;
                for outcome in &outcomes {
                    if !outcome.ok {
                        workflow_ok = false;
                    }
                    steps.push(StepReceipt::from(outcome));
                }
            }
        }

        HookReceipt {
            hook_id: hook.id.clone(),
            predicate_type,
            fired: true,
            context: outcome.context,
            workflow_ok,
            steps,
        }
    }
}

fn canceled_step_receipt(workflow_id: &str) -> StepReceipt {
    StepReceipt {
        id: workflow_id.to_string(),
        ok: false,
        duration_ms: 0,
        error: Some(StepErrorInfo { kind: "Canceled".to_string(), message: "workflow canceled before completion".to_string() }),
        outputs: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitvan_cache::Cache;
    use gitvan_runner::{RunnerConfig, StepRunner, UnconfiguredDatabase};
    use git2::{Repository, Signature};
    use std::path::Path;

    fn init_repo_with_hooks(dir: &Path, hook_ttl: &str) -> Oid {
        let repo = Repository::init(dir).unwrap();
        std::fs::create_dir_all(dir.join("hooks")).unwrap();
        std::fs::write(dir.join("hooks/main.ttl"), hook_ttl).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("hooks/main.ttl")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("t", "t@example.org").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap()
    }

    fn test_orchestrator(repo_dir: &Path, cache_dir: &Path) -> Orchestrator {
        let git = Arc::new(GitInterface::open(repo_dir).unwrap());
        let cache = Arc::new(Cache::new(cache_dir, 32));
        let runner_config = RunnerConfig { workspace_root: repo_dir.to_path_buf(), ..RunnerConfig::default() };
        let runner = StepRunner::new(runner_config, cache.clone(), git.clone(), Arc::new(UnconfiguredDatabase));
        Orchestrator::new(git, cache, runner, OrchestratorConfig::default())
    }

    const ASK_HOOK_TTL: &str = r#"
        @prefix gh: <http://gitvan.dev/ns/hooks#> .
        @prefix dct: <http://purl.org/dc/terms/> .
        @prefix ex: <http://example.org/> .

        ex:hook1 a gh:Hook ;
            dct:title "always fires" ;
            gh:hasPredicate ex:pred1 ;
            gh:orderedPipelines (ex:wf1) .
        ex:pred1 a gh:AskPredicate ; gh:queryText "ASK { ?s ?p ?o }" .
        ex:wf1 gh:orderedSteps (ex:step1) .
        ex:step1 gh:stepId "notify" ; gh:stepKind "notify" ;
            gh:configJson "{\"target\": \"slack\", \"payload\": \"done\"}" .
    "#;

    #[tokio::test]
    async fn run_event_writes_a_receipt_for_a_fired_hook() {
        let repo_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let commit = init_repo_with_hooks(repo_dir.path(), ASK_HOOK_TTL);
        let orchestrator = test_orchestrator(repo_dir.path(), cache_dir.path());

        let receipt = orchestrator.run_event(commit).await.unwrap().unwrap();
        assert_eq!(receipt.hooks.len(), 1);
        assert!(receipt.hooks[0].fired);
        assert_eq!(receipt.hooks[0].steps.len(), 1);
        assert!(receipt.hooks[0].steps[0].ok);
    }

    #[tokio::test]
    async fn second_concurrent_run_on_same_commit_exits_cleanly() {
        let repo_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let commit = init_repo_with_hooks(repo_dir.path(), ASK_HOOK_TTL);
        let git = Arc::new(GitInterface::open(repo_dir.path()).unwrap());

        let lock_ref = format!("{}{}", OrchestratorConfig::default().locks_prefix, commit);
        let _held = LockGuard::acquire(&git, &lock_ref, commit).unwrap();

        let orchestrator = test_orchestrator(repo_dir.path(), cache_dir.path());
        let result = orchestrator.run_event(commit).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn hook_missing_title_is_excluded_but_event_still_produces_a_receipt() {
        let repo_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let broken_and_good = format!(
            "{ASK_HOOK_TTL}\n@prefix gh: <http://gitvan.dev/ns/hooks#> .\n@prefix ex: <http://example.org/> .\nex:hook2 a gh:Hook ; gh:hasPredicate ex:pred1 ; gh:orderedPipelines (ex:wf1) ."
        );
        let commit = init_repo_with_hooks(repo_dir.path(), &broken_and_good);
        let orchestrator = test_orchestrator(repo_dir.path(), cache_dir.path());

        let receipt = orchestrator.run_event(commit).await.unwrap().unwrap();
        assert_eq!(receipt.hooks.len(), 1);
        assert_eq!(receipt.hooks[0].hook_id, "http://example.org/hook1");
    }
}
