//! Thin binary entry point: wires the Git Interface, Artifact Cache, Step
//! Runner, and Orchestrator together and drives one Git lifecycle event end
//! to end. Not a product CLI — `gitvan-khe on-commit` is enough to exercise
//! the engine against a real repository.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use git2::Oid;
use gitvan_khe::cache::Cache;
use gitvan_khe::config::GitVanConfig;
use gitvan_khe::git::GitInterface;
use gitvan_khe::orchestrator::Orchestrator;
use gitvan_khe::runner::{StepRunner, UnconfiguredDatabase};
use gitvan_khe::tracing_init;

#[derive(Parser)]
#[command(name = "gitvan-khe", about = "Knowledge Hook Engine: Git-native automation over an RDF knowledge graph")]
struct Cli {
    /// Path to the Git repository to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Optional TOML config file; `GITVAN_*` env vars always take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every hook against a commit and write its receipt. The
    /// default command when none is given.
    OnCommit {
        /// Commit to evaluate; defaults to the repository's current HEAD.
        #[arg(long)]
        commit: Option<String>,
    },
    /// Delete abandoned evaluation-lock refs older than the configured TTL.
    ReapLocks,
    /// Sweep the on-disk cache tier for expired, schema-stale, or corrupted
    /// entries, reporting what was evicted.
    RevalidateCache {
        #[arg(long, default_value = "graph")]
        namespace: String,
        #[arg(long, default_value_t = 1)]
        schema_version: u32,
    },
    /// Long-running mode: evaluate HEAD once, then revalidate the cache on
    /// a fixed interval until interrupted. The nearest this binary comes to
    /// the daemon `gitvan`'s own deployment runs as.
    Serve {
        #[arg(long, default_value_t = 86_400)]
        revalidate_interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_init::init();

    let cli = Cli::parse();
    let config = GitVanConfig::load(cli.config.as_deref())?;

    let git = Arc::new(GitInterface::discover(&cli.repo)?);
    let cache = Arc::new(Cache::with_memory_limits(&config.cache_dir, config.cache_memory_capacity, config.cache_memory_capacity_bytes));

    match cli.command.unwrap_or(Command::OnCommit { commit: None }) {
        Command::OnCommit { commit } => run_on_commit(git, cache, &config, commit).await,
        Command::ReapLocks => run_reap_locks(git, &config),
        Command::RevalidateCache { namespace, schema_version } => run_revalidate_cache(cache, &namespace, schema_version),
        Command::Serve { revalidate_interval_secs } => run_serve(git, cache, &config, revalidate_interval_secs).await,
    }
}

/// Runs `on-commit` once against HEAD, then owns a `tokio::time::interval`
/// task revalidating the disk cache's `graph` namespace until the process
/// receives Ctrl-C. The interval task is spawned here rather than inside
/// `gitvan-cache` — the cache crate only exposes the one-shot
/// `revalidate_all` — the schedule is the binary's concern, not the
/// cache crate's.
async fn run_serve(git: Arc<GitInterface>, cache: Arc<Cache>, config: &GitVanConfig, revalidate_interval_secs: u64) -> anyhow::Result<()> {
    run_on_commit(git.clone(), cache.clone(), config, None).await?;

    let revalidate_cache = cache.clone();
    let schema_version = 1;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(revalidate_interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match revalidate_cache.revalidate_all("graph", schema_version) {
                Ok(report) => tracing::info!(?report, "scheduled cache revalidation complete"),
                Err(err) => tracing::warn!(error = %err, "scheduled cache revalidation failed"),
            }
        }
    });

    tracing::info!(interval_secs = revalidate_interval_secs, "serving; revalidation task scheduled, waiting for Ctrl-C");
    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn run_on_commit(git: Arc<GitInterface>, cache: Arc<Cache>, config: &GitVanConfig, commit: Option<String>) -> anyhow::Result<()> {
    let commit = match commit {
        Some(sha) => Oid::from_str(&sha)?,
        None => git.head()?,
    };

    let database = Arc::new(UnconfiguredDatabase);
    let runner = StepRunner::new(config.runner_config(), cache.clone(), git.clone(), database);
    let orchestrator = Orchestrator::new(git, cache, runner, config.orchestrator_config());

    match orchestrator.run_event(commit).await? {
        Some(receipt) => {
            let fired = receipt.hooks.iter().filter(|h| h.fired).count();
            let failed = receipt.hooks.iter().filter(|h| !h.workflow_ok).count();
            tracing::info!(commit = %commit, hooks_evaluated = receipt.hooks.len(), hooks_fired = fired, hooks_failed = failed, "event processed");
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            if failed > 0 {
                std::process::exit(1);
            }
        }
        None => {
            tracing::info!(commit = %commit, "another process is already evaluating this commit, exiting");
        }
    }
    Ok(())
}

fn run_reap_locks(git: Arc<GitInterface>, config: &GitVanConfig) -> anyhow::Result<()> {
    let reaped = git.reap_stale_locks(&config.locks_prefix, Duration::from_secs(config.lock_ttl_secs))?;
    for r in &reaped {
        tracing::info!(reference = %r, "reaped stale lock");
    }
    println!("reaped {} stale lock(s)", reaped.len());
    Ok(())
}

fn run_revalidate_cache(cache: Arc<Cache>, namespace: &str, schema_version: u32) -> anyhow::Result<()> {
    let report = cache.revalidate_all(namespace, schema_version)?;
    tracing::info!(
        scanned = report.scanned,
        expired = report.expired,
        schema_evicted = report.schema_evicted,
        corrupted = report.corrupted,
        "cache revalidation complete"
    );
    println!("{report:?}");
    Ok(())
}
