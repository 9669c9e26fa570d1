//! `gitvan-khe`: the library surface behind the `gitvan-khe` binary —
//! re-exports of the eleven component crates plus the binary's own
//! [`config::GitVanConfig`]. Nothing here has logic of its own; it exists
//! so `src/main.rs` (and any test harness) has one crate to depend on
//! instead of wiring up eleven path dependencies by hand.

pub mod config;
pub mod tracing_init;

pub use gitvan_cache as cache;
pub use gitvan_context as context;
pub use gitvan_git as git;
pub use gitvan_hooks as hooks;
pub use gitvan_loader as loader;
pub use gitvan_orchestrator as orchestrator;
pub use gitvan_planner as planner;
pub use gitvan_predicate as predicate;
pub use gitvan_rdf as rdf;
pub use gitvan_receipt as receipt;
pub use gitvan_runner as runner;

pub use config::GitVanConfig;
