//! Error taxonomy for the Orchestrator.

use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Git(#[from] gitvan_git::GitError),

    #[error(transparent)]
    Loader(#[from] gitvan_loader::LoaderError),

    #[error(transparent)]
    Hook(#[from] gitvan_hooks::HookError),

    #[error(transparent)]
    Predicate(#[from] gitvan_predicate::PredicateError),

    #[error(transparent)]
    Plan(#[from] gitvan_planner::PlannerError),

    #[error(transparent)]
    Context(#[from] gitvan_context::ContextError),

    #[error(transparent)]
    Receipt(#[from] gitvan_receipt::ReceiptError),
}
