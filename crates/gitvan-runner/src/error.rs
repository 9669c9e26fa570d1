//! Error taxonomy for the Step Runner.

use thiserror::Error;

pub type StepExecResult<T> = Result<T, StepError>;

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Rdf(#[from] gitvan_rdf::RdfError),

    #[error(transparent)]
    Context(#[from] gitvan_context::ContextError),

    #[error(transparent)]
    Git(#[from] gitvan_git::GitError),

    #[error(transparent)]
    Cache(#[from] gitvan_cache::CacheError),

    #[error(transparent)]
    Plan(#[from] gitvan_planner::PlannerError),

    #[error("step {step} is missing required config field {field}")]
    MissingField { step: String, field: String },

    #[error("step {step} config field {field} has the wrong type: {expected}")]
    WrongType { step: String, field: String, expected: &'static str },

    #[error("step {step}: {message}")]
    Io { step: String, message: String },

    #[error("step {step} timed out after {timeout_ms}ms")]
    Timeout { step: String, timeout_ms: u64 },

    #[error("step {step} forbidden: {reason}")]
    Security { step: String, reason: String },

    #[error("step {step} has no database connector configured")]
    DatabaseNotConfigured { step: String },

    #[error("step {step} was canceled")]
    Canceled { step: String },

    #[error("step {step} http request failed: {message}")]
    Http { step: String, message: String },
}
