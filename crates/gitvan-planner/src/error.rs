//! Error taxonomy for the DAG Planner.

use thiserror::Error;

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// Kahn's algorithm terminated with unprocessed steps left; the
    /// workflow's dependency graph has a cycle that the Hook Parser's own
    /// validation should already have rejected, so this is a defensive
    /// backstop rather than an expected path.
    #[error("workflow {workflow} has an unresolved dependency cycle among steps: {}", remaining.join(", "))]
    UnresolvedCycle { workflow: String, remaining: Vec<String> },
}
