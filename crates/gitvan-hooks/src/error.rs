//! Error taxonomy for the Hook Parser.

use thiserror::Error;

pub type HookResult<T> = Result<T, HookError>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Rdf(#[from] gitvan_rdf::RdfError),

    #[error(transparent)]
    Cache(#[from] gitvan_cache::CacheError),

    #[error("hook {hook} is missing required property {property}")]
    MissingProperty { hook: String, property: String },

    #[error("hook {hook} declares unknown predicate type {predicate_type}")]
    UnknownPredicateType { hook: String, predicate_type: String },

    #[error("hook {hook}: invalid threshold operator {op}")]
    InvalidOperator { hook: String, op: String },

    #[error("step {step} in workflow of hook {hook} declares unknown kind {kind}")]
    UnknownStepKind { hook: String, step: String, kind: String },

    #[error("step {step} in workflow of hook {hook} is missing required config field {field}")]
    MissingStepField { hook: String, step: String, field: String },

    #[error("duplicate step id {step} within a workflow of hook {hook}")]
    DuplicateStepId { hook: String, step: String },

    #[error("step {step} in workflow of hook {hook} depends on unknown step {target}")]
    UnknownDependency { hook: String, step: String, target: String },

    #[error("cycle detected in workflow of hook {hook}: {}", participants.join(" -> "))]
    Cycle { hook: String, participants: Vec<String> },
}
