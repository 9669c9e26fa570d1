//! Error taxonomy for the Context Manager.

use thiserror::Error;

pub type ContextResult<T> = Result<T, ContextError>;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("unresolved placeholder {{{{ {name} }}}} in step {step}")]
    Binding { step: String, name: String },

    #[error("resolved value for {{{{ {name} }}}} in step {step} contains a disallowed construct: {reason}")]
    Security { step: String, name: String, reason: String },
}
