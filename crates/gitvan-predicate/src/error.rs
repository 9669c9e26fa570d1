//! Error taxonomy for the Predicate Evaluator.

use thiserror::Error;

pub type PredicateResult<T> = Result<T, PredicateError>;

#[derive(Debug, Error)]
pub enum PredicateError {
    #[error(transparent)]
    Rdf(#[from] gitvan_rdf::RdfError),
}
