//! Error taxonomy for the RDF store and engine.

use thiserror::Error;

pub type RdfResult<T> = Result<T, RdfError>;

#[derive(Debug, Error)]
pub enum RdfError {
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("SPARQL query error: {0}")]
    Query(String),

    #[error("query timed out after {timeout_ms}ms: {query_excerpt}")]
    Timeout { timeout_ms: u64, query_excerpt: String },

    #[error("SHACL validation error: {0}")]
    Shacl(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("graph operation error: {0}")]
    GraphOp(String),
}

impl From<oxigraph::store::StorageError> for RdfError {
    fn from(err: oxigraph::store::StorageError) -> Self {
        RdfError::Store(err.to_string())
    }
}

impl From<oxigraph::store::LoaderError> for RdfError {
    fn from(err: oxigraph::store::LoaderError) -> Self {
        RdfError::Parse {
            line: 0,
            column: 0,
            message: err.to_string(),
        }
    }
}

impl From<oxigraph::sparql::EvaluationError> for RdfError {
    fn from(err: oxigraph::sparql::EvaluationError) -> Self {
        RdfError::Query(err.to_string())
    }
}
