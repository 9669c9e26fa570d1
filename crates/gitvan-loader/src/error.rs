//! Error taxonomy for the Knowledge Loader.

use thiserror::Error;

pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Git(#[from] gitvan_git::GitError),

    #[error(transparent)]
    Rdf(#[from] gitvan_rdf::RdfError),

    #[error(transparent)]
    Cache(#[from] gitvan_cache::CacheError),

    #[error("file {path} is not valid UTF-8")]
    NotUtf8 { path: String },
}
