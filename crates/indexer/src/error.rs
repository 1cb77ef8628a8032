use crate::multi_error::MultiError;
use thiserror::Error;
use xref_protocol::{RepositoryReference, ResolvedRepository};

pub type Result<T> = std::result::Result<T, IndexerError>;

/// Failure reported by an external collaborator (repository store, language
/// server control plane, index services, discovery backend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// A failed revision resolution. The store may still know the repository
/// (e.g. while it is being cloned), in which case `repo` is set.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct ResolveFailure {
    pub repo: Option<ResolvedRepository>,
    #[source]
    pub error: ServiceError,
}

impl From<ServiceError> for ResolveFailure {
    fn from(error: ServiceError) -> Self {
        Self { repo: None, error }
    }
}

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("resolving {reference} failed: {source}")]
    Resolve {
        reference: RepositoryReference,
        #[source]
        source: ServiceError,
    },

    #[error("inventory lookup failed: {0}")]
    Inventory(#[source] ServiceError),

    #[error("refreshing reference index failed: {0}")]
    RefreshReferences(#[source] ServiceError),

    #[error("refreshing package index failed: {0}")]
    RefreshPackages(#[source] ServiceError),

    #[error("could not enqueue dependencies: {0}")]
    EnqueueDependencies(#[source] ServiceError),

    #[error("updating indexed revision failed: {0}")]
    UpdateIndex(#[source] ServiceError),

    #[error(transparent)]
    Multiple(#[from] MultiError<IndexerError>),
}
