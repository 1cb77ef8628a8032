//! Contracts of the external collaborators the worker drives.

use crate::error::{ResolveFailure, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;
use xref_protocol::{
    CommitId, DependencyReference, Inventory, RepoId, RepoName, RepositoryReference,
    ResolvedRepository, WorkItem,
};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// A repository reference resolved to its record and a concrete commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub repo: ResolvedRepository,
    pub commit: CommitId,
}

/// Repository store: repository records, inventories, dependency listings and
/// the indexed-revision watermark.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn resolve_revision(
        &self,
        reference: &RepositoryReference,
    ) -> std::result::Result<Resolution, ResolveFailure>;

    /// Possibly cached inventory; cheap enough for routine re-checks.
    async fn inventory(&self, repo: RepoId, commit: &CommitId) -> ServiceResult<Inventory>;

    /// Freshly computed inventory.
    async fn inventory_uncached(&self, repo: RepoId, commit: &CommitId)
        -> ServiceResult<Inventory>;

    async fn unindexed_dependencies(
        &self,
        repo: RepoId,
        language: &str,
    ) -> ServiceResult<Vec<DependencyReference>>;

    /// Record `commit` (and the primary language) as the repository's indexed
    /// state. A single atomic write on the store side.
    async fn update_index(
        &self,
        repo: RepoId,
        commit: &CommitId,
        language: Option<&str>,
    ) -> ServiceResult<()>;

    async fn get_by_name(&self, name: &RepoName) -> ServiceResult<ResolvedRepository>;
}

/// Language server control plane. Enabling is idempotent.
#[async_trait]
pub trait LanguageServerControl: Send + Sync {
    async fn enable_language(&self, language: &str) -> ServiceResult<()>;
}

/// Global cross-repository indexes.
#[async_trait]
pub trait GlobalIndex: Send + Sync {
    async fn refresh_references(&self, repo: &RepoName, commit: &CommitId) -> ServiceResult<()>;

    async fn refresh_packages(&self, repo: &RepoName, commit: &CommitId) -> ServiceResult<()>;
}

/// External service that maps a free-text dependency query to a source
/// repository (e.g. a web search restricted to a code host).
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    fn enabled(&self) -> bool;

    async fn search(&self, query: &str) -> ServiceResult<RepoName>;
}

/// Sink for future indexing work. Submitting never blocks and reports
/// nothing back.
pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, item: WorkItem);
}

/// Everything the worker talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn RepoStore>,
    pub lang_servers: Arc<dyn LanguageServerControl>,
    pub global_index: Arc<dyn GlobalIndex>,
    pub queue: Arc<dyn WorkQueue>,
}
