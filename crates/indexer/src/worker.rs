use crate::config::WorkerConfig;
use crate::dependencies::{DependencyEnqueuer, ResolverRegistry};
use crate::error::{IndexerError, Result};
use crate::index_state::{assess_freshness, CurrentReason, Freshness};
use crate::langservers::LanguageServerManager;
use crate::multi_error::combine;
use crate::services::{GlobalIndex, RepoStore, Resolution, Services};
use serde::Serialize;
use std::sync::Arc;
use xref_protocol::{CommitId, Origin, RepositoryReference, ResolvedRepository, WorkItem};

/// Decides whether a resolution failure for a known repository should be
/// treated as success (used to keep always-failing fixtures from looping).
pub type ResolveFailureFilter = Arc<dyn Fn(&ResolvedRepository) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// Watermark advanced to `commit`.
    Indexed {
        commit: CommitId,
        language: Option<String>,
    },
    /// Nothing to index; only the language server pass ran.
    AlreadyCurrent(CurrentReason),
    /// Resolution failed but the resolve-failure filter accepted the repo.
    ResolveFailureIgnored,
}

/// Indexing decision engine for one repository at a time. Invocations share
/// no mutable state and can run concurrently.
pub struct Worker {
    store: Arc<dyn RepoStore>,
    global_index: Arc<dyn GlobalIndex>,
    lang_servers: LanguageServerManager,
    dependencies: DependencyEnqueuer,
    xrepo_index_enabled: bool,
    resolve_failure_filter: Option<ResolveFailureFilter>,
}

impl Worker {
    pub fn new(services: Services, registry: ResolverRegistry, config: &WorkerConfig) -> Self {
        let lang_servers = LanguageServerManager::new(services.lang_servers, config);
        let dependencies =
            DependencyEnqueuer::new(services.store.clone(), services.queue, registry);
        Self {
            store: services.store,
            global_index: services.global_index,
            lang_servers,
            dependencies,
            xrepo_index_enabled: config.xrepo_index_enabled,
            resolve_failure_filter: None,
        }
    }

    #[must_use]
    pub fn with_resolve_failure_filter(mut self, filter: ResolveFailureFilter) -> Self {
        self.resolve_failure_filter = Some(filter);
        self
    }

    pub async fn index_item(&self, item: &WorkItem) -> Result<IndexOutcome> {
        self.index(&item.reference, &item.origin).await
    }

    /// Bring the cross-repo indexes up to date for `reference`.
    ///
    /// Only primary invocations spider out to dependencies. The watermark is
    /// written last and only when every fan-out branch succeeded.
    pub async fn index(
        &self,
        reference: &RepositoryReference,
        origin: &Origin,
    ) -> Result<IndexOutcome> {
        let Resolution { repo, commit } = match self.store.resolve_revision(reference).await {
            Ok(resolution) => resolution,
            Err(failure) => {
                if let (Some(filter), Some(repo)) = (&self.resolve_failure_filter, &failure.repo) {
                    if filter(repo) {
                        log::debug!(
                            "ignoring resolve failure repo={} error={}",
                            repo.name,
                            failure.error
                        );
                        return Ok(IndexOutcome::ResolveFailureIgnored);
                    }
                }
                return Err(IndexerError::Resolve {
                    reference: reference.clone(),
                    source: failure.error,
                });
            }
        };

        let freshness = assess_freshness(
            repo.indexed_revision.as_ref(),
            repo.freeze_indexed_revision,
            &commit,
        );
        log::debug!("repo={} commit={commit} freshness={freshness:?}", repo.name);
        if let Freshness::Current(reason) = freshness {
            self.enable_lang_servers_for_indexed(&repo, &commit).await;
            return Ok(IndexOutcome::AlreadyCurrent(reason));
        }

        let inventory = self
            .store
            .inventory_uncached(repo.id, &commit)
            .await
            .map_err(IndexerError::Inventory)?;
        let language = inventory.primary_language().map(str::to_string);

        self.lang_servers.enable_for_inventory(&inventory).await;

        if !repo.fork && self.xrepo_index_enabled {
            let refs = async {
                self.global_index
                    .refresh_references(&repo.name, &commit)
                    .await
                    .map_err(IndexerError::RefreshReferences)
            };
            let pkgs = async {
                self.global_index
                    .refresh_packages(&repo.name, &commit)
                    .await
                    .map_err(IndexerError::RefreshPackages)
            };
            let deps = async {
                match language.as_deref() {
                    Some(lang) if origin.is_primary() => self
                        .dependencies
                        .enqueue_dependencies(repo.id, &repo.name, lang, origin)
                        .await
                        .map(drop)
                        .map_err(IndexerError::EnqueueDependencies),
                    _ => Ok(()),
                }
            };
            let (refs, pkgs, deps) = tokio::join!(refs, pkgs, deps);
            combine([refs, pkgs, deps])?;
        }

        self.store
            .update_index(repo.id, &commit, language.as_deref())
            .await
            .map_err(IndexerError::UpdateIndex)?;

        log::info!(
            "indexed repo={} commit={commit} language={}",
            repo.name,
            language.as_deref().unwrap_or("")
        );
        Ok(IndexOutcome::Indexed { commit, language })
    }

    /// Repositories indexed before automatic language server management
    /// existed still get their servers enabled on re-check. Uses the cached
    /// inventory since this runs on every refresh.
    async fn enable_lang_servers_for_indexed(&self, repo: &ResolvedRepository, commit: &CommitId) {
        match self.store.inventory(repo.id, commit).await {
            Ok(inventory) => {
                self.lang_servers.enable_for_inventory(&inventory).await;
            }
            Err(err) => {
                log::error!(
                    "failed to automatically enable language servers, inventory lookup failed repo={} error={err}",
                    repo.name
                );
            }
        }
    }
}
