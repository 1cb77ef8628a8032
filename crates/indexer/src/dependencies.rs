//! Heuristic dependency resolution and spidering.
//!
//! Some language servers cannot map a dependency back to its source
//! repository on their own. For those languages the dependency repositories
//! have to be indexed before cross-repo jump-to-definition works, so we guess
//! where they live and enqueue them.

use crate::error::ServiceError;
use crate::policy::{classify_discovery_error, classify_repo_lookup_error, settle};
use crate::services::{DiscoveryBackend, RepoStore, WorkQueue};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use xref_protocol::{DependencyReference, Origin, RepoId, RepoName, RepositoryReference, WorkItem};

/// Maps raw dependency descriptors of one language to source repositories.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Lowercase language name this resolver handles.
    fn language(&self) -> &str;

    async fn resolve(&self, deps: &[DependencyReference]) -> BTreeSet<RepoName>;
}

/// Language → resolver. Languages without a resolver resolve to nothing.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn DependencyResolver>>,
}

impl ResolverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in resolvers.
    pub fn with_defaults(discovery: Arc<dyn DiscoveryBackend>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JavaResolver::new(discovery)));
        registry
    }

    pub fn register(&mut self, resolver: Arc<dyn DependencyResolver>) {
        self.resolvers
            .insert(resolver.language().to_lowercase(), resolver);
    }

    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        self.resolvers.contains_key(&language.to_lowercase())
    }

    pub async fn resolve(
        &self,
        language: &str,
        deps: &[DependencyReference],
    ) -> BTreeSet<RepoName> {
        match self.resolvers.get(&language.to_lowercase()) {
            Some(resolver) => resolver.resolve(deps).await,
            None => BTreeSet::new(),
        }
    }
}

/// Maven dependencies, looked up by `groupId:artifactId` through the
/// discovery backend.
pub struct JavaResolver {
    discovery: Arc<dyn DiscoveryBackend>,
}

impl JavaResolver {
    pub fn new(discovery: Arc<dyn DiscoveryBackend>) -> Self {
        Self { discovery }
    }

    /// Distinct query keys; descriptors without a string `id` are skipped.
    fn query_keys(deps: &[DependencyReference]) -> BTreeSet<&str> {
        deps.iter().filter_map(|dep| dep.data_str("id")).collect()
    }
}

#[async_trait]
impl DependencyResolver for JavaResolver {
    fn language(&self) -> &str {
        "java"
    }

    async fn resolve(&self, deps: &[DependencyReference]) -> BTreeSet<RepoName> {
        let mut resolved = BTreeSet::new();
        if !self.discovery.enabled() {
            return resolved;
        }

        for query in Self::query_keys(deps) {
            match self.discovery.search(query).await {
                Ok(repo) => {
                    resolved.insert(repo);
                }
                Err(err) => {
                    if let Some(err) = settle(classify_discovery_error, err, || {
                        format!("could not resolve dependency to repository, skipping query={query}")
                    }) {
                        log::error!("dependency discovery failed query={query}: {err}");
                    }
                }
            }
        }
        resolved
    }
}

/// Resolves the not-yet-indexed dependencies of one repository and language,
/// and submits every repository the store knows about.
#[derive(Clone)]
pub struct DependencyEnqueuer {
    store: Arc<dyn RepoStore>,
    queue: Arc<dyn WorkQueue>,
    registry: ResolverRegistry,
}

impl DependencyEnqueuer {
    pub fn new(
        store: Arc<dyn RepoStore>,
        queue: Arc<dyn WorkQueue>,
        registry: ResolverRegistry,
    ) -> Self {
        Self {
            store,
            queue,
            registry,
        }
    }

    /// Returns the repositories that were submitted. Only the dependency
    /// listing itself can fail the call.
    pub async fn enqueue_dependencies(
        &self,
        repo: RepoId,
        repo_name: &RepoName,
        language: &str,
        origin: &Origin,
    ) -> Result<Vec<RepoName>, ServiceError> {
        if !self.registry.supports(language) {
            return Ok(Vec::new());
        }
        log::info!("Enqueuing dependencies for repo repo={repo_name} lang={language}");

        let unindexed = self.store.unindexed_dependencies(repo, language).await?;
        let resolved = self.registry.resolve(language, &unindexed).await;

        let mut enqueued = Vec::with_capacity(resolved.len());
        for dep_name in resolved {
            let dep = match self.store.get_by_name(&dep_name).await {
                Ok(dep) => dep,
                Err(err) => {
                    if let Some(err) = settle(classify_repo_lookup_error, err, || {
                        format!("could not resolve repository, skipping repo={dep_name}")
                    }) {
                        log::error!("dependency lookup failed repo={dep_name}: {err}");
                    }
                    continue;
                }
            };
            self.queue.enqueue(WorkItem::discovered(
                RepositoryReference::default_branch(dep.name.clone()),
                origin.child(repo_name.clone()),
            ));
            enqueued.push(dep.name);
        }

        log::info!(
            "Enqueued dependencies for repo repo={repo_name} lang={language} num={} dependencies={:?}",
            enqueued.len(),
            enqueued.iter().map(RepoName::as_str).collect::<Vec<_>>()
        );
        Ok(enqueued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceResult;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct FakeDiscovery {
        enabled: bool,
        queries: Mutex<Vec<String>>,
    }

    impl FakeDiscovery {
        fn new(enabled: bool) -> Arc<Self> {
            Arc::new(Self {
                enabled,
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DiscoveryBackend for FakeDiscovery {
        fn enabled(&self) -> bool {
            self.enabled
        }

        async fn search(&self, query: &str) -> ServiceResult<RepoName> {
            self.queries.lock().unwrap().push(query.to_string());
            match query {
                "com.google.guava:guava" => Ok(RepoName::from("github.com/google/guava")),
                "com.google.guava:guava-testlib" => Ok(RepoName::from("github.com/google/guava")),
                "junit:junit" => Ok(RepoName::from("github.com/junit-team/junit4")),
                _ => Err(ServiceError::NotFound(query.to_string())),
            }
        }
    }

    fn dep(data: serde_json::Value) -> DependencyReference {
        DependencyReference {
            repo_id: RepoId(1),
            language: "java".to_string(),
            dep_data: serde_json::from_value(data).unwrap(),
        }
    }

    fn id(value: &str) -> DependencyReference {
        dep(serde_json::json!({ "id": value }))
    }

    #[tokio::test]
    async fn disabled_discovery_resolves_nothing() {
        let discovery = FakeDiscovery::new(false);
        let resolver = JavaResolver::new(discovery.clone());
        let out = resolver.resolve(&[id("junit:junit")]).await;
        assert!(out.is_empty());
        assert!(discovery.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_query_per_distinct_key() {
        let discovery = FakeDiscovery::new(true);
        let resolver = JavaResolver::new(discovery.clone());
        let deps = vec![
            id("junit:junit"),
            id("com.google.guava:guava"),
            id("junit:junit"),
            id("junit:junit"),
        ];

        resolver.resolve(&deps).await;

        let mut queries = discovery.queries.lock().unwrap().clone();
        queries.sort();
        assert_eq!(
            queries,
            vec!["com.google.guava:guava".to_string(), "junit:junit".into()]
        );
    }

    #[tokio::test]
    async fn malformed_descriptors_and_failed_queries_are_skipped() {
        let discovery = FakeDiscovery::new(true);
        let resolver = JavaResolver::new(discovery.clone());
        let deps = vec![
            dep(serde_json::json!({ "name": "no-id" })),
            dep(serde_json::json!({ "id": 42 })),
            id("org.unknown:thing"),
            id("com.google.guava:guava"),
            id("com.google.guava:guava-testlib"),
        ];

        let out = resolver.resolve(&deps).await;

        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            vec![RepoName::from("github.com/google/guava")]
        );
        assert_eq!(discovery.queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn registry_ignores_unsupported_languages() {
        let discovery = FakeDiscovery::new(true);
        let registry = ResolverRegistry::with_defaults(discovery.clone());
        assert!(registry.supports("Java"));
        assert!(!registry.supports("Go"));

        let out = registry.resolve("Go", &[id("junit:junit")]).await;
        assert!(out.is_empty());
        assert!(discovery.queries.lock().unwrap().is_empty());

        let out = registry.resolve("Java", &[id("junit:junit")]).await;
        assert_eq!(out.len(), 1);
    }
}
