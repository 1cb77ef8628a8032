//! Recording fakes of the worker's collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use xref_indexer::{
    DiscoveryBackend, GlobalIndex, LanguageServerControl, RepoStore, ResolveFailure, Resolution,
    ResolverRegistry, ServiceError, ServiceResult, Services, WorkQueue, Worker, WorkerConfig,
};
use xref_protocol::{
    CommitId, DependencyReference, Inventory, RepoId, RepoName, RepositoryReference,
    ResolvedRepository, WorkItem,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Resolve(String),
    Inventory { repo: RepoId, cached: bool },
    UnindexedDependencies { repo: RepoId, language: String },
    UpdateIndex { repo: RepoId, commit: String, language: Option<String> },
    GetByName(String),
}

struct RepoEntry {
    record: ResolvedRepository,
    head: CommitId,
    inventory: Inventory,
    dependencies: Vec<DependencyReference>,
}

#[derive(Default)]
pub struct FakeStore {
    repos: Mutex<HashMap<RepoName, RepoEntry>>,
    resolve_failures: Mutex<HashMap<RepoName, ResolveFailure>>,
    failing_inventory: Mutex<Option<ServiceError>>,
    failing_cached_inventory: Mutex<Option<ServiceError>>,
    failing_dependencies: Mutex<Option<ServiceError>>,
    failing_update: Mutex<Option<ServiceError>>,
    calls: Mutex<Vec<StoreCall>>,
}

impl FakeStore {
    pub fn add_repo(&self, record: ResolvedRepository, head: &str, languages: &[&str]) {
        self.repos.lock().unwrap().insert(
            record.name.clone(),
            RepoEntry {
                record,
                head: CommitId::from(head),
                inventory: Inventory::from_names(languages.iter().copied()),
                dependencies: Vec::new(),
            },
        );
    }

    pub fn set_dependencies(&self, name: &str, deps: Vec<DependencyReference>) {
        if let Some(entry) = self.repos.lock().unwrap().get_mut(&RepoName::from(name)) {
            entry.dependencies = deps;
        }
    }

    pub fn fail_resolve(&self, name: &str, failure: ResolveFailure) {
        self.resolve_failures
            .lock()
            .unwrap()
            .insert(RepoName::from(name), failure);
    }

    pub fn fail_inventory(&self, err: ServiceError) {
        *self.failing_inventory.lock().unwrap() = Some(err);
    }

    pub fn fail_cached_inventory(&self, err: ServiceError) {
        *self.failing_cached_inventory.lock().unwrap() = Some(err);
    }

    pub fn fail_dependencies(&self, err: ServiceError) {
        *self.failing_dependencies.lock().unwrap() = Some(err);
    }

    pub fn fail_update(&self, err: ServiceError) {
        *self.failing_update.lock().unwrap() = Some(err);
    }

    pub fn watermark(&self, name: &str) -> Option<String> {
        self.repos
            .lock()
            .unwrap()
            .get(&RepoName::from(name))
            .and_then(|entry| entry.record.indexed_revision.clone())
            .map(|c| c.as_str().to_string())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::UpdateIndex { .. }))
            .collect()
    }

    pub fn inventory_calls(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::Inventory { .. }))
            .collect()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn inventory_of(&self, repo: RepoId) -> ServiceResult<Inventory> {
        self.repos
            .lock()
            .unwrap()
            .values()
            .find(|entry| entry.record.id == repo)
            .map(|entry| entry.inventory.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("repo {repo}")))
    }
}

#[async_trait]
impl RepoStore for FakeStore {
    async fn resolve_revision(
        &self,
        reference: &RepositoryReference,
    ) -> Result<Resolution, ResolveFailure> {
        self.record(StoreCall::Resolve(reference.to_string()));
        if let Some(failure) = self.resolve_failures.lock().unwrap().get(&reference.name) {
            return Err(failure.clone());
        }
        let repos = self.repos.lock().unwrap();
        let entry = repos
            .get(&reference.name)
            .ok_or_else(|| ServiceError::NotFound(reference.name.to_string()))?;
        Ok(Resolution {
            repo: entry.record.clone(),
            commit: entry.head.clone(),
        })
    }

    async fn inventory(&self, repo: RepoId, _commit: &CommitId) -> ServiceResult<Inventory> {
        self.record(StoreCall::Inventory { repo, cached: true });
        if let Some(err) = self.failing_cached_inventory.lock().unwrap().clone() {
            return Err(err);
        }
        self.inventory_of(repo)
    }

    async fn inventory_uncached(
        &self,
        repo: RepoId,
        _commit: &CommitId,
    ) -> ServiceResult<Inventory> {
        self.record(StoreCall::Inventory {
            repo,
            cached: false,
        });
        if let Some(err) = self.failing_inventory.lock().unwrap().clone() {
            return Err(err);
        }
        self.inventory_of(repo)
    }

    async fn unindexed_dependencies(
        &self,
        repo: RepoId,
        language: &str,
    ) -> ServiceResult<Vec<DependencyReference>> {
        self.record(StoreCall::UnindexedDependencies {
            repo,
            language: language.to_string(),
        });
        if let Some(err) = self.failing_dependencies.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .repos
            .lock()
            .unwrap()
            .values()
            .find(|entry| entry.record.id == repo)
            .map(|entry| entry.dependencies.clone())
            .unwrap_or_default())
    }

    async fn update_index(
        &self,
        repo: RepoId,
        commit: &CommitId,
        language: Option<&str>,
    ) -> ServiceResult<()> {
        self.record(StoreCall::UpdateIndex {
            repo,
            commit: commit.as_str().to_string(),
            language: language.map(str::to_string),
        });
        if let Some(err) = self.failing_update.lock().unwrap().clone() {
            return Err(err);
        }
        let mut repos = self.repos.lock().unwrap();
        let entry = repos
            .values_mut()
            .find(|entry| entry.record.id == repo)
            .ok_or_else(|| ServiceError::NotFound(format!("repo {repo}")))?;
        entry.record.indexed_revision = Some(commit.clone());
        Ok(())
    }

    async fn get_by_name(&self, name: &RepoName) -> ServiceResult<ResolvedRepository> {
        self.record(StoreCall::GetByName(name.to_string()));
        self.repos
            .lock()
            .unwrap()
            .get(name)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }
}

#[derive(Default)]
pub struct FakeGlobalIndex {
    pub reference_failure: Mutex<Option<ServiceError>>,
    pub package_failure: Mutex<Option<ServiceError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGlobalIndex {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GlobalIndex for FakeGlobalIndex {
    async fn refresh_references(&self, repo: &RepoName, commit: &CommitId) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(format!("refs {repo}@{commit}"));
        match self.reference_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn refresh_packages(&self, repo: &RepoName, commit: &CommitId) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(format!("pkgs {repo}@{commit}"));
        match self.package_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeLangServers {
    pub failures: Mutex<HashMap<String, ServiceError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeLangServers {
    pub fn fail(&self, language: &str, err: ServiceError) {
        self.failures
            .lock()
            .unwrap()
            .insert(language.to_string(), err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageServerControl for FakeLangServers {
    async fn enable_language(&self, language: &str) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(language.to_string());
        match self.failures.lock().unwrap().get(language) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    items: Mutex<Vec<WorkItem>>,
}

impl RecordingQueue {
    pub fn items(&self) -> Vec<WorkItem> {
        self.items.lock().unwrap().clone()
    }
}

impl WorkQueue for RecordingQueue {
    fn enqueue(&self, item: WorkItem) {
        self.items.lock().unwrap().push(item);
    }
}

/// Discovery backend answering from a fixed table.
#[derive(Default)]
pub struct FakeDiscovery {
    pub disabled: bool,
    answers: HashMap<String, RepoName>,
    queries: Mutex<Vec<String>>,
}

impl FakeDiscovery {
    pub fn with_answers(answers: &[(&str, &str)]) -> Self {
        Self {
            disabled: false,
            answers: answers
                .iter()
                .map(|(q, r)| ((*q).to_string(), RepoName::from(*r)))
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscoveryBackend for FakeDiscovery {
    fn enabled(&self) -> bool {
        !self.disabled
    }

    async fn search(&self, query: &str) -> ServiceResult<RepoName> {
        self.queries.lock().unwrap().push(query.to_string());
        self.answers
            .get(query)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(query.to_string()))
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub global_index: Arc<FakeGlobalIndex>,
    pub lang_servers: Arc<FakeLangServers>,
    pub queue: Arc<RecordingQueue>,
    pub discovery: Arc<FakeDiscovery>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_discovery(FakeDiscovery::default())
    }

    pub fn with_discovery(discovery: FakeDiscovery) -> Self {
        Self {
            store: Arc::new(FakeStore::default()),
            global_index: Arc::new(FakeGlobalIndex::default()),
            lang_servers: Arc::new(FakeLangServers::default()),
            queue: Arc::new(RecordingQueue::default()),
            discovery: Arc::new(discovery),
        }
    }

    pub fn services_with_queue(&self, queue: Arc<dyn WorkQueue>) -> Services {
        Services {
            store: self.store.clone(),
            lang_servers: self.lang_servers.clone(),
            global_index: self.global_index.clone(),
            queue,
        }
    }

    pub fn worker(&self, config: &WorkerConfig) -> Worker {
        Worker::new(
            self.services_with_queue(self.queue.clone()),
            ResolverRegistry::with_defaults(self.discovery.clone()),
            config,
        )
    }
}

/// Fan-out enabled, language servers managed.
pub fn xrepo_config() -> WorkerConfig {
    WorkerConfig {
        xrepo_index_enabled: true,
        ..WorkerConfig::default()
    }
}

pub fn repo(id: i64, name: &str) -> ResolvedRepository {
    ResolvedRepository::new(RepoId(id), name)
}

pub fn java_dep(repo_id: i64, id: &str) -> DependencyReference {
    DependencyReference {
        repo_id: RepoId(repo_id),
        language: "Java".to_string(),
        dep_data: [("id".to_string(), serde_json::Value::String(id.to_string()))]
            .into_iter()
            .collect(),
    }
}
