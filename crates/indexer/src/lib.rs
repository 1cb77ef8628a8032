//! # XRef Indexer
//!
//! Repository indexing worker for cross-repository code intelligence.
//!
//! ## Pipeline
//!
//! ```text
//! WorkQueue
//!     │
//!     └──> Worker::index(reference, origin)
//!            ├─> resolve revision ──> already current? ──> enable language servers, done
//!            ├─> inventory (uncached)
//!            ├─> enable language servers (best effort)
//!            ├─> refresh reference index ┐
//!            ├─> refresh package index   ├─ joined, failures combined
//!            ├─> enqueue dependencies    ┘   (primary items only) ──> WorkQueue
//!            └─> record indexed revision
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xref_indexer::{work_queue, Dispatcher, ResolverRegistry, Services, Worker, WorkerConfig};
//! # async fn run(services: Services, discovery: Arc<dyn xref_indexer::DiscoveryBackend>) {
//! let config = WorkerConfig::load(None).unwrap();
//! let (queue, receiver) = work_queue(config.queue_capacity);
//! let services = Services { queue: Arc::new(queue.clone()), ..services };
//! let worker = Worker::new(services, ResolverRegistry::with_defaults(discovery), &config);
//! let dispatcher = Dispatcher::start(Arc::new(worker), receiver, &config);
//! # dispatcher.shutdown().await;
//! # }
//! ```

mod config;
mod dependencies;
mod dispatch;
mod error;
mod index_state;
mod langservers;
mod multi_error;
mod policy;
mod queue;
mod services;
mod worker;

pub use config::{ConfigError, DeployMode, DiscoveryConfig, WorkerConfig};
pub use dependencies::{DependencyEnqueuer, DependencyResolver, JavaResolver, ResolverRegistry};
pub use dispatch::{Dispatcher, DispatcherHealth};
pub use error::{IndexerError, ResolveFailure, Result, ServiceError};
pub use index_state::{assess_freshness, CurrentReason, Freshness, StaleReason};
pub use langservers::{EnablementReport, LanguageServerManager};
pub use multi_error::{combine, ErrorAggregator, MultiError};
pub use policy::{
    classify_discovery_error, classify_lang_server_error, classify_repo_lookup_error, settle,
    FailureClass, FailurePolicy,
};
pub use queue::{work_queue, QueueHandle, QueueReceiver};
pub use services::{
    DiscoveryBackend, GlobalIndex, LanguageServerControl, RepoStore, Resolution, ServiceResult,
    Services, WorkQueue,
};
pub use worker::{IndexOutcome, ResolveFailureFilter, Worker};
