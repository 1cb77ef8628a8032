//! # XRef Protocol
//!
//! Data model shared by the indexing worker and its process wiring.
//!
//! ```text
//! RepositoryReference ──resolve──> ResolvedRepository + CommitId
//!                                        │
//!                                        ├──> Inventory (languages, primary first)
//!                                        └──> DependencyReference* (per language)
//! ```
//!
//! Everything except the repository watermark is request-scoped.

mod inventory;
mod repo;
mod work;

pub use inventory::{DependencyReference, Inventory, LanguageStat};
pub use repo::{CommitId, RepoId, RepoName, RepositoryReference, ResolvedRepository};
pub use work::{Origin, WorkItem};
