use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// URI-like repository identifier, e.g. `github.com/gorilla/mux`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RepoName(String);

impl RepoName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RepoName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Internal repository identifier assigned by the repository store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct RepoId(pub i64);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, immutable commit identifier for a resolved revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Symbolic reference to a repository at a revision. An empty revision means
/// the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RepositoryReference {
    pub name: RepoName,
    #[serde(default)]
    pub revision: String,
}

impl RepositoryReference {
    pub fn new(name: impl Into<RepoName>, revision: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: revision.into(),
        }
    }

    /// Reference to the default branch of `name`.
    pub fn default_branch(name: impl Into<RepoName>) -> Self {
        Self::new(name, String::new())
    }

    /// Parse `name` or `name@revision`. Returns `None` for an empty name.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, revision) = match input.split_once('@') {
            Some((name, rev)) => (name.trim(), rev.trim()),
            None => (input, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, revision))
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.revision)
        }
    }
}

/// Repository record as stored by the repository store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedRepository {
    pub id: RepoId,
    pub name: RepoName,
    /// Commit last successfully indexed (the watermark).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_revision: Option<CommitId>,
    /// When set, the watermark is pinned and must never be advanced.
    #[serde(default)]
    pub freeze_indexed_revision: bool,
    #[serde(default)]
    pub fork: bool,
}

impl ResolvedRepository {
    pub fn new(id: RepoId, name: impl Into<RepoName>) -> Self {
        Self {
            id,
            name: name.into(),
            indexed_revision: None,
            freeze_indexed_revision: false,
            fork: false,
        }
    }
}
