use crate::{RepoName, RepositoryReference};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Why an item entered the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Originally requested index.
    Primary,
    /// Found by dependency spidering from `parent`.
    Discovered { parent: RepoName, depth: u32 },
}

impl Origin {
    #[must_use]
    pub const fn depth(&self) -> u32 {
        match self {
            Self::Primary => 0,
            Self::Discovered { depth, .. } => *depth,
        }
    }

    #[must_use]
    pub const fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }

    /// Origin for a dependency discovered while indexing `parent` under `self`.
    #[must_use]
    pub fn child(&self, parent: RepoName) -> Self {
        Self::Discovered {
            parent,
            depth: self.depth().saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct WorkItem {
    pub reference: RepositoryReference,
    pub origin: Origin,
}

impl WorkItem {
    pub fn primary(reference: RepositoryReference) -> Self {
        Self {
            reference,
            origin: Origin::Primary,
        }
    }

    pub fn discovered(reference: RepositoryReference, origin: Origin) -> Self {
        Self { reference, origin }
    }
}
