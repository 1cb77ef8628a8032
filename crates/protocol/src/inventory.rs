use crate::RepoId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One detected language. Byte and line totals are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LanguageStat {
    pub name: String,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub total_lines: u64,
}

impl LanguageStat {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_bytes: 0,
            total_lines: 0,
        }
    }
}

/// Languages present in a repository at one commit, primary language first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Inventory {
    #[serde(default)]
    pub languages: Vec<LanguageStat>,
}

impl Inventory {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            languages: names.into_iter().map(LanguageStat::named).collect(),
        }
    }

    #[must_use]
    pub fn primary_language(&self) -> Option<&str> {
        self.languages.first().map(|lang| lang.name.as_str())
    }

    pub fn language_names(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|lang| lang.name.as_str())
    }
}

/// A package/library dependency as reported by the language's own tooling.
/// `dep_data` is language-specific and only interpreted by that language's
/// resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyReference {
    pub repo_id: RepoId,
    pub language: String,
    #[serde(default)]
    pub dep_data: BTreeMap<String, serde_json::Value>,
}

impl DependencyReference {
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.dep_data.get(key).and_then(serde_json::Value::as_str)
    }
}
