//! Process-wide worker configuration.
//!
//! Read once at startup (defaults, then an optional TOML file, then the
//! environment) and handed to the worker as an immutable value.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:3090";
const DEFAULT_DISCOVERY_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const DEFAULT_DISCOVERY_SITE: &str = "github.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Deployment mode, which gates automatic language server management.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Clustered ("data center") deployment; never manage language servers.
    Cluster,
    #[default]
    Single,
    Dev,
}

impl FromStr for DeployMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cluster" | "datacenter" | "data-center" | "k8s" => Ok(Self::Cluster),
            "single" | "docker-container" | "server" | "" => Ok(Self::Single),
            "dev" | "development" => Ok(Self::Dev),
            _ => Err(ConfigError::Invalid {
                key: "DEPLOY_TYPE",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub endpoint: String,
    pub site: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            endpoint: DEFAULT_DISCOVERY_ENDPOINT.to_string(),
            site: DEFAULT_DISCOVERY_SITE.to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// The discovery backend only runs with both credentials present.
    #[must_use]
    pub fn enabled(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.api_key) && set(&self.engine_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Run the cross-repo fan-out (global index refresh and spidering).
    pub xrepo_index_enabled: bool,
    pub deploy_mode: DeployMode,
    /// Allow language server management in dev mode.
    pub debug_manage_docker: bool,
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_spider_depth: u32,
    pub frontend_url: String,
    pub discovery: DiscoveryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            xrepo_index_enabled: false,
            deploy_mode: DeployMode::Single,
            debug_manage_docker: false,
            workers: 4,
            queue_capacity: 1024,
            max_spider_depth: 1,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Override fields from environment variables looked up via `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Presence alone turns the fan-out on.
        if lookup("LSP_PROXY").is_some() {
            self.xrepo_index_enabled = true;
        }
        if let Some(value) = lookup("DEPLOY_TYPE") {
            self.deploy_mode = value.parse()?;
        }
        if let Some(value) = lookup("DEBUG_MANAGE_DOCKER") {
            self.debug_manage_docker = parse_bool("DEBUG_MANAGE_DOCKER", &value)?;
        }
        if let Some(value) = lookup("XREF_INDEXER_WORKERS") {
            self.workers = parse_positive("XREF_INDEXER_WORKERS", &value)?;
        }
        if let Some(value) = lookup("XREF_INDEXER_QUEUE_CAPACITY") {
            self.queue_capacity = parse_positive("XREF_INDEXER_QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("XREF_INDEXER_MAX_SPIDER_DEPTH") {
            self.max_spider_depth =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid {
                        key: "XREF_INDEXER_MAX_SPIDER_DEPTH",
                        value: value.clone(),
                    })?;
        }
        if let Some(value) = lookup("SRC_FRONTEND_INTERNAL") {
            self.frontend_url = normalize_url(&value);
        }
        if let Some(value) = lookup("GOOGLE_CSE_API_KEY") {
            self.discovery.api_key = Some(value);
        }
        if let Some(value) = lookup("GOOGLE_CSE_ENGINE_ID") {
            self.discovery.engine_id = Some(value);
        }
        if let Some(value) = lookup("XREF_DISCOVERY_SITE") {
            self.discovery.site = value.trim().to_string();
        }
        Ok(())
    }

    /// Whether automatic language server management is allowed at all.
    #[must_use]
    pub fn manages_lang_servers(&self) -> bool {
        match self.deploy_mode {
            DeployMode::Cluster => false,
            DeployMode::Dev => self.debug_manage_docker,
            DeployMode::Single => true,
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn normalize_url(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
