//! Dependency discovery through a web search API restricted to one code host.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;
use xref_indexer::{DiscoveryBackend, DiscoveryConfig, ServiceError, ServiceResult};
use xref_protocol::RepoName;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
const RESULTS_PER_QUERY: &str = "5";

/// First path segments on the code host that are not repository owners.
const RESERVED_OWNERS: &[&str] = &[
    "about", "blog", "collections", "explore", "marketplace", "orgs", "search", "settings",
    "site", "topics", "trending",
];

pub struct WebSearchDiscovery {
    http: reqwest::Client,
    config: DiscoveryConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    link: String,
}

impl WebSearchDiscovery {
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .context("failed to build discovery HTTP client")?;
        Ok(Self { http, config })
    }

    fn search_url(&self, query: &str) -> ServiceResult<Url> {
        let (Some(key), Some(engine)) = (&self.config.api_key, &self.config.engine_id) else {
            return Err(ServiceError::Other("discovery backend is not configured".into()));
        };
        let mut url = Url::parse(&self.config.endpoint).map_err(|e| {
            ServiceError::Other(format!("invalid discovery endpoint {:?}: {e}", self.config.endpoint))
        })?;
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("cx", engine)
            .append_pair("num", RESULTS_PER_QUERY)
            .append_pair("q", &format!("site:{} {query}", self.config.site));
        Ok(url)
    }
}

#[async_trait]
impl DiscoveryBackend for WebSearchDiscovery {
    fn enabled(&self) -> bool {
        self.config.enabled()
    }

    async fn search(&self, query: &str) -> ServiceResult<RepoName> {
        let url = self.search_url(query)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(crate::internal_api::status_error(status, String::new()));
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Other(format!("invalid search response: {e}")))?;

        body.items
            .iter()
            .find_map(|item| repo_name_from_link(&item.link, &self.config.site))
            .ok_or_else(|| ServiceError::NotFound(format!("no repository found for {query:?}")))
    }
}

/// `https://github.com/google/guava/blob/master/pom.xml` → `github.com/google/guava`.
pub fn repo_name_from_link(link: &str, site: &str) -> Option<RepoName> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if !host.eq_ignore_ascii_case(site) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    if RESERVED_OWNERS.contains(&owner.to_ascii_lowercase().as_str()) {
        return None;
    }
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return None;
    }
    Some(RepoName::from(format!("{}/{owner}/{repo}", site.to_ascii_lowercase())))
}
