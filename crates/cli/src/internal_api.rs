//! HTTP client for the frontend's internal API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use xref_indexer::{
    GlobalIndex, LanguageServerControl, RepoStore, ResolveFailure, Resolution, ServiceError,
    ServiceResult,
};
use xref_protocol::{
    CommitId, DependencyReference, Inventory, RepoId, RepoName, RepositoryReference,
    ResolvedRepository,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct InternalClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
struct ResolveRevRequest<'a> {
    repo: &'a str,
    rev: &'a str,
}

#[derive(Deserialize)]
struct ResolveRevResponse {
    repo: ResolvedRepository,
    commit: CommitId,
}

/// Error body; `repo` is present when the repository exists but the revision
/// could not be resolved (e.g. still cloning).
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    repo: Option<ResolvedRepository>,
}

#[derive(Serialize)]
struct InventoryRequest<'a> {
    repo_id: RepoId,
    commit: &'a str,
}

#[derive(Serialize)]
struct DependenciesRequest<'a> {
    repo_id: RepoId,
    language: &'a str,
}

#[derive(Serialize)]
struct UpdateIndexRequest<'a> {
    repo_id: RepoId,
    commit: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Serialize)]
struct ByNameRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct RefreshIndexRequest<'a> {
    repo: &'a str,
    commit: &'a str,
}

#[derive(Serialize)]
struct EnableLanguageRequest<'a> {
    language: &'a str,
}

impl InternalClient {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid frontend URL {base:?}"))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("xref-indexer/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ServiceError::Other(format!("invalid endpoint {path}: {e}")))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ServiceResult<reqwest::Response> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, error_message(&text)))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ServiceResult<T> {
        self.send(path, body)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Other(format!("{path}: invalid response: {e}")))
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ServiceResult<()> {
        self.send(path, body).await.map(drop)
    }
}

#[async_trait]
impl RepoStore for InternalClient {
    async fn resolve_revision(
        &self,
        reference: &RepositoryReference,
    ) -> Result<Resolution, ResolveFailure> {
        let url = self.endpoint("/.internal/repos/resolve-rev")?;
        let response = self
            .http
            .post(url)
            .json(&ResolveRevRequest {
                repo: reference.name.as_str(),
                rev: &reference.revision,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            let body: ResolveRevResponse = response.json().await.map_err(|e| {
                ServiceError::Other(format!("resolve-rev: invalid response: {e}"))
            })?;
            return Ok(Resolution {
                repo: body.repo,
                commit: body.commit,
            });
        }

        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
            error: text.trim().to_string(),
            repo: None,
        });
        Err(ResolveFailure {
            repo: body.repo,
            error: status_error(status, body.error),
        })
    }

    async fn inventory(&self, repo: RepoId, commit: &CommitId) -> ServiceResult<Inventory> {
        self.post(
            "/.internal/repos/inventory",
            &InventoryRequest {
                repo_id: repo,
                commit: commit.as_str(),
            },
        )
        .await
    }

    async fn inventory_uncached(
        &self,
        repo: RepoId,
        commit: &CommitId,
    ) -> ServiceResult<Inventory> {
        self.post(
            "/.internal/repos/inventory-uncached",
            &InventoryRequest {
                repo_id: repo,
                commit: commit.as_str(),
            },
        )
        .await
    }

    async fn unindexed_dependencies(
        &self,
        repo: RepoId,
        language: &str,
    ) -> ServiceResult<Vec<DependencyReference>> {
        self.post(
            "/.internal/repos/unindexed-dependencies",
            &DependenciesRequest {
                repo_id: repo,
                language,
            },
        )
        .await
    }

    async fn update_index(
        &self,
        repo: RepoId,
        commit: &CommitId,
        language: Option<&str>,
    ) -> ServiceResult<()> {
        self.post_unit(
            "/.internal/repos/update-index",
            &UpdateIndexRequest {
                repo_id: repo,
                commit: commit.as_str(),
                language,
            },
        )
        .await
    }

    async fn get_by_name(&self, name: &RepoName) -> ServiceResult<ResolvedRepository> {
        self.post(
            "/.internal/repos/by-name",
            &ByNameRequest {
                name: name.as_str(),
            },
        )
        .await
    }
}

#[async_trait]
impl GlobalIndex for InternalClient {
    async fn refresh_references(&self, repo: &RepoName, commit: &CommitId) -> ServiceResult<()> {
        self.post_unit(
            "/.internal/defs/refresh-index",
            &RefreshIndexRequest {
                repo: repo.as_str(),
                commit: commit.as_str(),
            },
        )
        .await
    }

    async fn refresh_packages(&self, repo: &RepoName, commit: &CommitId) -> ServiceResult<()> {
        self.post_unit(
            "/.internal/pkgs/refresh-index",
            &RefreshIndexRequest {
                repo: repo.as_str(),
                commit: commit.as_str(),
            },
        )
        .await
    }
}

#[async_trait]
impl LanguageServerControl for InternalClient {
    async fn enable_language(&self, language: &str) -> ServiceResult<()> {
        self.post_unit(
            "/.internal/lang-servers/enable",
            &EnableLanguageRequest { language },
        )
        .await
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Unavailable(err.to_string())
}

/// Map a non-success HTTP status to the collaborator error taxonomy.
pub(crate) fn status_error(status: StatusCode, message: String) -> ServiceError {
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::NotAuthenticated(message),
        StatusCode::NOT_FOUND => ServiceError::NotFound(message),
        s if s.is_server_error() => ServiceError::Unavailable(message),
        _ => ServiceError::Other(message),
    }
}

fn error_message(text: &str) -> String {
    serde_json::from_str::<ErrorBody>(text)
        .map(|body| body.error)
        .unwrap_or_else(|_| text.trim().to_string())
}
