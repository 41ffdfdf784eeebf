//! GitHub REST client for recipe repositories.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::http::{error_for_status, send_with_retry};
use super::types::{
    BranchResponse, CommitResponse, RepoCoordinates, RepositoryInfo, TreeEntry, TreeResponse,
};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding an optional bearer token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub const DEFAULT_API_BASE: &str = "https://api.github.com/";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com/";
pub const DEFAULT_WEB_BASE: &str = "https://github.com/";

const USER_AGENT: &str = concat!("recipe-bridge/", env!("CARGO_PKG_VERSION"));

/// Read access to a hosted recipe repository.
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Latest commit on the branch.
    async fn latest_commit(&self, coords: &RepoCoordinates) -> Result<RepositoryInfo>;

    /// Every entry of the branch's tree, recursively.
    async fn recursive_tree(&self, coords: &RepoCoordinates) -> Result<Vec<TreeEntry>>;

    /// Raw file content at `git_ref`.
    async fn raw_file(&self, coords: &RepoCoordinates, git_ref: &str, path: &str) -> Result<String>;
}

/// [`RepositoryApi`] over the public GitHub endpoints.
pub struct GitHubClient {
    client: Client,
    api_base: Url,
    raw_base: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Client against github.com, picking up `GITHUB_TOKEN` if set.
    pub fn new() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        Self::with_bases(DEFAULT_API_BASE, DEFAULT_RAW_BASE, token)
    }

    pub fn with_bases(api_base: &str, raw_base: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: Url::parse(api_base)
                .with_context(|| format!("Invalid API base URL: {}", api_base))?,
            raw_base: Url::parse(raw_base)
                .with_context(|| format!("Invalid raw base URL: {}", raw_base))?,
            token,
        })
    }

    fn api_url(&self, coords: &RepoCoordinates, tail: &str) -> Result<Url> {
        let endpoint = format!("repos/{}/{}/{}", coords.owner, coords.repo, tail);
        self.api_base
            .join(&endpoint)
            .with_context(|| format!("Failed to build URL for endpoint: {}", endpoint))
    }

    fn raw_url(&self, coords: &RepoCoordinates, git_ref: &str, path: &str) -> Result<Url> {
        let endpoint = format!(
            "{}/{}/{}/{}",
            coords.owner,
            coords.repo,
            git_ref,
            path.trim_start_matches('/')
        );
        self.raw_base
            .join(&endpoint)
            .with_context(|| format!("Failed to build raw URL for {}", path))
    }

    async fn get(&self, url: &Url, accept: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let response = send_with_retry(|| {
            let mut request = self.client.get(url.clone()).header("Accept", accept);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        error_for_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let response = self.get(url, "application/vnd.github+json").await?;
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

#[async_trait]
impl RepositoryApi for GitHubClient {
    async fn latest_commit(&self, coords: &RepoCoordinates) -> Result<RepositoryInfo> {
        let url = self.api_url(coords, &format!("commits/{}", coords.branch))?;
        let commit: CommitResponse = self.get_json(&url).await?;
        Ok(commit.into())
    }

    async fn recursive_tree(&self, coords: &RepoCoordinates) -> Result<Vec<TreeEntry>> {
        let branch_url = self.api_url(coords, &format!("branches/{}", coords.branch))?;
        let branch: BranchResponse = self.get_json(&branch_url).await?;

        let tree_sha = branch.commit.commit.tree.sha;
        let mut tree_url = self.api_url(coords, &format!("git/trees/{}", tree_sha))?;
        tree_url.query_pairs_mut().append_pair("recursive", "1");

        let tree: TreeResponse = self.get_json(&tree_url).await?;
        if tree.truncated {
            warn!("Tree listing for {} was truncated by the server", coords);
        }
        Ok(tree.tree)
    }

    async fn raw_file(
        &self,
        coords: &RepoCoordinates,
        git_ref: &str,
        path: &str,
    ) -> Result<String> {
        let url = self.raw_url(coords, git_ref, path)?;
        let response = self.get(&url, "text/plain").await?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read {}", path))
    }
}
