//! Minimal GitHub REST API client.
//!
//! Covers the handful of endpoints the preparer and publisher need: default
//! branch lookup, tree listing, raw file download, account lookup and
//! repository creation.

use std::{fmt, time::Duration};

use reqwest::{Client, RequestBuilder, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::http::{self, ApiError, ApiResult};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";

/// One entry of a git tree listing, `path` relative to the listed root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sha: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }

    fn is_tree(&self) -> bool {
        self.kind == "tree"
    }
}

#[derive(Debug, Deserialize)]
struct Tree {
    #[serde(default)]
    sha: String,
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

/// A user or organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Account {
    pub fn is_organization(&self) -> bool {
        self.kind == "Organization"
    }
}

/// Body of `POST /user/repos` and `POST /orgs/{org}/repos`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepository {
    pub name: String,
    pub private: bool,
    pub visibility: String,
    pub auto_init: bool,
}

/// Repository returned by the creation endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRepository {
    pub full_name: String,
    pub clone_url: String,
    pub html_url: String,
}

/// HTTP client for the GitHub REST API.
#[derive(Clone)]
pub struct GithubClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl GithubClient {
    /// Create a client for `base_url` (`https://api.github.com` or a GitHub
    /// Enterprise `/api/v3` URL).
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        Ok(Self::with_client(base_url, token, http::build_client(timeout)?))
    }

    /// Create a client around a preconfigured `reqwest` client.
    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn get<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
        accept: &str,
    ) -> ApiResult<RequestBuilder> {
        let url = http::endpoint(&self.base_url, segments)?;
        Ok(self.authorize(self.client.get(url), accept))
    }

    fn authorize(&self, request: RequestBuilder, accept: &str) -> RequestBuilder {
        let request = request
            .header(header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    #[instrument(skip(self))]
    pub async fn default_branch(&self, owner: &str, repo: &str) -> ApiResult<String> {
        let response = self.get(["repos", owner, repo], JSON_MEDIA_TYPE)?.send().await?;
        let info: RepositoryInfo = http::json(response).await?;
        Ok(info.default_branch)
    }

    /// Every entry reachable from `reference`.
    ///
    /// Asks for the recursive listing first. When GitHub truncates it the
    /// tree is walked one level per request instead.
    #[instrument(skip(self))]
    pub async fn tree(&self, owner: &str, repo: &str, reference: &str) -> ApiResult<Vec<TreeEntry>> {
        let tree = self.list_tree(owner, repo, reference, true).await?;
        if !tree.truncated {
            debug!(entries = tree.tree.len(), "Tree listed");
            return Ok(tree.tree);
        }

        warn!(owner, repo, reference, "GitHub truncated the tree listing, walking it level by level");
        let root = if tree.sha.is_empty() { reference.to_string() } else { tree.sha };
        let mut entries = Vec::new();
        let mut pending = vec![(String::new(), root)];
        while let Some((prefix, sha)) = pending.pop() {
            let level = self.list_tree(owner, repo, &sha, false).await?;
            if level.truncated {
                return Err(ApiError::Truncated(format!(
                    "{owner}/{repo} tree {sha} has too many entries"
                )));
            }
            for mut entry in level.tree {
                if !prefix.is_empty() {
                    entry.path = format!("{prefix}/{}", entry.path);
                }
                if entry.is_tree() {
                    pending.push((entry.path.clone(), entry.sha.clone()));
                }
                entries.push(entry);
            }
        }
        debug!(entries = entries.len(), "Tree walked");
        Ok(entries)
    }

    async fn list_tree(
        &self,
        owner: &str,
        repo: &str,
        tree: &str,
        recursive: bool,
    ) -> ApiResult<Tree> {
        let mut request = self.get(["repos", owner, repo, "git", "trees", tree], JSON_MEDIA_TYPE)?;
        if recursive {
            request = request.query(&[("recursive", "1")]);
        }
        http::json(request.send().await?).await
    }

    /// Raw content of one file at `reference`.
    #[instrument(skip(self))]
    pub async fn raw_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> ApiResult<Vec<u8>> {
        let segments = ["repos", owner, repo, "contents"]
            .into_iter()
            .chain(path.split('/'));
        let response = self
            .get(segments, RAW_MEDIA_TYPE)?
            .query(&[("ref", reference)])
            .send()
            .await?;
        http::bytes(response).await
    }

    #[instrument(skip(self))]
    pub async fn account(&self, owner: &str) -> ApiResult<Account> {
        let response = self.get(["users", owner], JSON_MEDIA_TYPE)?.send().await?;
        http::json(response).await
    }

    /// Create a repository for the authenticated user, or inside `org`.
    #[instrument(skip(self, body), fields(name = %body.name))]
    pub async fn create_repository(
        &self,
        org: Option<&str>,
        body: &CreateRepository,
    ) -> ApiResult<CreatedRepository> {
        let url = match org {
            Some(org) => http::endpoint(&self.base_url, ["orgs", org, "repos"])?,
            None => http::endpoint(&self.base_url, ["user", "repos"])?,
        };
        let response = self
            .authorize(self.client.post(url), JSON_MEDIA_TYPE)
            .json(body)
            .send()
            .await?;
        http::json(response).await
    }
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}
