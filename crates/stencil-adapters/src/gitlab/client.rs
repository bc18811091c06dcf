//! Minimal GitLab REST API (v4) client.

use std::{fmt, time::Duration};

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::{self, ApiResult};

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com";

const PAGE_SIZE: &str = "100";

/// Project metadata needed to address the repository API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub path_with_namespace: String,
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// A user or group namespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Namespace {
    pub id: u64,
    pub full_path: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Body of `POST /projects`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateProject {
    pub name: String,
    pub path: String,
    pub namespace_id: u64,
    pub visibility: String,
}

/// HTTP client for the GitLab REST API.
#[derive(Clone)]
pub struct GitlabClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl GitlabClient {
    /// Create a client for the instance at `base_url` (`https://gitlab.com`
    /// or a self-managed host).
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        Ok(Self::with_client(base_url, token, http::build_client(timeout)?))
    }

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

    fn api<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> ApiResult<reqwest::Url> {
        http::endpoint(
            &self.base_url,
            ["api", "v4"].into_iter().chain(segments),
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("PRIVATE-TOKEN", token),
            None => request,
        }
    }

    /// Look up a project by its `group/project` path.
    #[instrument(skip(self))]
    pub async fn project(&self, path: &str) -> ApiResult<Project> {
        let url = self.api(["projects", path])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        http::json(response).await
    }

    /// Every entry under `path` at `reference`, following pagination.
    #[instrument(skip(self))]
    pub async fn tree(
        &self,
        project_id: u64,
        path: &str,
        reference: &str,
    ) -> ApiResult<Vec<TreeEntry>> {
        let id = project_id.to_string();
        let url = self.api(["projects", id.as_str(), "repository", "tree"])?;

        let mut entries = Vec::new();
        let mut page = String::from("1");
        loop {
            let mut query = vec![
                ("recursive", "true"),
                ("ref", reference),
                ("per_page", PAGE_SIZE),
                ("page", page.as_str()),
            ];
            if !path.is_empty() {
                query.push(("path", path));
            }

            let response = self
                .authorize(self.client.get(url.clone()))
                .query(&query)
                .send()
                .await?;
            let next = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let batch: Vec<TreeEntry> = http::json(response).await?;
            entries.extend(batch);

            match next {
                Some(next) => page = next,
                None => break,
            }
        }
        debug!(entries = entries.len(), "Tree listed");
        Ok(entries)
    }

    /// Raw content of one file at `reference`.
    #[instrument(skip(self))]
    pub async fn raw_file(&self, project_id: u64, path: &str, reference: &str) -> ApiResult<Vec<u8>> {
        let id = project_id.to_string();
        let url = self.api(["projects", id.as_str(), "repository", "files", path, "raw"])?;
        let response = self
            .authorize(self.client.get(url))
            .query(&[("ref", reference)])
            .send()
            .await?;
        http::bytes(response).await
    }

    /// Resolve a user or group namespace by path.
    #[instrument(skip(self))]
    pub async fn namespace(&self, path: &str) -> ApiResult<Namespace> {
        let url = self.api(["namespaces", path])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        http::json(response).await
    }

    #[instrument(skip(self, body), fields(name = %body.name))]
    pub async fn create_project(&self, body: &CreateProject) -> ApiResult<Project> {
        let url = self.api(["projects"])?;
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        http::json(response).await
    }
}

impl fmt::Debug for GitlabClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitlabClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}
