//! Shared HTTP plumbing for the code-host API clients.

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use stencil_core::application::StageError;
use thiserror::Error;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type alias for API client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur when talking to a code-host API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, TLS, timeout, ...)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Base URL cannot be extended with path segments
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// A listing was cut short by the server
    #[error("Listing truncated: {0}")]
    Truncated(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    pub fn message_contains(&self, needle: &str) -> bool {
        matches!(self, Self::Status { message, .. } if message.contains(needle))
    }

    /// Classification for template retrieval: 404 means the template is not
    /// there, anything else is a fetch failure.
    pub fn into_fetch_error(self, what: impl Into<String>) -> StageError {
        if self.is_not_found() {
            StageError::NotFound { what: what.into() }
        } else {
            StageError::RemoteFetch {
                reason: self.to_string(),
            }
        }
    }
}

/// Build the `reqwest` client used by the API clients.
pub fn build_client(timeout: Duration) -> ApiResult<Client> {
    Ok(Client::builder()
        .user_agent(concat!("stencil/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}

/// Append `segments` to `base`, percent-encoding each one.
pub fn endpoint<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> ApiResult<Url> {
    let mut url = Url::parse(base).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Check the status and deserialize a JSON body.
pub async fn json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let response = check(response).await?;
    response
        .json()
        .await
        .map_err(|e| ApiError::Parse(format!("Failed to parse JSON response: {}", e)))
}

/// Check the status and return the raw body.
pub async fn bytes(response: Response) -> ApiResult<Vec<u8>> {
    let response = check(response).await?;
    Ok(response.bytes().await?.to_vec())
}

/// Turn a non-success status into [`ApiError::Status`].
pub async fn check(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
