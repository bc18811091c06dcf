//! Application layer errors.
//!
//! Backends report a [`StageError`]. The orchestrator wraps it, together with
//! the stage and scheme it came from, in a [`ScaffoldError`]. The underlying
//! error is never discarded.

use std::{io, path::Path, time::Duration};

use thiserror::Error;

use crate::domain::{ErrorKind, JobId, RemoteRepository, Stage};

/// Failure reported by a single stage backend. One variant per [`ErrorKind`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageError {
    #[error("No {registry} registered for scheme '{scheme}'")]
    UnknownScheme {
        registry: &'static str,
        scheme: String,
    },

    #[error("Template source not found: {path}")]
    SourceNotFound { path: String },

    #[error("Failed to fetch template: {reason}")]
    RemoteFetch { reason: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Rendering failed: {reason}")]
    Render { reason: String },

    #[error("Sandbox unavailable: {reason}")]
    SandboxUnavailable { reason: String },

    #[error("Timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    #[error("Repository {owner}/{name} already exists")]
    RepoAlreadyExists { owner: String, name: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Push rejected: {reason}")]
    PushRejected { reason: String },

    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Filesystem error at {path}: {reason}")]
    Filesystem { path: String, reason: String },
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownScheme { .. } => ErrorKind::UnknownScheme,
            Self::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            Self::RemoteFetch { .. } => ErrorKind::RemoteFetchError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Render { .. } => ErrorKind::RenderError,
            Self::SandboxUnavailable { .. } => ErrorKind::SandboxUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RepoAlreadyExists { .. } => ErrorKind::RepoAlreadyExists,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::PushRejected { .. } => ErrorKind::PushRejected,
            Self::Network { .. } => ErrorKind::NetworkError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
        }
    }

    /// Wrap a local I/O failure at `path`.
    pub fn io(path: impl AsRef<Path>, err: io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn render(reason: impl Into<String>) -> Self {
        Self::Render {
            reason: reason.into(),
        }
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }
}

/// Publisher failure.
///
/// `repository` is set whenever the remote repository was created before the
/// failure, so the caller can inspect or clean it up.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{error}")]
pub struct PublishError {
    #[source]
    pub error: StageError,
    pub repository: Option<RemoteRepository>,
}

impl PublishError {
    /// Failure before the remote repository existed.
    pub fn before_creation(error: StageError) -> Self {
        Self {
            error,
            repository: None,
        }
    }

    /// Failure after the remote repository was created.
    pub fn after_creation(error: StageError, repository: RemoteRepository) -> Self {
        Self {
            error,
            repository: Some(repository),
        }
    }
}

impl From<StageError> for PublishError {
    fn from(error: StageError) -> Self {
        Self::before_creation(error)
    }
}

/// Terminal failure of one scaffold job.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Job {job_id} failed while {stage} ({scheme}): {error}")]
pub struct ScaffoldError {
    pub job_id: JobId,
    pub stage: Stage,
    /// Scheme of the backend that failed (or could not be resolved).
    pub scheme: String,
    #[source]
    pub error: StageError,
    /// Remote repository created before the failure, if any.
    pub repository: Option<RemoteRepository>,
}

impl ScaffoldError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_transient()
    }

    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        let mut suggestions = match &self.error {
            StageError::UnknownScheme { registry, .. } => vec![
                format!("No {registry} handles scheme '{}'", self.scheme),
                "Try: stencil schemes to list the registered schemes".into(),
            ],
            StageError::SourceNotFound { path } => vec![
                format!("Check that '{path}' exists and is readable"),
                "File locations need an absolute path: file:/path/to/template".into(),
            ],
            StageError::NotFound { .. } => vec![
                "Check the repository URL, branch and sub-path".into(),
                "Private repositories need a token with read access".into(),
            ],
            StageError::RemoteFetch { .. } | StageError::Network { .. } => vec![
                "Check your network connection".into(),
                "This failure is usually transient; try again".into(),
            ],
            StageError::Render { .. } => vec![
                "Check that every template placeholder has a parameter".into(),
                "Pass parameters with -p key=value or --params-file".into(),
            ],
            StageError::SandboxUnavailable { .. } => vec![
                "Make sure docker (or podman) is installed and running".into(),
                "Or use an in-process engine: --engine simple".into(),
            ],
            StageError::Timeout { .. } => vec![
                "The stage exceeded its time limit".into(),
                "Increase sandbox.timeout_secs in the configuration".into(),
            ],
            StageError::RepoAlreadyExists { owner, name } => vec![
                format!("Choose another name or delete {owner}/{name} first"),
            ],
            StageError::PermissionDenied { .. } => vec![
                "Check that the configured token is valid".into(),
                "The token needs permission to create repositories for this owner".into(),
            ],
            StageError::PushRejected { .. } => vec![
                "The host refused the initial push".into(),
                "Check branch protection rules on the new repository".into(),
            ],
            StageError::Cancelled => vec!["The job was cancelled before it finished".into()],
            StageError::Filesystem { path, .. } => vec![
                format!("Failed to access: {path}"),
                "Check free disk space and permissions of the working directory root".into(),
            ],
        };

        if let Some(repository) = &self.repository {
            suggestions.push(format!(
                "Repository {} was created before the failure and was left in place",
                repository.full_name()
            ));
        }
        suggestions
    }
}
