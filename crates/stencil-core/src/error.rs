//! Unified error handling for Stencil Core.
//!
//! This module provides a unified error type that wraps domain and scaffold
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ScaffoldError;
use crate::domain::{DomainError, ErrorKind};

/// Root error type for Stencil Core operations.
#[derive(Debug, Error, Clone)]
pub enum StencilError {
    /// Invalid request (bad location, name, parameters...).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A scaffold job failed.
    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl StencilError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Scaffold(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Run: stencil config show to inspect the effective configuration".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in Stencil".into(),
                "Please report this issue with the output of: stencil -vvv".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Scaffold(e) => match e.kind() {
                ErrorKind::UnknownScheme | ErrorKind::RenderError => ErrorCategory::Validation,
                ErrorKind::SourceNotFound | ErrorKind::NotFound => ErrorCategory::NotFound,
                ErrorKind::RepoAlreadyExists => ErrorCategory::Conflict,
                ErrorKind::PermissionDenied => ErrorCategory::Configuration,
                ErrorKind::RemoteFetchError
                | ErrorKind::SandboxUnavailable
                | ErrorKind::Timeout
                | ErrorKind::NetworkError
                | ErrorKind::PushRejected => ErrorCategory::Remote,
                ErrorKind::Cancelled => ErrorCategory::Cancelled,
                ErrorKind::Filesystem => ErrorCategory::Internal,
            },
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scaffold(e) if e.is_retryable())
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Configuration,
    Remote,
    Cancelled,
    Internal,
}

/// Convenient result type alias.
pub type StencilResult<T> = Result<T, StencilError>;
