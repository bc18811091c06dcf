// ============================================================================
// domain/error.rs - DOMAIN ERRORS AND FAILURE CLASSIFICATION
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root domain error type.
///
/// Raised when a request or a state change breaks a domain rule. These never
/// involve I/O; pipeline failures are `StageError`s in the application layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid template location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Invalid repository name '{name}': {reason}")]
    InvalidRepositoryName { name: String, reason: String },

    #[error("Invalid repository owner '{owner}': {reason}")]
    InvalidOwner { owner: String, reason: String },

    #[error("Unknown visibility '{0}' (expected public, private or internal)")]
    InvalidVisibility(String),

    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },

    // ========================================================================
    // State Machine Violations
    // ========================================================================
    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidLocation { .. } => vec![
                "Template locations have the form <scheme>:<target>".into(),
                "Examples: file:/srv/templates/service".into(),
                "          github:https://github.com/acme/templates/tree/main/service".into(),
            ],
            Self::InvalidParameter { key, .. } => vec![
                format!("Parameter '{}' must be a string, number or boolean", key),
                "Nested objects and arrays are not supported".into(),
            ],
            Self::InvalidRepositoryName { .. } => vec![
                "Use letters, digits, '.', '-' and '_' only".into(),
                "Names are limited to 100 characters".into(),
            ],
            Self::InvalidVisibility(_) => {
                vec!["Use one of: public, private, internal".into()]
            }
            Self::MissingRequiredField { field } => {
                vec![format!("Provide a value for '{}'", field)]
            }
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTransition { .. } => ErrorCategory::Internal,
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Internal,
}

/// Classification of a pipeline failure.
///
/// Every backend failure maps to exactly one kind. The kind is what a caller
/// inspects to decide between retrying, fixing input, or giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownScheme,
    SourceNotFound,
    RemoteFetchError,
    NotFound,
    RenderError,
    SandboxUnavailable,
    Timeout,
    RepoAlreadyExists,
    PermissionDenied,
    PushRejected,
    NetworkError,
    Cancelled,
    /// Local I/O failure (working directory, copying) not covered above.
    Filesystem,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownScheme => "unknown_scheme",
            Self::SourceNotFound => "source_not_found",
            Self::RemoteFetchError => "remote_fetch_error",
            Self::NotFound => "not_found",
            Self::RenderError => "render_error",
            Self::SandboxUnavailable => "sandbox_unavailable",
            Self::Timeout => "timeout",
            Self::RepoAlreadyExists => "repo_already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::PushRejected => "push_rejected",
            Self::NetworkError => "network_error",
            Self::Cancelled => "cancelled",
            Self::Filesystem => "filesystem",
        }
    }

    /// Transient kinds: the same request may succeed if simply run again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RemoteFetchError | Self::SandboxUnavailable | Self::Timeout | Self::NetworkError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::RepoAlreadyExists.to_string(), "repo_already_exists");
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn transient_kinds() {
        assert!(ErrorKind::NetworkError.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(!ErrorKind::RepoAlreadyExists.is_transient());
        assert!(!ErrorKind::Cancelled.is_transient());
    }

    #[test]
    fn transition_errors_are_internal() {
        let err = DomainError::InvalidTransition {
            from: "created".into(),
            to: "publishing".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Internal);
    }

    #[test]
    fn validation_errors_have_suggestions() {
        let err = DomainError::InvalidVisibility("secret".into());
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.suggestions().iter().any(|s| s.contains("private")));
    }
}
