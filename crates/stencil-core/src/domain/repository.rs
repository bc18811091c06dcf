//! Published repository value objects.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Who can see a newly created repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    /// Visible to members of the owning organization/instance only.
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Internal => "internal",
        }
    }
}

impl FromStr for Visibility {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "internal" => Ok(Self::Internal),
            other => Err(DomainError::InvalidVisibility(other.to_string())),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a repository created by a publisher.
///
/// This is the terminal artifact of a successful job, and is also attached to
/// publish failures that happen after the repository was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    /// Scheme of the publisher that created it (`github`, `gitlab/api`, ...).
    pub host: String,
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
    /// URL that git pushes to.
    pub remote_url: String,
    /// Browser URL, when the host reports one.
    pub web_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RemoteRepository {
    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.full_name(), self.visibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_parses_case_insensitively() {
        assert_eq!("Private".parse::<Visibility>().unwrap(), Visibility::Private);
        assert_eq!(" public ".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("INTERNAL".parse::<Visibility>().unwrap(), Visibility::Internal);
    }

    #[test]
    fn unknown_visibility_is_rejected() {
        assert!(matches!(
            "secret".parse::<Visibility>(),
            Err(DomainError::InvalidVisibility(v)) if v == "secret"
        ));
    }

    #[test]
    fn visibility_serializes_lowercase() {
        let json = serde_json::to_string(&Visibility::Internal).unwrap();
        assert_eq!(json, "\"internal\"");
    }

    #[test]
    fn repository_display() {
        let repo = RemoteRepository {
            host: "github".into(),
            owner: "acme".into(),
            name: "demo".into(),
            visibility: Visibility::Private,
            remote_url: "https://github.com/acme/demo.git".into(),
            web_url: None,
            created_at: Utc::now(),
        };
        assert_eq!(repo.full_name(), "acme/demo");
        assert_eq!(repo.to_string(), "github:acme/demo (private)");
    }
}
