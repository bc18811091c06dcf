//! GitLab integration: REST (v4) client and repository URL parsing.

mod client;
mod url;

pub use client::{CreateProject, DEFAULT_BASE_URL, GitlabClient, Namespace, Project, TreeEntry};
pub use url::GitlabSource;
