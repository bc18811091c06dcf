//! Infrastructure adapters for Stencil.
//!
//! This crate implements the ports defined in `stencil_core::application::ports`:
//! preparers for local, GitHub and GitLab template sources, the in-process and
//! sandboxed templaters, and the GitHub/GitLab publishers. It contains all
//! network, process and filesystem I/O.

pub mod fs;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod preparer;
pub mod publisher;
pub mod sandbox;
pub mod templater;

// Re-export commonly used adapters
pub use git::{ContentPusher, GitCli, PushCredentials};
pub use github::GithubClient;
pub use gitlab::GitlabClient;
pub use preparer::{FilePreparer, GithubPreparer, GitlabPreparer};
pub use publisher::{GithubPublisher, GitlabPublisher};
pub use sandbox::ContainerRuntime;
pub use templater::{CookiecutterTemplater, CraTemplater, SimpleTemplater};
