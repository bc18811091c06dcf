//! Publishers: create the remote repository and push the rendered tree.

mod github;
mod gitlab;

pub use github::GithubPublisher;
pub use gitlab::GitlabPublisher;
