//! Preparers: fetch a template source into the job's working directory.

mod file;
mod github;
mod gitlab;

pub use file::FilePreparer;
pub use github::GithubPreparer;
pub use gitlab::GitlabPreparer;
