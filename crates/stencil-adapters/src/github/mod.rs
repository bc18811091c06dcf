//! GitHub integration: REST client and repository URL parsing.

mod client;
mod url;

pub use client::{
    Account, CreateRepository, CreatedRepository, DEFAULT_API_URL, GithubClient, TreeEntry,
};
pub use url::GithubSource;
