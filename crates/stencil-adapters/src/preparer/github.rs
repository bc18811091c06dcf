use std::path::Path;

use async_trait::async_trait;
use stencil_core::{
    application::{StageError, ports::Preparer},
    domain::TemplateLocation,
};
use tracing::{debug, info, instrument};

use crate::{
    fs,
    github::{GithubClient, GithubSource},
};

/// Downloads a template directory from a GitHub repository.
#[derive(Debug, Clone)]
pub struct GithubPreparer {
    client: GithubClient,
}

impl GithubPreparer {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }
}

/// Blob paths under `prefix`, with the prefix stripped.
pub(crate) fn select_under<'a>(
    blobs: impl IntoIterator<Item = &'a str>,
    prefix: &str,
) -> Vec<(String, String)> {
    let prefix = prefix.trim_matches('/');
    blobs
        .into_iter()
        .filter_map(|path| {
            if prefix.is_empty() {
                return Some((path.to_string(), path.to_string()));
            }
            path.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rel| (path.to_string(), rel.to_string()))
        })
        .collect()
}

#[async_trait]
impl Preparer for GithubPreparer {
    #[instrument(skip(self, destination), fields(target = %location.target()))]
    async fn prepare(
        &self,
        location: &TemplateLocation,
        destination: &Path,
    ) -> Result<(), StageError> {
        let source = GithubSource::parse(location.target())?;
        let what = location.to_string();

        let reference = match &source.reference {
            Some(reference) => reference.clone(),
            None => self
                .client
                .default_branch(&source.owner, &source.repo)
                .await
                .map_err(|e| e.into_fetch_error(what.clone()))?,
        };

        let tree = self
            .client
            .tree(&source.owner, &source.repo, &reference)
            .await
            .map_err(|e| e.into_fetch_error(what.clone()))?;
        let files = select_under(
            tree.iter().filter(|e| e.is_blob()).map(|e| e.path.as_str()),
            &source.path,
        );
        if files.is_empty() {
            return Err(StageError::NotFound { what });
        }

        let dir = destination.to_path_buf();
        fs::blocking(move || fs::clear_dir(&dir).map_err(|e| StageError::io(&dir, e))).await?;

        for (remote, rel) in &files {
            let bytes = self
                .client
                .raw_file(&source.owner, &source.repo, remote, &reference)
                .await
                .map_err(|e| e.into_fetch_error(format!("{what} ({remote})")))?;
            fs::write_relative(destination, rel, &bytes)?;
            debug!(path = %rel, bytes = bytes.len(), "Downloaded");
        }

        info!(files = files.len(), reference = %reference, "GitHub template downloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_under_strips_prefix() {
        let blobs = ["README.md", "svc/api/main.rs", "svc/api/Cargo.toml", "svc/apix/x"];
        let selected = select_under(blobs, "svc/api");
        assert_eq!(
            selected,
            vec![
                ("svc/api/main.rs".to_string(), "main.rs".to_string()),
                ("svc/api/Cargo.toml".to_string(), "Cargo.toml".to_string()),
            ]
        );
    }

    #[test]
    fn empty_prefix_selects_everything() {
        let selected = select_under(["a", "b/c"], "");
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].1, "b/c");
    }
}
