use std::path::Path;

use async_trait::async_trait;
use stencil_core::{
    application::{StageError, ports::Preparer},
    domain::TemplateLocation,
};
use tracing::{debug, info, instrument};

use super::github::select_under;
use crate::{
    fs,
    gitlab::{GitlabClient, GitlabSource},
};

/// Downloads a template directory from a GitLab project.
///
/// Only the URL path is used to locate the project; requests go to the
/// client's configured instance.
#[derive(Debug, Clone)]
pub struct GitlabPreparer {
    client: GitlabClient,
}

impl GitlabPreparer {
    pub fn new(client: GitlabClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Preparer for GitlabPreparer {
    #[instrument(skip(self, destination), fields(target = %location.target()))]
    async fn prepare(
        &self,
        location: &TemplateLocation,
        destination: &Path,
    ) -> Result<(), StageError> {
        let source = GitlabSource::parse(location.target())?;
        let what = location.to_string();

        let project = self
            .client
            .project(&source.project)
            .await
            .map_err(|e| e.into_fetch_error(what.clone()))?;
        let reference = source
            .reference
            .clone()
            .or(project.default_branch.clone())
            .ok_or_else(|| StageError::NotFound {
                what: format!("{what} (project has no default branch)"),
            })?;

        let tree = self
            .client
            .tree(project.id, &source.path, &reference)
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
                .raw_file(project.id, remote, &reference)
                .await
                .map_err(|e| e.into_fetch_error(format!("{what} ({remote})")))?;
            fs::write_relative(destination, rel, &bytes)?;
            debug!(path = %rel, bytes = bytes.len(), "Downloaded");
        }

        info!(
            project = %project.path_with_namespace,
            files = files.len(),
            reference = %reference,
            "GitLab template downloaded"
        );
        Ok(())
    }
}
