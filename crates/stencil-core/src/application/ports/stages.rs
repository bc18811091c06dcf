//! Stage ports - implemented by infrastructure, selected by scheme.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    application::{PublishError, StageError},
    domain::{Parameters, PublishTarget, RemoteRepository, TemplateLocation},
};

/// Port for retrieving a template source.
///
/// Implemented by:
/// - `stencil_adapters::preparer::FilePreparer` (`file`)
/// - `stencil_adapters::preparer::GithubPreparer` (`github`)
/// - `stencil_adapters::preparer::GitlabPreparer` (`gitlab`, `gitlab/api`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Preparer: Send + Sync {
    /// Populate `destination` with the template files found at `location`.
    ///
    /// `destination` exists and is empty on first call. Implementations clear
    /// it before writing, so calling again overwrites the previous result.
    async fn prepare(&self, location: &TemplateLocation, destination: &Path)
    -> Result<(), StageError>;
}

/// Port for rendering a prepared template.
///
/// Implemented by:
/// - `stencil_adapters::templater::SimpleTemplater` (`simple`, in-process)
/// - `stencil_adapters::templater::CookiecutterTemplater` (`cookiecutter`, sandboxed)
/// - `stencil_adapters::templater::CraTemplater` (`cra`, sandboxed)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Templater: Send + Sync {
    /// Render `source` with `parameters` into `destination`.
    ///
    /// `source` is read-only from the templater's point of view.
    async fn template(
        &self,
        source: &Path,
        parameters: &Parameters,
        destination: &Path,
    ) -> Result<(), StageError>;

    /// Output paths (relative to `destination`) whose content may differ
    /// between runs with identical input.
    fn volatile_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Port for publishing a rendered tree as a new remote repository.
///
/// Implemented by:
/// - `stencil_adapters::publisher::GithubPublisher` (`github`, `github/api`)
/// - `stencil_adapters::publisher::GitlabPublisher` (`gitlab`, `gitlab/api`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create the repository, commit the contents of `rendered` and push.
    ///
    /// The only write allowed inside `rendered` is version-control metadata.
    /// A failure after creation returns the created repository in the error;
    /// publishers never delete it.
    async fn publish(
        &self,
        rendered: &Path,
        target: &PublishTarget,
    ) -> Result<RemoteRepository, PublishError>;
}
