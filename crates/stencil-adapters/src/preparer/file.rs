use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stencil_core::{
    application::{StageError, ports::Preparer},
    domain::TemplateLocation,
};
use tracing::{info, instrument};

use crate::fs;

/// Copies a template from the local filesystem.
///
/// The target is a directory, or a file inside one (typically the
/// template's `template.yaml`), in which case its directory is copied.
#[derive(Debug, Clone, Default)]
pub struct FilePreparer;

impl FilePreparer {
    pub fn new() -> Self {
        Self
    }

    /// Directory to copy for `target`. Accepts `file:///abs` style targets.
    fn source_dir(target: &str) -> Result<PathBuf, StageError> {
        let raw = target.strip_prefix("//").unwrap_or(target);
        let path = Path::new(raw);
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
        if path.is_file() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                return Ok(parent.to_path_buf());
            }
            return Ok(PathBuf::from("."));
        }
        Err(StageError::SourceNotFound {
            path: raw.to_string(),
        })
    }
}

#[async_trait]
impl Preparer for FilePreparer {
    #[instrument(skip(self, destination), fields(target = %location.target()))]
    async fn prepare(
        &self,
        location: &TemplateLocation,
        destination: &Path,
    ) -> Result<(), StageError> {
        let source = Self::source_dir(location.target())?;
        let destination = destination.to_path_buf();

        let files = fs::blocking(move || {
            fs::clear_dir(&destination).map_err(|e| StageError::io(&destination, e))?;
            fs::copy_tree(&source, &destination)
        })
        .await?;

        info!(files, "Local template copied");
        Ok(())
    }
}
