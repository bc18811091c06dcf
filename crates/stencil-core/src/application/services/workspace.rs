//! Per-job working directory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{application::StageError, domain::JobId};

const TEMPLATE_DIR: &str = "template";
const OUTPUT_DIR: &str = "output";

/// Scratch space exclusively owned by one job.
///
/// ```text
/// <root>/stencil-<job_id>-XXXX/
/// ├── template/   prepare destination, template source
/// └── output/     template destination, publish source
/// ```
///
/// Removed by [`close`](Self::close), or on drop if the job never got there
/// (panic, cancellation).
#[derive(Debug)]
pub struct WorkingDirectory {
    dir: TempDir,
}

impl WorkingDirectory {
    /// Create the directory under `root`, or under the system temp dir.
    pub fn create(job_id: JobId, root: Option<&Path>) -> Result<Self, StageError> {
        let prefix = format!("stencil-{job_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| StageError::io(root, e))?;
                builder.tempdir_in(root).map_err(|e| StageError::io(root, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| StageError::io(std::env::temp_dir(), e))?,
        };

        for sub in [TEMPLATE_DIR, OUTPUT_DIR] {
            let path = dir.path().join(sub);
            fs::create_dir(&path).map_err(|e| StageError::io(&path, e))?;
        }

        debug!(path = %dir.path().display(), "Working directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn template_dir(&self) -> PathBuf {
        self.dir.path().join(TEMPLATE_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_DIR)
    }

    /// Remove the directory and everything in it.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!(path = %path.display(), "Working directory removed");
                Ok(())
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to remove working directory");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_created_under_root() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::new();
        let wd = WorkingDirectory::create(id, Some(root.path())).unwrap();

        assert!(wd.path().starts_with(root.path()));
        assert!(wd.template_dir().is_dir());
        assert!(wd.output_dir().is_dir());
        let name = wd.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("stencil-{id}-")));
    }

    #[test]
    fn close_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let wd = WorkingDirectory::create(JobId::new(), Some(root.path())).unwrap();
        fs::write(wd.output_dir().join("README.md"), "hi").unwrap();
        let path = wd.path().to_path_buf();

        wd.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let wd = WorkingDirectory::create(JobId::new(), Some(root.path())).unwrap();
            wd.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let wd = WorkingDirectory::create(JobId::new(), Some(&nested)).unwrap();
        assert!(wd.path().starts_with(&nested));
    }
}
