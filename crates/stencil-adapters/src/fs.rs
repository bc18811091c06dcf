//! Local tree helpers shared by preparers and templaters.
//!
//! Everything here is blocking; async callers go through [`blocking`].

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use stencil_core::application::StageError;
use tracing::debug;
use walkdir::WalkDir;

/// Directory names never copied out of a template source.
const SKIPPED_DIRS: &[&str] = &[".git"];

/// Run blocking filesystem work off the async runtime.
pub async fn blocking<T, F>(work: F) -> Result<T, StageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StageError::Filesystem {
            path: String::new(),
            reason: format!("blocking task failed: {e}"),
        })?
}

/// Remove everything inside `dir`, keeping `dir` itself.
pub fn clear_dir(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Sorted, recursive walk of `root` that skips VCS metadata.
pub fn walk(root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIPPED_DIRS
                    .iter()
                    .any(|skip| e.file_name() == std::ffi::OsStr::new(skip)))
        })
}

/// Copy the contents of `src` into `dst`. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize, StageError> {
    let mut files = 0;
    for entry in walk(src) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| StageError::Filesystem {
                path: entry.path().display().to_string(),
                reason: e.to_string(),
            })?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| StageError::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| StageError::io(entry.path(), e))?;
            files += 1;
        }
    }
    debug!(src = %src.display(), dst = %dst.display(), files, "Tree copied");
    Ok(files)
}

/// Join a slash-separated relative path onto `root`, refusing anything that
/// could escape it.
pub fn safe_join(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    if rel.as_os_str().is_empty() {
        return None;
    }
    let mut out = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(out)
}

/// Write `bytes` to `root/rel`, creating parent directories.
pub fn write_relative(root: &Path, rel: &str, bytes: &[u8]) -> Result<(), StageError> {
    let target = safe_join(root, rel).ok_or_else(|| StageError::Filesystem {
        path: rel.to_string(),
        reason: "path escapes the destination directory".into(),
    })?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
    }
    fs::write(&target, bytes).map_err(|e| StageError::io(&target, e))
}

/// If `dir` holds exactly one entry and it is a directory, move that
/// directory's contents up into `dir`.
///
/// Generators such as cookiecutter and create-react-app write their result
/// into a single named folder; the publisher wants the repository root.
pub fn hoist_single_dir(dir: &Path) -> Result<bool, StageError> {
    let entries = fs::read_dir(dir)
        .and_then(|rd| rd.collect::<io::Result<Vec<_>>>())
        .map_err(|e| StageError::io(dir, e))?;

    let [only] = entries.as_slice() else {
        return Ok(false);
    };
    let inner = only.path();
    if !inner.is_dir() || inner.is_symlink() {
        return Ok(false);
    }

    // Rename first so a child with the same name as its parent cannot collide.
    let staging = dir.join(format!(".stencil-hoist-{}", uuid::Uuid::new_v4()));
    fs::rename(&inner, &staging).map_err(|e| StageError::io(&inner, e))?;
    for entry in fs::read_dir(&staging).map_err(|e| StageError::io(&staging, e))? {
        let entry = entry.map_err(|e| StageError::io(&staging, e))?;
        let target = dir.join(entry.file_name());
        fs::rename(entry.path(), &target).map_err(|e| StageError::io(&target, e))?;
    }
    fs::remove_dir(&staging).map_err(|e| StageError::io(&staging, e))?;

    debug!(dir = %dir.display(), from = %inner.display(), "Hoisted single top-level directory");
    Ok(true)
}

fn walk_error(root: &Path, err: walkdir::Error) -> StageError {
    let path = err
        .path()
        .unwrap_or(root)
        .display()
        .to_string();
    StageError::Filesystem {
        path,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            write_relative(dir.path(), rel, content.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn copy_tree_skips_git_metadata() {
        let src = tree(&[
            ("README.md", "hello"),
            ("src/main.rs", "fn main() {}"),
            (".git/HEAD", "ref: refs/heads/main"),
        ]);
        let dst = TempDir::new().unwrap();

        let files = copy_tree(src.path(), dst.path()).unwrap();

        assert_eq!(files, 2);
        assert_eq!(
            fs::read_to_string(dst.path().join("src/main.rs")).unwrap(),
            "fn main() {}"
        );
        assert!(!dst.path().join(".git").exists());
    }

    #[test]
    fn clear_dir_keeps_the_directory() {
        let dir = tree(&[("a.txt", "a"), ("nested/b.txt", "b")]);
        clear_dir(dir.path()).unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn safe_join_rejects_escapes() {
        let root = Path::new("/work");
        assert_eq!(safe_join(root, "a/b.txt"), Some(PathBuf::from("/work/a/b.txt")));
        assert_eq!(safe_join(root, "./a"), Some(PathBuf::from("/work/a")));
        assert_eq!(safe_join(root, "../etc/passwd"), None);
        assert_eq!(safe_join(root, "/etc/passwd"), None);
        assert_eq!(safe_join(root, ""), None);
    }

    #[test]
    fn hoist_moves_single_directory_up() {
        let dir = tree(&[("my-app/package.json", "{}"), ("my-app/my-app/x", "nested")]);
        assert!(hoist_single_dir(dir.path()).unwrap());
        assert!(dir.path().join("package.json").is_file());
        assert!(dir.path().join("my-app/x").is_file());
    }

    #[test]
    fn hoist_leaves_multiple_entries_alone() {
        let dir = tree(&[("a/x", "1"), ("b.txt", "2")]);
        assert!(!hoist_single_dir(dir.path()).unwrap());
        assert!(dir.path().join("a/x").is_file());
    }
}
