//! Isolated execution port.
//!
//! Sandboxed templaters describe *what* to run; the runtime decides *how*
//! (docker, podman, ...). The container is always discarded afterwards.

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use async_trait::async_trait;

use crate::application::StageError;

/// A host directory made visible inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

impl Mount {
    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: true,
        }
    }

    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: false,
        }
    }
}

/// One sandboxed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSpec {
    pub image: String,
    pub command: Vec<String>,
    pub mounts: Vec<Mount>,
    pub env: BTreeMap<String, String>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// `uid:gid` the command runs as; the image's own user when unset.
    pub user: Option<String>,
    /// Hard bound on execution time; exceeding it yields `StageError::Timeout`.
    pub timeout: Duration,
}

impl SandboxSpec {
    pub fn new(image: impl Into<String>, command: Vec<String>, timeout: Duration) -> Self {
        Self {
            image: image.into(),
            command,
            mounts: Vec::new(),
            env: BTreeMap::new(),
            workdir: None,
            user: None,
            timeout,
        }
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Result of a sandboxed command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl SandboxOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Port for running commands in a disposable, isolated environment.
///
/// Implemented by:
/// - `stencil_adapters::sandbox::ContainerRuntime` (docker/podman CLI)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Check that the isolation technology is installed and reachable.
    async fn ensure_available(&self) -> Result<(), StageError>;

    /// Run `spec` to completion or until its timeout.
    ///
    /// A non-zero exit is reported in [`SandboxOutput`], not as an error.
    /// Dropping the returned future stops the sandbox.
    async fn run(&self, spec: SandboxSpec) -> Result<SandboxOutput, StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builder_collects_mounts_and_env() {
        let spec = SandboxSpec::new(
            "cookiecutter:latest",
            vec!["cookiecutter".into(), "--no-input".into()],
            Duration::from_secs(60),
        )
        .mount(Mount::read_only("/tmp/tpl", "/template"))
        .mount(Mount::read_write("/tmp/out", "/result"))
        .env("HOME", "/tmp")
        .workdir("/result")
        .user("1000:1000");

        assert_eq!(spec.mounts.len(), 2);
        assert!(spec.mounts[0].read_only);
        assert!(!spec.mounts[1].read_only);
        assert_eq!(spec.env.get("HOME").map(String::as_str), Some("/tmp"));
        assert_eq!(spec.workdir.as_deref(), Some("/result"));
        assert_eq!(spec.user.as_deref(), Some("1000:1000"));
        assert_eq!(SandboxSpec::new("img", vec![], Duration::from_secs(1)).user, None);
    }

    #[tokio::test]
    async fn mock_runtime_reports_exit_code() {
        let mut runtime = MockSandboxRuntime::new();
        runtime.expect_run().returning(|_| {
            Ok(SandboxOutput {
                exit_code: 2,
                stdout: String::new(),
                stderr: "bad template".into(),
                duration: Duration::from_millis(10),
            })
        });

        let spec = SandboxSpec::new("img", vec![], Duration::from_secs(1));
        let output = runtime.run(spec).await.unwrap();
        assert!(!output.success());
        assert_eq!(output.stderr, "bad template");
    }
}
