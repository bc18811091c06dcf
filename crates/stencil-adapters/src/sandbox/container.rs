//! Docker/Podman backed sandbox.
//!
//! Every run gets a uniquely named container started with `--rm`. A run
//! that times out force-removes its container before returning; a dropped
//! run removes it from the guard's destructor.

use std::{
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use stencil_core::application::{
    StageError,
    ports::{SandboxOutput, SandboxRuntime, SandboxSpec},
};
use tokio::{io::AsyncReadExt, process::Command};
use tracing::{debug, info, instrument, warn};

/// Default time budget for sandboxed templaters.
pub const DEFAULT_SANDBOX_TIMEOUT: Duration = Duration::from_secs(600);

/// Exit status the docker/podman CLI uses for its own failures.
const RUNTIME_FAILURE_EXIT: i32 = 125;

/// Upper bound on `rm -f` after a timeout.
const REMOVE_GRACE: Duration = Duration::from_secs(10);

/// [`SandboxRuntime`] driving a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    binary: String,
}

impl ContainerRuntime {
    /// `binary` is `docker`, `podman`, or a path to either.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Arguments for `<binary> run ...`.
    pub fn run_args(&self, name: &str, spec: &SandboxSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        if let Some(user) = &spec.user {
            args.push("--user".into());
            args.push(user.clone());
        }
        for mount in &spec.mounts {
            let mut volume = format!("{}:{}", mount.host.display(), mount.container);
            if mount.read_only {
                volume.push_str(":ro");
            }
            args.push("-v".into());
            args.push(volume);
        }
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        if let Some(workdir) = &spec.workdir {
            args.push("-w".into());
            args.push(workdir.clone());
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl SandboxRuntime for ContainerRuntime {
    #[instrument(skip(self), fields(binary = %self.binary))]
    async fn ensure_available(&self) -> Result<(), StageError> {
        let output = Command::new(&self.binary)
            .arg("version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StageError::SandboxUnavailable {
                reason: format!("cannot execute {}: {}", self.binary, e),
            })?;

        if output.status.success() {
            debug!("Container runtime available");
            Ok(())
        } else {
            Err(StageError::SandboxUnavailable {
                reason: format!(
                    "{} version failed: {}",
                    self.binary,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    #[instrument(skip(self, spec), fields(binary = %self.binary, image = %spec.image))]
    async fn run(&self, spec: SandboxSpec) -> Result<SandboxOutput, StageError> {
        let name = format!("stencil-{}", uuid::Uuid::new_v4());
        let args = self.run_args(&name, &spec);
        debug!(container = %name, ?args, "Starting container");

        let started = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StageError::SandboxUnavailable {
                reason: format!("cannot execute {}: {}", self.binary, e),
            })?;

        let mut guard = ContainerGuard::new(&self.binary, &name);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(read_pipe(stdout));
        let stderr_task = tokio::spawn(read_pipe(stderr));

        let status = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| StageError::SandboxUnavailable {
                reason: format!("waiting for container failed: {e}"),
            })?,
            Err(_) => {
                warn!(container = %name, timeout_secs = spec.timeout.as_secs(), "Container timed out");
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Container client already gone");
                }
                guard.disarm();
                remove_container(&self.binary, &name).await;
                return Err(StageError::Timeout {
                    after: spec.timeout,
                });
            }
        };

        guard.disarm();
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let exit_code = status.code().unwrap_or(-1);
        let duration = started.elapsed();

        if exit_code == RUNTIME_FAILURE_EXIT {
            return Err(StageError::SandboxUnavailable {
                reason: format!("{} could not start the container: {}", self.binary, tail(&stderr, 20)),
            });
        }

        info!(
            container = %name,
            exit_code,
            duration_ms = duration.as_millis() as u64,
            "Container finished"
        );
        Ok(SandboxOutput {
            exit_code,
            stdout,
            stderr,
            duration,
        })
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Last `lines` lines of `text`.
pub fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// `uid:gid` owning `path`.
#[cfg(unix)]
pub fn owner_of(path: &Path) -> Option<String> {
    use std::os::unix::fs::MetadataExt;

    std::fs::metadata(path)
        .ok()
        .map(|meta| format!("{}:{}", meta.uid(), meta.gid()))
}

/// Ownership has no numeric form here; containers keep the image's user.
#[cfg(not(unix))]
pub fn owner_of(_path: &Path) -> Option<String> {
    None
}

async fn remove_container(binary: &str, name: &str) {
    let removal = Command::new(binary)
        .args(["rm", "-f", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    match tokio::time::timeout(REMOVE_GRACE, removal).await {
        Ok(Ok(status)) if status.success() => debug!(container = %name, "Container removed"),
        Ok(Ok(status)) => warn!(container = %name, %status, "Container removal failed"),
        Ok(Err(e)) => warn!(container = %name, error = %e, "Failed to remove container"),
        Err(_) => warn!(container = %name, "Container removal timed out"),
    }
}

/// Force-removes a named container on drop unless disarmed.
///
/// Removal blocks the dropping thread; an abandoned run must not outlive
/// the runtime that started it.
struct ContainerGuard {
    binary: String,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(binary: &str, name: &str) -> Self {
        Self {
            binary: binary.to_string(),
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(container = %self.name, "Removing abandoned container");
        let removed = std::process::Command::new(&self.binary)
            .args(["rm", "-f", &self.name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = removed {
            warn!(container = %self.name, error = %e, "Failed to remove container");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::application::ports::Mount;

    #[test]
    fn run_args_include_mounts_env_and_workdir() {
        let runtime = ContainerRuntime::new("podman");
        let spec = SandboxSpec::new(
            "node:20",
            vec!["npx".into(), "create-react-app".into(), "web".into()],
            Duration::from_secs(60),
        )
        .mount(Mount::read_only("/tmp/src", "/template"))
        .mount(Mount::read_write("/tmp/out", "/result"))
        .env("CI", "true")
        .workdir("/result")
        .user("1000:100");

        let args = runtime.run_args("stencil-x", &spec);

        assert_eq!(
            args,
            vec![
                "run", "--rm", "--name", "stencil-x", "--user", "1000:100", "-v", "/tmp/src:/template:ro", "-v",
                "/tmp/out:/result", "-e", "CI=true", "-w", "/result", "node:20", "npx",
                "create-react-app", "web",
            ]
        );
    }

    #[test]
    fn no_user_flag_unless_requested() {
        let spec = SandboxSpec::new("img", vec![], Duration::from_secs(1));
        let args = ContainerRuntime::default().run_args("stencil-x", &spec);
        assert!(!args.iter().any(|a| a == "--user"));
    }

    #[cfg(unix)]
    #[test]
    fn owner_of_reports_numeric_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let owner = owner_of(dir.path()).unwrap();
        let (uid, gid) = owner.split_once(':').unwrap();
        assert!(uid.parse::<u32>().is_ok());
        assert!(gid.parse::<u32>().is_ok());
        assert_eq!(owner_of(&dir.path().join("absent")), None);
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("only", 5), "only");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let runtime = ContainerRuntime::new("/nonexistent/stencil-docker");
        let err = runtime.ensure_available().await.unwrap_err();
        assert!(matches!(err, StageError::SandboxUnavailable { .. }));
    }

    #[cfg(unix)]
    mod fake_cli {
        use super::*;
        use std::{fs, os::unix::fs::PermissionsExt, path::Path};
        use tempfile::TempDir;

        /// Write an executable script standing in for the docker CLI.
        fn fake_docker(dir: &Path, body: &str) -> String {
            let path = dir.join("docker");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        #[tokio::test]
        async fn captures_output_and_exit_code() {
            let dir = TempDir::new().unwrap();
            let binary = fake_docker(dir.path(), "echo out; echo err >&2; exit 3");

            let output = ContainerRuntime::new(binary)
                .run(SandboxSpec::new("img", vec![], Duration::from_secs(10)))
                .await
                .unwrap();

            assert_eq!(output.exit_code, 3);
            assert!(!output.success());
            assert_eq!(output.stdout.trim(), "out");
            assert_eq!(output.stderr.trim(), "err");
        }

        #[tokio::test]
        async fn runtime_failure_exit_is_unavailable() {
            let dir = TempDir::new().unwrap();
            let binary = fake_docker(dir.path(), "echo 'Cannot connect to the Docker daemon' >&2; exit 125");

            let err = ContainerRuntime::new(binary)
                .run(SandboxSpec::new("img", vec![], Duration::from_secs(10)))
                .await
                .unwrap_err();

            assert!(matches!(err, StageError::SandboxUnavailable { reason } if reason.contains("Docker daemon")));
        }

        /// `rm` is slow on purpose and records its arguments; `run` sleeps.
        fn slow_rm_docker(dir: &Path) -> (String, std::path::PathBuf) {
            let rm_log = dir.join("rm.log");
            let script = format!(
                "if [ \"$1\" = rm ]; then sleep 1; echo \"$@\" >> {log}; exit 0; fi\nexec sleep 30",
                log = rm_log.display()
            );
            (fake_docker(dir, &script), rm_log)
        }

        #[tokio::test]
        async fn timeout_removes_container_before_returning() {
            let dir = TempDir::new().unwrap();
            let (binary, rm_log) = slow_rm_docker(dir.path());

            let started = Instant::now();
            let err = ContainerRuntime::new(binary)
                .run(SandboxSpec::new("img", vec![], Duration::from_millis(300)))
                .await
                .unwrap_err();

            assert!(matches!(err, StageError::Timeout { .. }));
            assert!(started.elapsed() < Duration::from_secs(10));
            let removed = fs::read_to_string(&rm_log).unwrap_or_default();
            assert!(removed.starts_with("rm -f stencil-"), "rm log: {removed:?}");
        }

        #[tokio::test]
        async fn dropped_run_removes_container() {
            let dir = TempDir::new().unwrap();
            let (binary, rm_log) = slow_rm_docker(dir.path());
            let runtime = ContainerRuntime::new(binary);

            let abandoned = tokio::time::timeout(
                Duration::from_millis(300),
                runtime.run(SandboxSpec::new("img", vec![], Duration::from_secs(30))),
            )
            .await;

            assert!(abandoned.is_err());
            let removed = fs::read_to_string(&rm_log).unwrap_or_default();
            assert!(removed.starts_with("rm -f stencil-"), "rm log: {removed:?}");
        }
    }
}
