//! Initial commit and push of a rendered tree.
//!
//! Provides a wrapper around the `git` CLI with captured stdout/stderr and
//! structured error handling. Credentials reach `git push` as an
//! `http.extraHeader` in its environment; they never appear in its argument
//! list or in `.git/config`.

use std::{fmt, path::Path, process::Stdio};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Url;
use stencil_core::application::StageError;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Username/password pair sent as HTTP basic auth on push.
#[derive(Clone)]
pub struct PushCredentials {
    pub username: String,
    pub password: String,
}

impl PushCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Remove the secret from text that may end up in logs or errors.
    pub fn redact(&self, text: &str) -> String {
        if self.password.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.password, "***")
        }
    }

    /// `Authorization` header value, `None` without a password.
    pub fn basic_auth(&self) -> Option<String> {
        if self.password.is_empty() {
            return None;
        }
        let pair = format!("{}:{}", self.username, self.password);
        Some(format!("Basic {}", STANDARD.encode(pair)))
    }
}

impl fmt::Debug for PushCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Publishes the content of a local directory to an existing remote.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentPusher: Send + Sync {
    /// Initialize git metadata in `dir` if absent, commit everything as the
    /// initial commit and push it to the default branch of `remote_url`.
    async fn push(
        &self,
        dir: &Path,
        remote_url: &str,
        credentials: &PushCredentials,
    ) -> Result<(), StageError>;
}

/// [`ContentPusher`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    branch: String,
    author_name: String,
    author_email: String,
    message: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            binary: "git".into(),
            branch: "main".into(),
            author_name: "Stencil".into(),
            author_email: "stencil@localhost".into(),
            message: "Initial commit".into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<(), GitFailure> {
        self.run_with_env(dir, args, &[]).await
    }

    async fn run_with_env(
        &self,
        dir: &Path,
        args: &[&str],
        env: &[(String, String)],
    ) -> Result<(), GitFailure> {
        let subcommand = args.first().copied().unwrap_or_default().to_string();
        let output = Command::new(&self.binary)
            .current_dir(dir)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_AUTHOR_NAME", &self.author_name)
            .env("GIT_AUTHOR_EMAIL", &self.author_email)
            .env("GIT_COMMITTER_NAME", &self.author_name)
            .env("GIT_COMMITTER_EMAIL", &self.author_email)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GitFailure {
                subcommand: subcommand.clone(),
                message: format!("failed to execute {}: {}", self.binary, e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        Err(GitFailure {
            subcommand,
            message: format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                message
            ),
        })
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentPusher for GitCli {
    #[instrument(skip(self, credentials), fields(dir = %dir.display()))]
    async fn push(
        &self,
        dir: &Path,
        remote_url: &str,
        credentials: &PushCredentials,
    ) -> Result<(), StageError> {
        let local = |failure: GitFailure| StageError::Filesystem {
            path: dir.display().to_string(),
            reason: failure.to_string(),
        };

        if !dir.join(".git").exists() {
            self.run(dir, &["init", "--quiet"]).await.map_err(local)?;
            let head = format!("refs/heads/{}", self.branch);
            self.run(dir, &["symbolic-ref", "HEAD", &head])
                .await
                .map_err(local)?;
            debug!("Initialized git repository");
        }

        self.run(dir, &["add", "--all"]).await.map_err(local)?;

        self.run(
            dir,
            &["commit", "--quiet", "--allow-empty", "-m", &self.message],
        )
        .await
        .map_err(local)?;

        let env = push_environment(remote_url, credentials);
        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        self.run_with_env(dir, &["push", "--quiet", remote_url, &refspec], &env)
            .await
            .map_err(|failure| classify_push_failure(&credentials.redact(&failure.message)))?;

        info!(remote = %remote_url, branch = %self.branch, "Pushed initial commit");
        Ok(())
    }
}

#[derive(Debug)]
struct GitFailure {
    subcommand: String,
    message: String,
}

impl fmt::Display for GitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git {} failed ({})", self.subcommand, self.message)
    }
}

/// Environment that makes `git push` authenticate to an `https://` remote.
///
/// Uses the `GIT_CONFIG_COUNT` protocol (git 2.31+). Other remotes get
/// nothing.
pub fn push_environment(remote_url: &str, credentials: &PushCredentials) -> Vec<(String, String)> {
    let is_https = Url::parse(remote_url).is_ok_and(|url| url.scheme() == "https");
    match credentials.basic_auth() {
        Some(auth) if is_https => vec![
            ("GIT_CONFIG_COUNT".into(), "1".into()),
            ("GIT_CONFIG_KEY_0".into(), "http.extraHeader".into()),
            ("GIT_CONFIG_VALUE_0".into(), format!("Authorization: {auth}")),
        ],
        _ => Vec::new(),
    }
}

const REJECTION_MARKERS: &[&str] = &["rejected", "declined", "protected", "denied", "forbidden"];

/// Map a failed `git push` to the remote's refusal or a transport problem.
fn classify_push_failure(message: &str) -> StageError {
    let lower = message.to_lowercase();
    if REJECTION_MARKERS.iter().any(|m| lower.contains(m)) {
        StageError::PushRejected {
            reason: message.to_string(),
        }
    } else {
        StageError::Network {
            reason: message.to_string(),
        }
    }
}
