//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate never sees it, it only receives the
//! [`OrchestratorSettings`] and the backends built from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables, `STENCIL__<SECTION>__<KEY>` (a `.env` file in
//!    the working directory is loaded first)
//! 3. Config file (`--config`, else the platform config dir)
//! 4. Built-in defaults (always present)

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use stencil_adapters::{
    github::DEFAULT_API_URL,
    gitlab::DEFAULT_BASE_URL,
    http::DEFAULT_TIMEOUT,
    sandbox::DEFAULT_SANDBOX_TIMEOUT,
    templater::{DEFAULT_COOKIECUTTER_IMAGE, DEFAULT_NODE_IMAGE},
};
use stencil_core::{
    application::{DEFAULT_ENGINE, OrchestratorSettings},
    domain::Visibility,
};

use crate::error::{CliError, CliResult};

const ENV_PREFIX: &str = "STENCIL";
const REDACTED: &str = "********";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GithubConfig,
    /// GitLab publishing is only enabled when this section is present.
    pub gitlab: Option<GitlabConfig>,
    pub sandbox: SandboxConfig,
    pub jobs: JobsConfig,
    pub git: GitConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    /// REST API root; a GitHub Enterprise host uses `https://<host>/api/v3`.
    pub api_url: String,
    pub default_visibility: Visibility,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            default_visibility: Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitlabConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub default_visibility: Visibility,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_visibility: Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container CLI (`docker`, `podman`, ...).
    pub runtime: String,
    pub cookiecutter_image: String,
    pub node_image: String,
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".into(),
            cookiecutter_image: DEFAULT_COOKIECUTTER_IMAGE.into(),
            node_image: DEFAULT_NODE_IMAGE.into(),
            timeout_secs: DEFAULT_SANDBOX_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Parent of per-job working directories; system temp dir when unset.
    pub workspace_root: Option<PathBuf>,
    pub default_engine: String,
    pub stage_timeout_secs: Option<u64>,
    pub http_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            default_engine: DEFAULT_ENGINE.into(),
            stage_timeout_secs: None,
            http_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub binary: String,
    pub branch: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: "git".into(),
            branch: "main".into(),
            author_name: "Stencil".into(),
            author_email: "stencil@localhost".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(config_file: Option<&Path>) -> CliResult<Self> {
        match config_file {
            Some(path) => Self::load_from(path, true),
            None => Self::load_from(&Self::config_path(), false),
        }
    }

    /// Like [`load`](Self::load) but an explicit file may be absent too; used
    /// by `stencil config` so `init` can target a new path.
    pub fn load_if_present(config_file: Option<&Path>) -> CliResult<Self> {
        match config_file {
            Some(path) => Self::load_from(path, false),
            None => Self::load(None),
        }
    }

    fn load_from(path: &Path, required: bool) -> CliResult<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| config_error(path, e))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| config_error(path, e))?;
        tracing::debug!(path = %path.display(), gitlab = config.gitlab.is_some(), "Configuration loaded");
        Ok(config)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.stencil.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "stencil", "stencil")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".stencil.toml"))
    }

    /// Copy with every token replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        redact(&mut copy.github.token);
        if let Some(gitlab) = copy.gitlab.as_mut() {
            redact(&mut gitlab.token);
        }
        copy
    }

    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::ConfigError {
            message: "could not serialize configuration".into(),
            source: Some(Box::new(e)),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.jobs.http_timeout_secs)
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox.timeout_secs)
    }

    /// Settings handed to the orchestrator.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            workspace_root: self.jobs.workspace_root.clone(),
            default_engine: self.jobs.default_engine.clone(),
            stage_timeout: self.jobs.stage_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn redact(token: &mut Option<String>) {
    if token.as_deref().is_some_and(|t| !t.is_empty()) {
        *token = Some(REDACTED.into());
    }
}

fn config_error(path: &Path, err: config::ConfigError) -> CliError {
    CliError::ConfigError {
        message: format!("could not load {}: {err}", path.display()),
        source: Some(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_match_adapter_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.github.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.github.default_visibility, Visibility::Private);
        assert!(cfg.gitlab.is_none());
        assert_eq!(cfg.jobs.default_engine, "cookiecutter");
        assert_eq!(cfg.sandbox.timeout_secs, 600);
        assert!(!cfg.output.no_color);
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn absent_file_is_fine_when_not_required() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_if_present(Some(&dir.path().join("new.toml"))).unwrap();
        assert_eq!(cfg.github.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[github]
default_visibility = "public"

[gitlab]
base_url = "https://gitlab.example.com"

[jobs]
default_engine = "simple"
stage_timeout_secs = 120
"#,
        )
        .unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.github.default_visibility, Visibility::Public);
        assert_eq!(cfg.github.api_url, DEFAULT_API_URL);
        let gitlab = cfg.gitlab.as_ref().unwrap();
        assert_eq!(gitlab.base_url, "https://gitlab.example.com");
        assert!(gitlab.token.is_none());

        let settings = cfg.orchestrator_settings();
        assert_eq!(settings.default_engine, "simple");
        assert_eq!(settings.stage_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[github\ntoken = ").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::ConfigError { .. }));
    }

    #[test]
    fn redacted_hides_tokens() {
        let mut cfg = AppConfig::default();
        cfg.github.token = Some("ghp_secret".into());
        cfg.gitlab = Some(GitlabConfig {
            token: Some("glpat-secret".into()),
            ..Default::default()
        });

        let shown = cfg.redacted().to_toml().unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains(REDACTED));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = AppConfig::default().to_toml().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, text).unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn config_path_is_not_empty() {
        let p = AppConfig::config_path();
        assert!(!p.as_os_str().is_empty());
    }
}
