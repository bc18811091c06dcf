//! Wires configured adapters into the registries the orchestrator runs on.

use std::sync::Arc;

use stencil_adapters::{
    ContainerRuntime, ContentPusher, CookiecutterTemplater, CraTemplater, FilePreparer, GitCli,
    GithubClient, GithubPreparer, GithubPublisher, GitlabClient, GitlabPreparer, GitlabPublisher,
    SimpleTemplater, http::ApiError,
};
use stencil_core::prelude::*;
use tracing::{debug, info};

use crate::{
    config::{AppConfig, GitlabConfig},
    error::{CliError, CliResult},
};

/// Build every backend named by the configuration and bind it.
///
/// GitLab publishers are only bound when a `[gitlab]` section resolved; the
/// GitLab preparer is always available for public projects on the configured
/// (or default) instance.
pub fn build_registries(config: &AppConfig) -> CliResult<Registries> {
    let timeout = config.http_timeout();
    let mut registries = Registries::new();

    let pusher: Arc<dyn ContentPusher> = Arc::new(
        GitCli::new()
            .with_binary(&config.git.binary)
            .with_branch(&config.git.branch)
            .with_author(&config.git.author_name, &config.git.author_email),
    );

    // Preparers
    let github = GithubClient::new(&config.github.api_url, config.github.token.clone(), timeout)
        .map_err(client_error)?;
    let default_gitlab = GitlabConfig::default();
    let gitlab_config = config.gitlab.as_ref().unwrap_or(&default_gitlab);
    let gitlab = GitlabClient::new(&gitlab_config.base_url, gitlab_config.token.clone(), timeout)
        .map_err(client_error)?;

    registries
        .preparers
        .register("file", Arc::new(FilePreparer::new()));
    registries
        .preparers
        .register("github", Arc::new(GithubPreparer::new(github.clone())));
    registries.preparers.register_aliases(
        &["gitlab", "gitlab/api"],
        Arc::new(GitlabPreparer::new(gitlab.clone())),
    );

    // Templaters
    let runtime: Arc<dyn SandboxRuntime> =
        Arc::new(ContainerRuntime::new(&config.sandbox.runtime));
    registries
        .templaters
        .register("simple", Arc::new(SimpleTemplater::new()));
    registries.templaters.register(
        "cookiecutter",
        Arc::new(CookiecutterTemplater::new(
            runtime.clone(),
            &config.sandbox.cookiecutter_image,
            config.sandbox_timeout(),
        )),
    );
    registries.templaters.register(
        "cra",
        Arc::new(CraTemplater::new(
            runtime,
            &config.sandbox.node_image,
            config.sandbox_timeout(),
        )),
    );

    // Publishers
    registries.publishers.register_aliases(
        &["github", "github/api"],
        Arc::new(
            GithubPublisher::new(github, pusher.clone())
                .with_default_visibility(config.github.default_visibility),
        ),
    );
    if let Some(gitlab_config) = &config.gitlab {
        registries.publishers.register_aliases(
            &["gitlab", "gitlab/api"],
            Arc::new(
                GitlabPublisher::new(gitlab, pusher)
                    .with_default_visibility(gitlab_config.default_visibility),
            ),
        );
    } else {
        debug!("No [gitlab] configuration; GitLab publishing disabled");
    }

    info!(
        preparers = registries.preparers.len(),
        templaters = registries.templaters.len(),
        publishers = registries.publishers.len(),
        "Registries built"
    );
    Ok(registries)
}

/// Build the orchestrator for this invocation.
pub fn orchestrator(config: &AppConfig) -> CliResult<Orchestrator> {
    Ok(Orchestrator::new(
        build_registries(config)?,
        config.orchestrator_settings(),
    ))
}

fn client_error(err: ApiError) -> CliError {
    CliError::ConfigError {
        message: format!("could not build HTTP client: {err}"),
        source: Some(Box::new(err)),
    }
}
