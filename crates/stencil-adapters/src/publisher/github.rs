use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use stencil_core::{
    application::{PublishError, StageError, ports::Publisher},
    domain::{PublishTarget, RemoteRepository, Visibility},
};
use tracing::{info, instrument, warn};

use crate::{
    git::{ContentPusher, PushCredentials},
    github::{CreateRepository, GithubClient},
    http::ApiError,
};

const PUSH_USERNAME: &str = "x-access-token";

/// Creates a GitHub repository and pushes the rendered tree to it.
pub struct GithubPublisher {
    client: GithubClient,
    pusher: Arc<dyn ContentPusher>,
    default_visibility: Visibility,
}

impl GithubPublisher {
    pub fn new(client: GithubClient, pusher: Arc<dyn ContentPusher>) -> Self {
        Self {
            client,
            pusher,
            default_visibility: Visibility::default(),
        }
    }

    pub fn with_default_visibility(mut self, visibility: Visibility) -> Self {
        self.default_visibility = visibility;
        self
    }

    async fn create(
        &self,
        target: &PublishTarget,
        visibility: Visibility,
    ) -> Result<RemoteRepository, StageError> {
        let account = self
            .client
            .account(&target.owner)
            .await
            .map_err(|e| creation_error(e, target))?;
        let org = account.is_organization().then_some(target.owner.as_str());

        let body = CreateRepository {
            name: target.name.clone(),
            private: visibility != Visibility::Public,
            visibility: visibility.as_str().to_string(),
            auto_init: false,
        };
        let created = self
            .client
            .create_repository(org, &body)
            .await
            .map_err(|e| creation_error(e, target))?;

        info!(repository = %created.full_name, %visibility, "GitHub repository created");
        Ok(RemoteRepository {
            host: target.scheme.clone(),
            owner: target.owner.clone(),
            name: target.name.clone(),
            visibility,
            remote_url: created.clone_url,
            web_url: Some(created.html_url),
            created_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for GithubPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubPublisher")
            .field("client", &self.client)
            .field("default_visibility", &self.default_visibility)
            .finish()
    }
}

fn creation_error(err: ApiError, target: &PublishTarget) -> StageError {
    if err.is_auth() {
        StageError::PermissionDenied {
            reason: err.to_string(),
        }
    } else if err.status() == Some(422) && err.message_contains("already exists") {
        StageError::RepoAlreadyExists {
            owner: target.owner.clone(),
            name: target.name.clone(),
        }
    } else if err.is_not_found() {
        StageError::NotFound {
            what: format!("GitHub account '{}'", target.owner),
        }
    } else {
        StageError::network(err.to_string())
    }
}

#[async_trait]
impl Publisher for GithubPublisher {
    #[instrument(skip(self, rendered), fields(target = %target))]
    async fn publish(
        &self,
        rendered: &Path,
        target: &PublishTarget,
    ) -> Result<RemoteRepository, PublishError> {
        let Some(token) = self.client.token() else {
            return Err(PublishError::before_creation(StageError::PermissionDenied {
                reason: "no GitHub token configured".into(),
            }));
        };
        let credentials = PushCredentials::new(PUSH_USERNAME, token);
        let visibility = target.visibility.unwrap_or(self.default_visibility);

        let repository = self
            .create(target, visibility)
            .await
            .map_err(PublishError::before_creation)?;

        if let Err(error) = self
            .pusher
            .push(rendered, &repository.remote_url, &credentials)
            .await
        {
            warn!(repository = %repository.full_name(), error = %error, "Push failed after creation");
            return Err(PublishError::after_creation(error, repository));
        }

        Ok(repository)
    }
}
