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
    gitlab::{CreateProject, GitlabClient},
    http::ApiError,
};

const PUSH_USERNAME: &str = "oauth2";

/// Creates a GitLab project under a user or group namespace and pushes the
/// rendered tree to it.
pub struct GitlabPublisher {
    client: GitlabClient,
    pusher: Arc<dyn ContentPusher>,
    default_visibility: Visibility,
}

impl GitlabPublisher {
    pub fn new(client: GitlabClient, pusher: Arc<dyn ContentPusher>) -> Self {
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
        let namespace = self
            .client
            .namespace(&target.owner)
            .await
            .map_err(|e| creation_error(e, target))?;

        let body = CreateProject {
            name: target.name.clone(),
            path: target.name.clone(),
            namespace_id: namespace.id,
            visibility: visibility.as_str().to_string(),
        };
        let project = self
            .client
            .create_project(&body)
            .await
            .map_err(|e| creation_error(e, target))?;

        let remote_url = project.http_url_to_repo.unwrap_or_else(|| {
            format!("{}/{}.git", self.client.base_url(), project.path_with_namespace)
        });
        info!(project = %project.path_with_namespace, %visibility, "GitLab project created");
        Ok(RemoteRepository {
            host: target.scheme.clone(),
            owner: target.owner.clone(),
            name: target.name.clone(),
            visibility,
            remote_url,
            web_url: project.web_url,
            created_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for GitlabPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitlabPublisher")
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
    } else if err.status() == Some(400) && err.message_contains("has already been taken") {
        StageError::RepoAlreadyExists {
            owner: target.owner.clone(),
            name: target.name.clone(),
        }
    } else if err.is_not_found() {
        StageError::NotFound {
            what: format!("GitLab namespace '{}'", target.owner),
        }
    } else {
        StageError::network(err.to_string())
    }
}

#[async_trait]
impl Publisher for GitlabPublisher {
    #[instrument(skip(self, rendered), fields(target = %target))]
    async fn publish(
        &self,
        rendered: &Path,
        target: &PublishTarget,
    ) -> Result<RemoteRepository, PublishError> {
        let Some(token) = self.client.token() else {
            return Err(PublishError::before_creation(StageError::PermissionDenied {
                reason: "no GitLab token configured".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockContentPusher;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn publisher(server: &MockServer, pusher: MockContentPusher) -> GitlabPublisher {
        let client =
            GitlabClient::new(server.base_url(), Some("glpat".into()), Duration::from_secs(5))
                .unwrap();
        GitlabPublisher::new(client, Arc::new(pusher)).with_default_visibility(Visibility::Internal)
    }

    async fn namespace(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v4/namespaces/acme");
                then.status(200)
                    .json_body(json!({"id": 7, "full_path": "acme", "kind": "group"}));
            })
            .await;
    }

    #[tokio::test]
    async fn creates_project_in_namespace_with_default_visibility() {
        let server = MockServer::start_async().await;
        namespace(&server).await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v4/projects")
                    .header("PRIVATE-TOKEN", "glpat")
                    .json_body(json!({
                        "name": "demo",
                        "path": "demo",
                        "namespace_id": 7,
                        "visibility": "internal"
                    }));
                then.status(201).json_body(json!({
                    "id": 99,
                    "path_with_namespace": "acme/demo",
                    "http_url_to_repo": "https://gitlab.example/acme/demo.git",
                    "web_url": "https://gitlab.example/acme/demo"
                }));
            })
            .await;

        let mut pusher = MockContentPusher::new();
        pusher
            .expect_push()
            .withf(|_, url, creds| {
                url == "https://gitlab.example/acme/demo.git" && creds.username == "oauth2"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let dir = TempDir::new().unwrap();
        let target = PublishTarget::new("gitlab/api", "acme", "demo");
        let repo = publisher(&server, pusher).publish(dir.path(), &target).await.unwrap();

        create.assert_async().await;
        assert_eq!(repo.host, "gitlab/api");
        assert_eq!(repo.visibility, Visibility::Internal);
    }

    #[tokio::test]
    async fn taken_path_is_repo_already_exists() {
        let server = MockServer::start_async().await;
        namespace(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v4/projects");
                then.status(400)
                    .body(r#"{"message":{"path":["has already been taken"]}}"#);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let target = PublishTarget::new("gitlab", "acme", "demo");
        let err = publisher(&server, MockContentPusher::new())
            .publish(dir.path(), &target)
            .await
            .unwrap_err();

        assert!(err.repository.is_none());
        assert!(matches!(err.error, StageError::RepoAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn forbidden_is_permission_denied() {
        let server = MockServer::start_async().await;
        namespace(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v4/projects");
                then.status(403).body(r#"{"message":"403 Forbidden"}"#);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let err = publisher(&server, MockContentPusher::new())
            .publish(dir.path(), &PublishTarget::new("gitlab", "acme", "demo"))
            .await
            .unwrap_err();
        assert!(matches!(err.error, StageError::PermissionDenied { .. }));
    }
}
