//! Full Prepare → Template → Publish runs with the real local adapters and a
//! mocked GitHub API.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;
use stencil_adapters::{
    ContentPusher, FilePreparer, GithubClient, GithubPublisher, PushCredentials, SimpleTemplater,
};
use stencil_core::prelude::*;
use tempfile::TempDir;

/// Snapshots the pushed tree instead of running git.
#[derive(Default)]
struct SnapshotPusher {
    pushed: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

#[async_trait]
impl ContentPusher for SnapshotPusher {
    async fn push(
        &self,
        dir: &Path,
        remote_url: &str,
        _credentials: &PushCredentials,
    ) -> Result<(), StageError> {
        let mut files = Vec::new();
        collect(dir, dir, &mut files);
        files.sort();
        self.pushed
            .lock()
            .unwrap()
            .push((remote_url.to_string(), files));
        Ok(())
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, String)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            out.push((rel, fs::read_to_string(&path).unwrap()));
        }
    }
}

fn template_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        ("template.yaml", "engine: simple\n"),
        ("README.md", "# {{ name }}\n\nOwned by {{ owner }}.\n"),
        ("{{ name }}/main.py", "print('{{ name }}')\n"),
    ];
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

struct Setup {
    server: MockServer,
    pusher: Arc<SnapshotPusher>,
    orchestrator: Orchestrator,
    root: TempDir,
}

async fn setup() -> Setup {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users/acme");
            then.status(200).json_body(json!({"login": "acme", "type": "User"}));
        })
        .await;

    let pusher = Arc::new(SnapshotPusher::default());
    let client =
        GithubClient::new(server.base_url(), Some("ghp_test".into()), Duration::from_secs(5))
            .unwrap();
    let publisher: Arc<dyn Publisher> = Arc::new(GithubPublisher::new(client, pusher.clone()));

    let mut registries = Registries::new();
    registries.preparers.register("file", Arc::new(FilePreparer::new()));
    registries.templaters.register("simple", Arc::new(SimpleTemplater::new()));
    registries
        .publishers
        .register_aliases(&["github", "github/api"], publisher);

    let root = TempDir::new().unwrap();
    let settings = OrchestratorSettings {
        workspace_root: Some(root.path().to_path_buf()),
        ..Default::default()
    };

    Setup {
        server,
        pusher,
        orchestrator: Orchestrator::new(registries, settings),
        root,
    }
}

fn descriptor(template: &Path) -> TemplateDescriptor {
    TemplateDescriptor::builder()
        .location(format!("file:{}", template.display()))
        .engine("simple")
        .target(PublishTarget::new("github", "acme", "demo").with_visibility(Visibility::Private))
        .parameter("name", "demo")
        .parameter("owner", "acme")
        .build()
        .unwrap()
}

fn leftovers(root: &Path) -> Vec<PathBuf> {
    fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[tokio::test]
async fn local_template_is_rendered_and_published() {
    let s = setup().await;
    s.server
        .mock_async(|when, then| {
            when.method(POST).path("/user/repos");
            then.status(201).json_body(json!({
                "full_name": "acme/demo",
                "clone_url": "https://github.com/acme/demo.git",
                "html_url": "https://github.com/acme/demo"
            }));
        })
        .await;
    let template = template_dir();

    let repo = s
        .orchestrator
        .run_scaffold(descriptor(template.path()))
        .await
        .unwrap();

    assert_eq!(repo.owner, "acme");
    assert_eq!(repo.name, "demo");
    assert_eq!(repo.visibility, Visibility::Private);

    let pushed = s.pusher.pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    let (url, files) = &pushed[0];
    assert_eq!(url, "https://github.com/acme/demo.git");
    assert_eq!(
        files,
        &vec![
            ("README.md".to_string(), "# demo\n\nOwned by acme.\n".to_string()),
            ("demo/main.py".to_string(), "print('demo')\n".to_string()),
        ]
    );
    assert!(leftovers(s.root.path()).is_empty());
}

#[tokio::test]
async fn identical_runs_push_identical_trees() {
    let s = setup().await;
    s.server
        .mock_async(|when, then| {
            when.method(POST).path("/user/repos");
            then.status(201).json_body(json!({
                "full_name": "acme/demo",
                "clone_url": "https://github.com/acme/demo.git",
                "html_url": "https://github.com/acme/demo"
            }));
        })
        .await;
    let template = template_dir();

    for _ in 0..2 {
        s.orchestrator
            .run_scaffold(descriptor(template.path()))
            .await
            .unwrap();
    }

    let pushed = s.pusher.pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 2);
    assert_eq!(pushed[0].1, pushed[1].1);
}

#[tokio::test]
async fn existing_repository_fails_publishing() {
    let s = setup().await;
    s.server
        .mock_async(|when, then| {
            when.method(POST).path("/user/repos");
            then.status(422)
                .body(r#"{"message":"Repository creation failed.","errors":[{"message":"name already exists on this account"}]}"#);
        })
        .await;
    let template = template_dir();

    let err = s
        .orchestrator
        .run_scaffold(descriptor(template.path()))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Publishing);
    assert_eq!(err.kind(), ErrorKind::RepoAlreadyExists);
    assert!(err.repository.is_none());
    assert!(s.pusher.pushed.lock().unwrap().is_empty());
    assert!(leftovers(s.root.path()).is_empty());
}

#[tokio::test]
async fn missing_local_template_fails_preparing() {
    let s = setup().await;

    let err = s
        .orchestrator
        .run_scaffold(descriptor(Path::new("/no/such/template")))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Preparing);
    assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    assert!(leftovers(s.root.path()).is_empty());
}

#[tokio::test]
async fn missing_parameter_fails_templating() {
    let s = setup().await;
    let template = template_dir();
    let descriptor = TemplateDescriptor::builder()
        .location(format!("file:{}", template.path().display()))
        .engine("simple")
        .target(PublishTarget::new("github/api", "acme", "demo"))
        .parameter("name", "demo")
        .build()
        .unwrap();

    let err = s.orchestrator.run_scaffold(descriptor).await.unwrap_err();

    assert_eq!(err.stage, Stage::Templating);
    assert_eq!(err.kind(), ErrorKind::RenderError);
    assert!(err.to_string().contains("README.md"));
}
