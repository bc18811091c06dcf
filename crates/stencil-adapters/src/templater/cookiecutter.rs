use std::{fs as stdfs, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{Map, Value};
use stencil_core::{
    application::{
        StageError,
        ports::{Mount, SandboxRuntime, SandboxSpec, Templater},
    },
    domain::Parameters,
};
use tracing::{info, instrument, warn};

use crate::{
    fs,
    sandbox::{owner_of, tail},
};

pub const DEFAULT_COOKIECUTTER_IMAGE: &str = "stencil/cookiecutter:latest";

const CONTEXT_FILE: &str = "cookiecutter.json";
const TEMPLATE_MOUNT: &str = "/template";
const RESULT_MOUNT: &str = "/result";
/// Writable home for an arbitrary uid inside the image.
const SCRATCH_HOME: &str = "/tmp";

/// Renders cookiecutter templates inside the sandbox.
pub struct CookiecutterTemplater {
    runtime: Arc<dyn SandboxRuntime>,
    image: String,
    timeout: Duration,
}

impl CookiecutterTemplater {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, image: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runtime,
            image: image.into(),
            timeout,
        }
    }

    /// Runs as the owner of `destination` so the generated files stay
    /// movable by the host user.
    fn spec(&self, staged: &Path, destination: &Path) -> SandboxSpec {
        let spec = SandboxSpec::new(
            self.image.clone(),
            ["cookiecutter", "--no-input", "-o", RESULT_MOUNT, TEMPLATE_MOUNT]
                .map(String::from)
                .to_vec(),
            self.timeout,
        )
        .mount(Mount::read_only(staged, TEMPLATE_MOUNT))
        .mount(Mount::read_write(destination, RESULT_MOUNT))
        .env("HOME", SCRATCH_HOME);
        match owner_of(destination) {
            Some(user) => spec.user(user),
            None => spec,
        }
    }
}

impl std::fmt::Debug for CookiecutterTemplater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookiecutterTemplater")
            .field("image", &self.image)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Overlay `parameters` on the template's own `cookiecutter.json` in `dir`.
pub fn merge_context(dir: &Path, parameters: &Parameters) -> Result<(), StageError> {
    let path = dir.join(CONTEXT_FILE);
    let mut context = if path.is_file() {
        let raw = stdfs::read_to_string(&path).map_err(|e| StageError::io(&path, e))?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(StageError::render(format!(
                    "{CONTEXT_FILE} must contain a JSON object"
                )));
            }
            Err(e) => return Err(StageError::render(format!("{CONTEXT_FILE}: {e}"))),
        }
    } else {
        Map::new()
    };

    for (key, value) in parameters {
        context.insert(key.clone(), value.clone());
    }

    let rendered = serde_json::to_string_pretty(&Value::Object(context))
        .map_err(|e| StageError::render(format!("{CONTEXT_FILE}: {e}")))?;
    stdfs::write(&path, rendered).map_err(|e| StageError::io(&path, e))
}

#[async_trait]
impl Templater for CookiecutterTemplater {
    #[instrument(skip(self, parameters), fields(image = %self.image))]
    async fn template(
        &self,
        source: &Path,
        parameters: &Parameters,
        destination: &Path,
    ) -> Result<(), StageError> {
        self.runtime.ensure_available().await?;

        // The source stays untouched; the merged context goes into a copy.
        let parent = destination.parent().unwrap_or(destination).to_path_buf();
        let src = source.to_path_buf();
        let params = parameters.clone();
        let staged = fs::blocking(move || {
            let staged = tempfile::Builder::new()
                .prefix("cookiecutter-")
                .tempdir_in(&parent)
                .map_err(|e| StageError::io(&parent, e))?;
            fs::copy_tree(&src, staged.path())?;
            merge_context(staged.path(), &params)?;
            Ok(staged)
        })
        .await?;

        let output = self
            .runtime
            .run(self.spec(staged.path(), destination))
            .await?;
        drop(staged);

        if !output.success() {
            warn!(exit_code = output.exit_code, "cookiecutter failed");
            return Err(StageError::render(format!(
                "cookiecutter exited with {}: {}",
                output.exit_code,
                tail(&output.stderr, 20)
            )));
        }

        let dir = destination.to_path_buf();
        let hoisted = fs::blocking(move || fs::hoist_single_dir(&dir)).await?;
        info!(hoisted, duration_ms = output.duration.as_millis() as u64, "cookiecutter rendered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stencil_core::application::ports::SandboxOutput;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records the spec and simulates cookiecutter writing one project dir.
    #[derive(Default)]
    struct FakeSandbox {
        seen: Mutex<Option<(SandboxSpec, Value)>>,
        exit_code: i32,
    }

    #[async_trait]
    impl SandboxRuntime for FakeSandbox {
        async fn ensure_available(&self) -> Result<(), StageError> {
            Ok(())
        }

        async fn run(&self, spec: SandboxSpec) -> Result<SandboxOutput, StageError> {
            let template = &spec.mounts[0].host;
            let context: Value =
                serde_json::from_str(&stdfs::read_to_string(template.join(CONTEXT_FILE)).unwrap())
                    .unwrap();
            let result = &spec.mounts[1].host;
            fs::write_relative(result, "demo/setup.py", b"name='demo'").unwrap();
            *self.seen.lock().unwrap() = Some((spec.clone(), context));
            Ok(SandboxOutput {
                exit_code: self.exit_code,
                stdout: String::new(),
                stderr: "line1\nboom".into(),
                duration: Duration::from_millis(5),
            })
        }
    }

    fn layout() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let work = TempDir::new().unwrap();
        let source = work.path().join("template");
        let output = work.path().join("output");
        stdfs::create_dir_all(&output).unwrap();
        fs::write_relative(
            &source,
            CONTEXT_FILE,
            br#"{"project_name": "x", "license": "MIT"}"#,
        )
        .unwrap();
        (work, source, output)
    }

    #[tokio::test]
    async fn runs_cookiecutter_with_merged_context_and_hoists() {
        let (_work, source, output) = layout();
        let sandbox = Arc::new(FakeSandbox::default());
        let templater = CookiecutterTemplater::new(sandbox.clone(), "cc:1", Duration::from_secs(60));

        let mut params = Parameters::new();
        params.insert("project_name".into(), json!("demo"));
        templater.template(&source, &params, &output).await.unwrap();

        let (spec, context) = sandbox.seen.lock().unwrap().clone().unwrap();
        assert_eq!(spec.image, "cc:1");
        assert_eq!(
            spec.command,
            vec!["cookiecutter", "--no-input", "-o", "/result", "/template"]
        );
        assert!(spec.mounts[0].read_only);
        assert_eq!(spec.mounts[1].host, output);
        assert_eq!(spec.user, owner_of(&output));
        #[cfg(unix)]
        assert!(spec.user.is_some());
        assert_eq!(spec.env.get("HOME").map(String::as_str), Some("/tmp"));
        assert_eq!(context, json!({"project_name": "demo", "license": "MIT"}));

        // Source untouched, result hoisted.
        let original = stdfs::read_to_string(source.join(CONTEXT_FILE)).unwrap();
        assert!(original.contains("\"x\""));
        assert!(output.join("setup.py").is_file());
    }

    #[tokio::test]
    async fn non_zero_exit_is_render_error() {
        let (_work, source, output) = layout();
        let sandbox = Arc::new(FakeSandbox {
            exit_code: 1,
            ..Default::default()
        });
        let templater = CookiecutterTemplater::new(sandbox, "cc:1", Duration::from_secs(60));

        let err = templater
            .template(&source, &Parameters::new(), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Render { reason } if reason.contains("boom")));
    }

    #[test]
    fn merge_creates_missing_context() {
        let dir = TempDir::new().unwrap();
        let mut params = Parameters::new();
        params.insert("name".into(), json!("demo"));

        merge_context(dir.path(), &params).unwrap();

        let context: Value =
            serde_json::from_str(&stdfs::read_to_string(dir.path().join(CONTEXT_FILE)).unwrap())
                .unwrap();
        assert_eq!(context, json!({"name": "demo"}));
    }
}
