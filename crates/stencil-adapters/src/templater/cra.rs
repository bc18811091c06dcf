use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
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

pub const DEFAULT_NODE_IMAGE: &str = "node:20-alpine";

const RESULT_MOUNT: &str = "/result";
const SCRATCH_HOME: &str = "/tmp";

/// Generates a React application with create-react-app inside the sandbox.
///
/// Parameters: `component_id` (required, the app name) and
/// `use_typescript` (boolean, default `true`).
pub struct CraTemplater {
    runtime: Arc<dyn SandboxRuntime>,
    image: String,
    timeout: Duration,
}

impl CraTemplater {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, image: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runtime,
            image: image.into(),
            timeout,
        }
    }

    /// `npx create-react-app ...` for `parameters`.
    pub fn command(parameters: &Parameters) -> Result<Vec<String>, StageError> {
        let component_id = match parameters.get("component_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(_) => {
                return Err(StageError::render(
                    "parameter 'component_id' must be a non-empty string",
                ));
            }
            None => return Err(StageError::render("parameter 'component_id' is required")),
        };
        let typescript = match parameters.get("use_typescript") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => !matches!(s.to_ascii_lowercase().as_str(), "false" | "no" | "0"),
            Some(_) => {
                return Err(StageError::render("parameter 'use_typescript' must be a boolean"));
            }
        };

        let mut command = vec![
            "npx".to_string(),
            "--yes".to_string(),
            "create-react-app".to_string(),
            component_id,
        ];
        if typescript {
            command.push("--template".into());
            command.push("typescript".into());
        }
        Ok(command)
    }
}

impl CraTemplater {
    /// Sandbox run for `command`, as the owner of `destination`.
    fn spec(&self, command: Vec<String>, destination: &Path) -> SandboxSpec {
        let spec = SandboxSpec::new(self.image.clone(), command, self.timeout)
            .mount(Mount::read_write(destination, RESULT_MOUNT))
            .env("CI", "true")
            .env("HOME", SCRATCH_HOME)
            .workdir(RESULT_MOUNT);
        match owner_of(destination) {
            Some(user) => spec.user(user),
            None => spec,
        }
    }
}

impl std::fmt::Debug for CraTemplater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CraTemplater")
            .field("image", &self.image)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Templater for CraTemplater {
    #[instrument(skip(self, _source, parameters), fields(image = %self.image))]
    async fn template(
        &self,
        _source: &Path,
        parameters: &Parameters,
        destination: &Path,
    ) -> Result<(), StageError> {
        let command = Self::command(parameters)?;
        self.runtime.ensure_available().await?;

        let output = self.runtime.run(self.spec(command, destination)).await?;

        if !output.success() {
            warn!(exit_code = output.exit_code, "create-react-app failed");
            return Err(StageError::render(format!(
                "create-react-app exited with {}: {}",
                output.exit_code,
                tail(&output.stderr, 20)
            )));
        }

        let dir = destination.to_path_buf();
        let hoisted = fs::blocking(move || fs::hoist_single_dir(&dir)).await?;
        info!(hoisted, duration_ms = output.duration.as_millis() as u64, "React app generated");
        Ok(())
    }
}
