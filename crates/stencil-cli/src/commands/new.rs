//! Implementation of the `stencil new` command.
//!
//! Responsibility: translate CLI arguments into a `TemplateDescriptor`,
//! submit it to the orchestrator, and display results. No business logic
//! lives here.

use std::{fs, path::Path};

use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

use stencil_core::{application::JobPlan, prelude::*};

use crate::{
    bootstrap,
    cli::{NewArgs, VisibilityArg},
    config::AppConfig,
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Execute the `stencil new` command.
///
/// Dispatch sequence:
/// 1. Build and validate the descriptor from flags and parameter sources
/// 2. Build the registries from configuration
/// 3. Early-exit with the resolved plan if `--dry-run`
/// 4. Submit the job and follow its state until it finishes
/// 5. Print the published repository
#[instrument(skip_all, fields(owner = %args.owner, name = %args.name, host = %args.host))]
pub fn execute(args: NewArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let descriptor = build_descriptor(&args)?;
    debug!(
        location = %descriptor.location(),
        engine = descriptor.engine().unwrap_or("default"),
        parameters = descriptor.parameters().len(),
        "Descriptor built"
    );

    let orchestrator = bootstrap::orchestrator(&config)?;

    if args.dry_run {
        let plan = orchestrator.plan(&descriptor)?;
        return show_plan(&descriptor, &plan, &output);
    }

    let runtime = Runtime::new().with_cli_context(|| "starting the async runtime")?;
    let repository = runtime.block_on(run_job(&orchestrator, descriptor, &output))?;

    show_repository(&repository, &output)
}

// ── Descriptor ────────────────────────────────────────────────────────────────

fn build_descriptor(args: &NewArgs) -> CliResult<TemplateDescriptor> {
    let mut target = PublishTarget::new(&args.host, &args.owner, &args.name);
    if let Some(visibility) = args.visibility {
        target = target.with_visibility(visibility.into());
    }

    let mut builder = TemplateDescriptor::builder()
        .location(normalize_location(&args.template)?)
        .target(target)
        .parameters(collect_parameters(args.params_file.as_deref(), &args.params)?);
    if let Some(engine) = &args.engine {
        builder = builder.engine(engine);
    }
    Ok(builder.build()?)
}

impl From<VisibilityArg> for Visibility {
    fn from(arg: VisibilityArg) -> Self {
        match arg {
            VisibilityArg::Public => Visibility::Public,
            VisibilityArg::Private => Visibility::Private,
            VisibilityArg::Internal => Visibility::Internal,
        }
    }
}

/// Accept bare host URLs and plain paths in addition to `<scheme>:<target>`.
///
/// `https://github.com/...` becomes `github:https://github.com/...`, a URL on
/// a host whose name contains `gitlab` becomes `gitlab:...`, and a string
/// without any `:` is a local path.
pub fn normalize_location(raw: &str) -> CliResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::invalid_input("template location is empty"));
    }

    let Some(rest) = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
    else {
        if raw.contains(':') {
            return Ok(raw.to_string());
        }
        return Ok(format!("file:{raw}"));
    };

    let host = rest.split('/').next().unwrap_or_default().to_ascii_lowercase();
    let scheme = if host == "github.com" || host.contains("github") {
        "github"
    } else if host.contains("gitlab") {
        "gitlab"
    } else {
        return Err(CliError::InvalidInput {
            message: format!(
                "cannot tell which host '{host}' is; prefix the URL with a scheme, e.g. gitlab:{raw}"
            ),
            source: None,
        });
    };
    Ok(format!("{scheme}:{raw}"))
}

// ── Parameters ────────────────────────────────────────────────────────────────

/// Merge the parameters file (if any) with `-p` pairs; pairs win.
fn collect_parameters(file: Option<&Path>, pairs: &[String]) -> CliResult<Parameters> {
    let mut parameters = match file {
        Some(path) => read_parameters_file(path)?,
        None => Parameters::new(),
    };
    for raw in pairs {
        let (key, value) = parse_param(raw)?;
        parameters.insert(key, value);
    }
    Ok(parameters)
}

fn read_parameters_file(path: &Path) -> CliResult<Parameters> {
    let text = fs::read_to_string(path)
        .with_cli_context(|| format!("reading parameters file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| CliError::InvalidParameter {
        raw: path.display().to_string(),
        reason: format!("not valid JSON: {e}"),
    })?;
    let Value::Object(map) = value else {
        return Err(CliError::InvalidParameter {
            raw: path.display().to_string(),
            reason: "expected a JSON object".into(),
        });
    };

    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok((key, value)),
            _ => Err(CliError::InvalidParameter {
                raw: key,
                reason: "values must be strings, numbers or booleans".into(),
            }),
        })
        .collect()
}

/// Parse one `key=value` pair.
///
/// The value keeps its JSON type when it is a number, boolean or quoted
/// string; anything else is taken verbatim as a string.
pub fn parse_param(raw: &str) -> CliResult<(String, Value)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| CliError::InvalidParameter {
        raw: raw.to_string(),
        reason: "expected KEY=VALUE".into(),
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidParameter {
            raw: raw.to_string(),
            reason: "key is empty".into(),
        });
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(parsed @ (Value::Number(_) | Value::Bool(_) | Value::String(_))) => parsed,
        _ => Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

// ── Running ───────────────────────────────────────────────────────────────────

/// Submit the job, mirror its state on the spinner, and cancel it on Ctrl-C.
async fn run_job(
    orchestrator: &Orchestrator,
    descriptor: TemplateDescriptor,
    output: &OutputManager,
) -> CliResult<RemoteRepository> {
    let target = descriptor.target().to_string();
    let handle = orchestrator.submit(descriptor);
    info!(job_id = %handle.id(), %target, "Job submitted");

    let spinner = output.spinner("Starting");
    let mut states = handle.subscribe();
    let watcher = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                debug!(%state, "Job state changed");
                if let (Some(bar), Some(stage)) = (&spinner, state.active_stage()) {
                    bar.set_message(stage_message(stage));
                }
                if state.is_terminal() {
                    break;
                }
            }
        })
    };

    let cancellation = handle.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling job");
            cancellation.cancel();
        }
    });

    let result = handle.wait().await;
    interrupt.abort();
    watcher.abort();
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    result.map_err(|err| match err.kind() {
        ErrorKind::Cancelled => CliError::Cancelled,
        _ => err.into(),
    })
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Preparing => "Fetching template",
        Stage::Templating => "Rendering",
        Stage::Publishing => "Publishing",
    }
}

// ── Display ───────────────────────────────────────────────────────────────────

fn show_plan(descriptor: &TemplateDescriptor, plan: &JobPlan, output: &OutputManager) -> CliResult<()> {
    if output.is_json() {
        output.json(&json!({
            "dry_run": true,
            "location": descriptor.location().to_string(),
            "target": descriptor.target(),
            "parameters": descriptor.parameters(),
            "plan": {
                "preparer": plan.preparer,
                "templater": plan.templater,
                "publisher": plan.publisher,
            },
        }))?;
        return Ok(());
    }

    output.info(&format!("Dry run: would publish {}", descriptor.target()))?;
    output.field("preparer", &plan.preparer)?;
    output.field("templater", &plan.templater)?;
    output.field("publisher", &plan.publisher)?;
    output.field("location", &descriptor.location().to_string())?;
    for (key, value) in descriptor.parameters() {
        output.field(&format!("-p {key}"), &value.to_string())?;
    }
    Ok(())
}

fn show_repository(repository: &RemoteRepository, output: &OutputManager) -> CliResult<()> {
    if output.is_json() {
        output.json(&json!({ "repository": repository }))?;
        return Ok(());
    }

    output.success(&format!("Published {}", repository.full_name()))?;
    output.field("host", &repository.host)?;
    output.field("visibility", repository.visibility.as_str())?;
    output.field("clone", &repository.remote_url)?;
    if let Some(web) = &repository.web_url {
        output.field("web", web)?;
    }
    Ok(())
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(template: &str, params: &[&str]) -> NewArgs {
        NewArgs {
            template: template.into(),
            host: "github".into(),
            owner: "acme".into(),
            name: "demo".into(),
            engine: None,
            visibility: None,
            params: params.iter().map(|s| s.to_string()).collect(),
            params_file: None,
            dry_run: false,
        }
    }

    #[test]
    fn bare_github_url_gets_scheme() {
        assert_eq!(
            normalize_location("https://github.com/acme/tpl/tree/main/x").unwrap(),
            "github:https://github.com/acme/tpl/tree/main/x"
        );
    }

    #[test]
    fn bare_gitlab_url_gets_scheme() {
        assert_eq!(
            normalize_location("https://gitlab.example.com/g/p").unwrap(),
            "gitlab:https://gitlab.example.com/g/p"
        );
    }

    #[test]
    fn unknown_host_url_is_rejected() {
        let err = normalize_location("https://example.com/repo").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn explicit_scheme_and_plain_paths() {
        assert_eq!(normalize_location("file:/tmp/tpl").unwrap(), "file:/tmp/tpl");
        assert_eq!(
            normalize_location("gitlab/api:https://gitlab.com/g/p").unwrap(),
            "gitlab/api:https://gitlab.com/g/p"
        );
        assert_eq!(normalize_location("./templates/x").unwrap(), "file:./templates/x");
    }

    #[test]
    fn params_keep_json_scalar_types() {
        assert_eq!(parse_param("port=8080").unwrap(), ("port".into(), json!(8080)));
        assert_eq!(parse_param("tls=true").unwrap(), ("tls".into(), json!(true)));
        assert_eq!(parse_param("name=demo").unwrap(), ("name".into(), json!("demo")));
        assert_eq!(parse_param("expr=a=b").unwrap(), ("expr".into(), json!("a=b")));
        assert_eq!(parse_param("list=[1,2]").unwrap(), ("list".into(), json!("[1,2]")));
        assert_eq!(parse_param("empty=").unwrap(), ("empty".into(), json!("")));
    }

    #[test]
    fn malformed_params_are_rejected() {
        assert!(matches!(
            parse_param("novalue"),
            Err(CliError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse_param("=x"),
            Err(CliError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn pairs_override_parameters_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{"name": "from-file", "port": 80}"#).unwrap();

        let params = collect_parameters(Some(&path), &["name=from-flag".into()]).unwrap();
        assert_eq!(params["name"], json!("from-flag"));
        assert_eq!(params["port"], json!(80));
    }

    #[test]
    fn parameters_file_must_hold_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{"nested": {"a": 1}}"#).unwrap();
        assert!(matches!(
            collect_parameters(Some(&path), &[]),
            Err(CliError::InvalidParameter { .. })
        ));

        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            collect_parameters(Some(&path), &[]),
            Err(CliError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn descriptor_carries_flags() {
        let mut a = args("file:/tmp/tpl", &["name=demo"]);
        a.engine = Some("simple".into());
        a.visibility = Some(VisibilityArg::Public);

        let descriptor = build_descriptor(&a).unwrap();
        assert_eq!(descriptor.location().scheme(), "file");
        assert_eq!(descriptor.engine(), Some("simple"));
        assert_eq!(descriptor.target().visibility, Some(Visibility::Public));
        assert_eq!(descriptor.parameters()["name"], json!("demo"));
    }
}
