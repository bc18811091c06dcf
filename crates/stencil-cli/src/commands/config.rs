//! `stencil config`: inspect and create the configuration file.

use std::{fs, path::Path};

use crate::{
    cli::ConfigCommands,
    config::AppConfig,
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Dispatch to the correct config subcommand.
pub fn execute(
    cmd: ConfigCommands,
    config: AppConfig,
    explicit_path: Option<&Path>,
    output: OutputManager,
) -> CliResult<()> {
    let path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);

    match cmd {
        ConfigCommands::Show => {
            let shown = config.redacted();
            if output.is_json() {
                let value = serde_json::to_value(&shown).map_err(|e| CliError::ConfigError {
                    message: "could not serialize configuration".into(),
                    source: Some(Box::new(e)),
                })?;
                output.json(&value)?;
            } else {
                output.header(&format!("# {}", path.display()))?;
                output.print(&shown.to_toml()?)?;
            }
        }

        ConfigCommands::Path => {
            output.print(&path.display().to_string())?;
        }

        ConfigCommands::Init { force } => {
            init(&path, force)?;
            output.success(&format!("Wrote {}", path.display()))?;
        }
    }

    Ok(())
}

/// Write the built-in defaults to `path`, refusing to clobber unless forced.
fn init(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::config(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_cli_context(|| format!("creating {}", parent.display()))?;
    }
    let text = AppConfig::default().to_toml()?;
    fs::write(path, text).with_cli_context(|| format!("writing {}", path.display()))
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        init(&path, false).unwrap();

        assert_eq!(AppConfig::load(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[github]\n").unwrap();

        assert!(matches!(
            init(&path, false),
            Err(CliError::ConfigError { .. })
        ));
        init(&path, true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("api_url"));
    }
}
