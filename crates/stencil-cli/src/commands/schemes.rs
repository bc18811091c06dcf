//! `stencil schemes`: list what each registry can resolve.

use serde_json::json;
use stencil_core::prelude::*;

use crate::{
    bootstrap,
    cli::{SchemesArgs, SchemesFormat},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

pub fn execute(args: SchemesArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let registries = bootstrap::build_registries(&config)?;

    if args.format == SchemesFormat::Json || output.is_json() {
        output.json(&to_json(&registries))?;
        return Ok(());
    }

    for (title, schemes) in rows(&registries) {
        output.header(title)?;
        for scheme in schemes {
            output.print(&format!("  {scheme}"))?;
        }
    }
    if config.gitlab.is_none() {
        output.print("")?;
        output.warning("GitLab publishing is disabled; add a [gitlab] section to enable it")?;
    }
    Ok(())
}

fn rows(registries: &Registries) -> [(&'static str, Vec<String>); 3] {
    [
        ("Preparers", registries.preparers.schemes()),
        ("Templaters", registries.templaters.schemes()),
        ("Publishers", registries.publishers.schemes()),
    ]
}

fn to_json(registries: &Registries) -> serde_json::Value {
    json!({
        "preparers": registries.preparers.schemes(),
        "templaters": registries.templaters.schemes(),
        "publishers": registries.publishers.schemes(),
    })
}
