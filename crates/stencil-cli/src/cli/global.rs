//! Flags accepted by every subcommand, flattened into [`super::Cli`].

use std::path::PathBuf;

use clap::{ArgAction, Args, ValueEnum};

const OUTPUT: &str = "Output";
const LOGGING: &str = "Logging";

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// More log detail on stderr: `-v` stage progress, `-vv` HTTP calls and
    /// file counts, `-vvv` everything.
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help_heading = LOGGING
    )]
    pub verbose: u8,

    /// Only print errors.
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help_heading = OUTPUT
    )]
    pub quiet: bool,

    /// No ANSI colours (also set by `NO_COLOR`).
    #[arg(long, global = true, env = "NO_COLOR", help_heading = OUTPUT)]
    pub no_color: bool,

    /// Read configuration from FILE instead of the platform config dir.
    #[arg(short, long, global = true, value_name = "FILE", env = "STENCIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// How results are printed on stdout.
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Auto,
        help_heading = OUTPUT
    )]
    pub output_format: OutputFormat,

    /// How log events are written on stderr.
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        help_heading = LOGGING
    )]
    pub log_format: LogFormat,

    /// Also append plain-text logs to FILE.
    #[arg(long, global = true, value_name = "FILE", help_heading = LOGGING)]
    pub log_file: Option<PathBuf>,
}

/// Result rendering on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `human` on a terminal, `plain` otherwise.
    #[default]
    Auto,
    /// Coloured, with a progress spinner.
    Human,
    /// No colours, no spinner.
    Plain,
    /// One JSON document per invocation.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}
