//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, LogFormat, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "stencil",
    bin_name = "stencil",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Scaffold repositories from templates and publish them",
    long_about = "Stencil fetches a template (local, GitHub or GitLab), renders it \
                  with your parameters and publishes the result as a new \
                  repository on GitHub or GitLab.",
    after_help = "EXAMPLES:\n\
        \x20 stencil new -t file:./templates/service --owner acme --name billing -p name=billing\n\
        \x20 stencil new -t https://github.com/acme/tpl --engine cookiecutter --owner acme --name api\n\
        \x20 stencil schemes\n\
        \x20 stencil completions bash > /usr/share/bash-completion/completions/stencil",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scaffold and publish a new repository.
    #[command(
        visible_alias = "n",
        about = "Scaffold and publish a new repository",
        after_help = "EXAMPLES:\n\
            \x20 stencil new -t file:/srv/templates/lib --owner octo --name mylib -p name=mylib\n\
            \x20 stencil new -t https://gitlab.com/acme/tpl --host gitlab --owner acme --name web --engine cra -p component_id=web\n\
            \x20 stencil new -t file:./tpl --owner octo --name demo --params-file params.json --dry-run"
    )]
    New(NewArgs),

    /// List the registered schemes.
    #[command(
        visible_alias = "ls",
        about = "List registered preparer, templater and publisher schemes",
        after_help = "EXAMPLES:\n\
            \x20 stencil schemes\n\
            \x20 stencil schemes --format json"
    )]
    Schemes(SchemesArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 stencil completions bash > ~/.local/share/bash-completion/completions/stencil\n\
            \x20 stencil completions zsh  > ~/.zfunc/_stencil\n\
            \x20 stencil completions fish > ~/.config/fish/completions/stencil.fish"
    )]
    Completions(CompletionsArgs),

    /// Manage the Stencil configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 stencil config show\n\
            \x20 stencil config path\n\
            \x20 stencil config init"
    )]
    Config(ConfigCommands),
}

// ── new ───────────────────────────────────────────────────────────────────────

/// Arguments for `stencil new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    /// Template location, `<scheme>:<target>` or a GitHub/GitLab URL.
    #[arg(
        short = 't',
        long = "template",
        value_name = "LOCATION",
        help = "Template location (file:<path>, github:<url>, gitlab:<url>, or a bare URL)"
    )]
    pub template: String,

    /// Publisher scheme.
    #[arg(
        long = "host",
        value_name = "SCHEME",
        default_value = "github",
        help = "Where to publish (github, gitlab, ...)"
    )]
    pub host: String,

    /// User, organization or group that will own the repository.
    #[arg(short = 'o', long = "owner", value_name = "OWNER")]
    pub owner: String,

    /// Name of the repository to create.
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub name: String,

    /// Templating engine; the configured default when omitted.
    #[arg(short = 'e', long = "engine", value_name = "ENGINE")]
    pub engine: Option<String>,

    /// Repository visibility; the publisher's default when omitted.
    #[arg(long = "visibility", value_enum, value_name = "VISIBILITY")]
    pub visibility: Option<VisibilityArg>,

    /// Template parameter, repeatable. Values that parse as JSON keep their
    /// type (`port=8080`, `tls=true`); anything else is a string.
    #[arg(
        short = 'p',
        long = "param",
        value_name = "KEY=VALUE",
        help = "Template parameter (repeatable)"
    )]
    pub params: Vec<String>,

    /// JSON object of parameters; `-p` values override it.
    #[arg(long = "params-file", value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Resolve and print the plan without fetching or publishing anything.
    #[arg(long = "dry-run", help = "Show what would run without running it")]
    pub dry_run: bool,
}

/// Repository visibility as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VisibilityArg {
    Public,
    Private,
    Internal,
}

// ── schemes ───────────────────────────────────────────────────────────────────

/// Arguments for `stencil schemes`.
#[derive(Debug, Args)]
pub struct SchemesArgs {
    /// Output format.
    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: SchemesFormat,
}

/// Output format for the `schemes` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemesFormat {
    /// Human-readable table.
    Table,
    /// JSON object keyed by stage.
    Json,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `stencil completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `stencil config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (tokens redacted).
    Show,
    /// Print the path to the configuration file.
    Path,
    /// Write a configuration file with the built-in defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
}

// ── tests ─────────────────────────────────────────────────────────────────────
