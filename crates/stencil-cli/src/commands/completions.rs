//! Shell completion generation.

use std::io;

use clap::CommandFactory;
use clap_complete::{Generator, generate, shells};

use crate::cli::{Cli, CompletionsArgs, Shell};

pub fn execute(args: CompletionsArgs) -> crate::error::CliResult<()> {
    match args.shell {
        Shell::Bash => write(shells::Bash, &mut io::stdout()),
        Shell::Zsh => write(shells::Zsh, &mut io::stdout()),
        Shell::Fish => write(shells::Fish, &mut io::stdout()),
        Shell::PowerShell => write(shells::PowerShell, &mut io::stdout()),
        Shell::Elvish => write(shells::Elvish, &mut io::stdout()),
    }
    Ok(())
}

fn write<G: Generator>(shell: G, out: &mut dyn io::Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}
