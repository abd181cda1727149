// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `insta completions <shell>`: print a shell completion script

use anyhow::{Context, Result};
use clap::{Args, Command};
use clap_complete::Shell;
use std::io::Write;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn execute(args: &CompletionsArgs, command: &mut Command) -> Result<()> {
    let script = render(args.shell, command);
    std::io::stdout()
        .write_all(&script)
        .context("Failed to write completion script")
}

fn render(shell: Shell, command: &mut Command) -> Vec<u8> {
    let name = command.get_name().to_string();
    let mut script = Vec::new();
    clap_complete::generate(shell, command, name, &mut script);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Command {
        Command::new("insta")
            .subcommand(Command::new("up"))
            .subcommand(Command::new("connect"))
    }

    #[test]
    fn test_bash_script_covers_subcommands() {
        let script = String::from_utf8(render(Shell::Bash, &mut sample())).unwrap();

        assert!(script.contains("_insta()"));
        assert!(script.contains("connect"));
    }

    #[test]
    fn test_zsh_script_is_registered_for_binary() {
        let script = String::from_utf8(render(Shell::Zsh, &mut sample())).unwrap();

        assert!(script.starts_with("#compdef insta"));
    }
}
