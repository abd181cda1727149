// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `insta connect`: run a command inside a running service
//!
//! With no service named, prompts for one of the project's primary services.
//! The command runs through `sh -c` with this terminal's stdio attached, and
//! its exit code becomes the CLI's exit code. A quoted command line such as
//! `insta connect web "cd / && ls"` is handed to the shell unchanged.

use anyhow::{bail, Context, Result};
use clap::Args;
use crossterm::terminal;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use insta_core::application::SessionBridge;
use insta_core::domain::backend::{ContainerBackend, SessionIo};
use insta_core::domain::lifecycle::SessionRequest;

use crate::workspace::Workspace;

#[derive(Args, Debug, Default)]
pub struct ConnectArgs {
    /// Service to connect to (prompted when omitted)
    #[arg(value_name = "SERVICE")]
    pub service: Option<String>,

    /// Command to run (default: exec.default_command, usually `sh`)
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Working directory inside the container
    #[arg(short = 'w', long = "workdir", value_name = "DIR")]
    pub workdir: Option<String>,

    /// Do not allocate a pseudo-TTY
    #[arg(long)]
    pub no_tty: bool,

    /// Extra environment variables
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
}

/// Returns the remote command's exit code
pub async fn execute(
    args: ConnectArgs,
    workspace: &Workspace,
    backend: Arc<dyn ContainerBackend>,
    cancel: &CancellationToken,
) -> Result<i32> {
    let exec = &workspace.config.exec;
    let service = match args.service {
        Some(service) => service,
        None => select_service(workspace)?,
    };
    let command_line = if args.command.is_empty() {
        exec.default_command.clone()
    } else {
        shell_join(&args.command)
    };

    let mut request =
        SessionRequest::new(service, command_line).with_tty(exec.tty && !args.no_tty);
    if let Some(dir) = args.workdir.or_else(|| exec.working_dir.clone()) {
        request = request.with_working_dir(dir);
    }
    for (key, value) in args.env {
        request = request.with_env(key, value);
    }

    let _raw_mode = RawModeGuard::enable(request.options.tty)?;
    let result = SessionBridge::new(backend)
        .attach(&workspace.project, request, SessionIo::inherit(), cancel)
        .await?;

    Ok(i32::try_from(result.exit_code).unwrap_or(1))
}

fn select_service(workspace: &Workspace) -> Result<String> {
    let mut primary = workspace
        .config
        .classifier()
        .primary_services(&workspace.project);

    match primary.len() {
        0 => bail!("Project {} has no primary services", workspace.project.name()),
        1 => return Ok(primary.remove(0)),
        _ => {}
    }
    if !std::io::stdin().is_terminal() {
        bail!("No service given and stdin is not a terminal; name the service to connect to");
    }

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Connect to which service?")
        .items(&primary)
        .default(0)
        .interact()
        .context("Service selection aborted")?;
    Ok(primary.remove(selection))
}

/// Parse `KEY=VALUE`; a bare `KEY` maps to an empty value
pub fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(format!("invalid environment variable '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Keeps the local terminal in raw mode while a TTY session is attached, so
/// keystrokes (Ctrl-C included) reach the remote pty untouched. Restored on
/// drop.
struct RawModeGuard;

impl RawModeGuard {
    fn enable(tty: bool) -> Result<Option<Self>> {
        if !wants_raw_mode(tty, std::io::stdin().is_terminal()) {
            return Ok(None);
        }
        terminal::enable_raw_mode().context("Failed to switch the terminal to raw mode")?;
        Ok(Some(Self))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

fn wants_raw_mode(tty: bool, stdin_is_terminal: bool) -> bool {
    tty && stdin_is_terminal
}

/// Build the `sh -c` line. A single word is already a command line and is
/// passed through as is; several argv words are quoted where the shell
/// would split them.
pub fn shell_join(words: &[String]) -> String {
    if let [line] = words {
        return line.clone();
    }
    words
        .iter()
        .map(|word| {
            let plain = !word.is_empty()
                && word
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
            if plain {
                word.clone()
            } else {
                format!("'{}'", word.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
