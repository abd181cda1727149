// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # insta
//!
//! Brings a local development stack up and down on Docker and drops you into
//! a shell inside any of its services.
//!
//! ## Commands
//!
//! - `insta` - Start every service (same as `insta up`)
//! - `insta up|run|r [services...]` - Start services
//! - `insta down|d [services...]` - Stop and remove services
//! - `insta connect|c [service] [command...]` - Run a command in a service
//! - `insta services|ls [--all]` - List services
//! - `insta update|u [--url URL]` - Refresh the local topology file
//! - `insta completions <shell>` - Print a shell completion script
//!
//! The topology is `./docker-compose.yaml` when present, otherwise the
//! default bundled into the binary.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use insta_cli::commands::{
    self, CompletionsArgs, ConnectArgs, DownArgs, ServicesArgs, UpArgs, UpdateArgs,
};
use insta_cli::report::report_error;
use insta_cli::workspace::Workspace;
use insta_core::domain::config::InstaConfig;

/// insta - local development services on Docker
#[derive(Parser)]
#[command(name = "insta")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "INSTA_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Topology file to use instead of ./docker-compose.yaml or the bundled default
    #[arg(short = 'f', long, global = true, value_name = "FILE")]
    topology: Option<PathBuf>,

    /// Project name used to namespace containers, networks and volumes
    #[arg(short, long, global = true, value_name = "NAME")]
    project_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "INSTA_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start services (all when none are named)
    #[command(name = "up", visible_aliases = ["run", "r"])]
    Up(UpArgs),

    /// Stop and remove services (all when none are named)
    #[command(name = "down", visible_alias = "d")]
    Down(DownArgs),

    /// Run a command inside a running service
    #[command(name = "connect", visible_alias = "c")]
    Connect(ConnectArgs),

    /// List the project's services
    #[command(name = "services", visible_alias = "ls")]
    Services(ServicesArgs),

    /// Download the latest topology file
    #[command(name = "update", visible_alias = "u")]
    Update(UpdateArgs),

    /// Print a shell completion script
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() {
    // .env must be loaded before clap reads env-backed flags
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{:#}", e);
        std::process::exit(2);
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            trigger.cancel();
        }
    });

    let code = match run(cli, &cancel).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    };
    // Exit directly; a blocking stdin read from `connect` would otherwise
    // hold the runtime open.
    std::process::exit(code);
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<i32> {
    let command = cli.command.unwrap_or(Commands::Up(UpArgs::default()));
    if let Commands::Completions(args) = &command {
        commands::completions::execute(args, &mut Cli::command())?;
        return Ok(0);
    }

    let mut config =
        InstaConfig::load_or_default(cli.config).context("Failed to load configuration")?;
    if let Some(name) = cli.project_name {
        config.project_name = Some(name);
    }
    let topology = cli.topology.as_deref();

    let workspace = match command {
        Commands::Update(args) => {
            commands::update::execute(args, &config, topology).await?;
            return Ok(0);
        }
        _ => Workspace::load(config, topology)?,
    };

    match command {
        Commands::Services(args) => commands::services::execute(args, &workspace)?,
        Commands::Up(args) => {
            let backend = workspace.connect_backend()?;
            commands::up::execute(args, &workspace, backend, cancel).await?
        }
        Commands::Down(args) => {
            let backend = workspace.connect_backend()?;
            commands::down::execute(args, &workspace, backend, cancel).await?
        }
        Commands::Connect(args) => {
            let backend = workspace.connect_backend()?;
            return commands::connect::execute(args, &workspace, backend, cancel).await;
        }
        Commands::Update(_) | Commands::Completions(_) => {}
    }
    Ok(0)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
