// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `insta up`: start services (all of them when none are named)

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use insta_core::application::LifecycleOrchestrator;
use insta_core::domain::backend::ContainerBackend;
use insta_core::domain::lifecycle::LifecycleRequest;

use crate::workspace::Workspace;

#[derive(Args, Debug, Default)]
pub struct UpArgs {
    /// Services to start (default: every service)
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,
}

pub async fn execute(
    args: UpArgs,
    workspace: &Workspace,
    backend: Arc<dyn ContainerBackend>,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = LifecycleRequest::up(args.services);
    let project = &workspace.project;

    if request.targets_all() {
        println!("Starting project {}...", project.name().bold());
    } else {
        println!("Starting {}...", request.targets.join(", ").bold());
    }

    let report = LifecycleOrchestrator::new(backend)
        .execute(project, &request, cancel)
        .await?;

    if report.is_empty() {
        println!("{}", "Nothing to start".dimmed());
    } else {
        super::print_report(&report);
        println!("{}", "✓ Services are up".green());
    }
    Ok(())
}
