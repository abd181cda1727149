// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `insta down`: stop and remove services (all of them when none are named)

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
pub struct DownArgs {
    /// Services to stop (default: every service)
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,
}

pub async fn execute(
    args: DownArgs,
    workspace: &Workspace,
    backend: Arc<dyn ContainerBackend>,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = LifecycleRequest::down(args.services);

    let report = LifecycleOrchestrator::new(backend)
        .execute(&workspace.project, &request, cancel)
        .await?;

    if report.is_empty() {
        println!("{}", "Nothing running, nothing to stop".dimmed());
    } else {
        super::print_report(&report);
        println!("{}", "✓ Services are down".green());
    }
    Ok(())
}
