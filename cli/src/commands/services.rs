// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `insta services`: list the services a developer would connect to

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use insta_core::domain::classification::ServiceRole;

use crate::workspace::Workspace;

#[derive(Args, Debug, Default)]
pub struct ServicesArgs {
    /// Include auxiliary services (data, init, and server containers)
    #[arg(short, long)]
    pub all: bool,
}

pub fn execute(args: ServicesArgs, workspace: &Workspace) -> Result<()> {
    let classified = workspace.config.classifier().classify(&workspace.project);

    println!(
        "{} ({})",
        workspace.project.name().bold(),
        workspace.source.to_string().dimmed()
    );
    for service in classified
        .iter()
        .filter(|s| args.all || s.role == ServiceRole::Primary)
    {
        let image = workspace
            .project
            .service(&service.name)
            .map(|s| s.image.as_str())
            .unwrap_or_default();
        if args.all {
            let role = match service.role {
                ServiceRole::Primary => service.role.to_string().green(),
                ServiceRole::Auxiliary => service.role.to_string().dimmed(),
            };
            println!("  {:<20} {:<10} {}", service.name, role, image.dimmed());
        } else {
            println!("  {:<20} {}", service.name, image.dimmed());
        }
    }
    Ok(())
}
