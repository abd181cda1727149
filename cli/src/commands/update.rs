// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Topology Update Command
//!
//! Implements `insta update`: replaces the local topology override with the
//! latest published one.
//!
//! # Architecture
//!
//! - **Layer:** CLI/Presentation
//! - **Purpose:** Refresh the local topology file
//! - **Integration:** CLI → reqwest download → compose loader validation → file
//!
//! # Usage
//!
//! ```bash
//! # Fetch from the configured URL (INSTA_TOPOLOGY_URL / topology_url)
//! insta update
//!
//! # Fetch from an explicit URL without writing anything
//! insta update --url https://example.com/docker-compose.yaml --dry-run
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use insta_core::domain::config::InstaConfig;
use insta_core::domain::topology::TopologyLoader;
use insta_core::infrastructure::{download_topology, fetch_topology, ComposeTopologyLoader};

use crate::workspace::topology_dir;

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Topology URL (default: topology_url from config)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Download and validate without replacing the local file
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(
    args: UpdateArgs,
    config: &InstaConfig,
    topology: Option<&Path>,
) -> Result<()> {
    let url = args
        .url
        .or_else(|| config.topology_url.clone())
        .ok_or_else(|| {
            anyhow!("No topology URL configured. Pass --url or set INSTA_TOPOLOGY_URL.")
        })?;
    let destination: PathBuf = topology
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.topology_path.clone());
    let working_dir = topology_dir(&destination)?;
    let loader = ComposeTopologyLoader::new();

    println!("Fetching topology from {}...", url.bold());

    let project = if args.dry_run {
        let text = download_topology(&url).await?;
        let project = loader
            .load(&text, &working_dir, config.project_name.as_deref())
            .context("Downloaded topology is invalid")?;
        println!("Skipping write due to --dry-run");
        project
    } else {
        let project = fetch_topology(&url, &destination, &loader, &working_dir).await?;
        println!(
            "{}",
            format!("✓ Topology written to {}", destination.display()).green()
        );
        project
    };

    println!(
        "{} services: {}",
        project.services().len(),
        project.service_names().join(", ")
    );
    Ok(())
}
