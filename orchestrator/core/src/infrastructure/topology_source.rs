// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology sources
//!
//! Where the topology text comes from: the default bundled into the binary,
//! a local override file, or a remote URL. Remote topologies are validated
//! before they replace the local override so a bad download never leaves a
//! broken file behind.

use crate::domain::project::Project;
use crate::domain::topology::{TopologyError, TopologyLoader};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TopologySourceError {
    #[error("failed to fetch topology from {url}: {error}")]
    Fetch { url: String, error: String },

    #[error("failed to write topology to {path}: {error}")]
    Write { path: String, error: String },

    #[error("fetched topology is invalid: {0}")]
    Invalid(#[from] TopologyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologySource {
    /// Default bundled into the binary
    Embedded(&'static str),
    File(PathBuf),
}

impl TopologySource {
    /// Prefer the local override when it exists, otherwise the bundled default
    pub fn select(override_path: &Path, embedded: &'static str) -> Self {
        if override_path.is_file() {
            Self::File(override_path.to_path_buf())
        } else {
            Self::Embedded(embedded)
        }
    }

    pub fn read(&self) -> Result<String, TopologyError> {
        match self {
            Self::Embedded(text) => Ok((*text).to_string()),
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| TopologyError::Io {
                path: path.display().to_string(),
                error: e.to_string(),
            }),
        }
    }

    /// Read and load into a project in one step
    pub fn load(
        &self,
        loader: &dyn TopologyLoader,
        working_dir: &Path,
        project_name: Option<&str>,
    ) -> Result<Project, TopologyError> {
        let text = self.read()?;
        loader.load(&text, working_dir, project_name)
    }
}

impl fmt::Display for TopologySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded(_) => write!(f, "embedded default"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Download topology text. Non-success statuses are errors.
pub async fn download_topology(url: &str) -> Result<String, TopologySourceError> {
    let fetch_err = |error: String| TopologySourceError::Fetch {
        url: url.to_string(),
        error,
    };

    info!(url = url, "Fetching topology");
    let response = reqwest::get(url)
        .await
        .map_err(|e| fetch_err(e.to_string()))?
        .error_for_status()
        .map_err(|e| fetch_err(e.to_string()))?;
    response.text().await.map_err(|e| fetch_err(e.to_string()))
}

/// Download a topology, check that it loads, then atomically replace
/// `destination`. Returns the loaded project.
pub async fn fetch_topology(
    url: &str,
    destination: &Path,
    loader: &dyn TopologyLoader,
    working_dir: &Path,
) -> Result<Project, TopologySourceError> {
    let body = download_topology(url).await?;
    let project = loader.load(&body, working_dir, None)?;

    let write_err = |error: std::io::Error| TopologySourceError::Write {
        path: destination.display().to_string(),
        error: error.to_string(),
    };
    let mut staging = destination.as_os_str().to_owned();
    staging.push(".download");
    let staging = PathBuf::from(staging);
    tokio::fs::write(&staging, body.as_bytes()).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&staging, destination).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(write_err(e));
    }

    info!(
        path = %destination.display(),
        services = project.services().len(),
        "Topology updated"
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::compose_loader::ComposeTopologyLoader;

    const VALID: &str = "services:\n  web:\n    image: nginx\n  web-data:\n    image: busybox\n";

    #[test]
    fn test_select_prefers_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yaml");

        assert_eq!(TopologySource::select(&path, VALID), TopologySource::Embedded(VALID));

        std::fs::write(&path, "services: {}\n").unwrap();
        let source = TopologySource::select(&path, VALID);
        assert_eq!(source, TopologySource::File(path.clone()));
        assert_eq!(source.read().unwrap(), "services: {}\n");
    }

    #[tokio::test]
    async fn test_fetch_writes_valid_topology() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/docker-compose.yaml")
            .with_status(200)
            .with_body(VALID)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("docker-compose.yaml");
        let url = format!("{}/docker-compose.yaml", server.url());

        let project = fetch_topology(&url, &dest, &ComposeTopologyLoader::new(), dir.path())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(project.service_names(), vec!["web", "web-data"]);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), VALID);
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_status_and_bad_yaml() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing.yaml")
            .with_status(404)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/broken.yaml")
            .with_status(200)
            .with_body("services:\n  web:\n    depends_on: [nope]\n")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("docker-compose.yaml");
        std::fs::write(&dest, VALID).unwrap();
        let loader = ComposeTopologyLoader::new();

        let missing = fetch_topology(
            &format!("{}/missing.yaml", server.url()),
            &dest,
            &loader,
            dir.path(),
        )
        .await;
        assert!(matches!(missing, Err(TopologySourceError::Fetch { .. })));

        let broken = fetch_topology(
            &format!("{}/broken.yaml", server.url()),
            &dest,
            &loader,
            dir.path(),
        )
        .await;
        assert!(matches!(broken, Err(TopologySourceError::Invalid(_))));

        // existing override is left untouched
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), VALID);
    }
}
