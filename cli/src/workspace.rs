// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-invocation workspace
//!
//! Resolves configuration and the topology once at startup into an immutable
//! [`Workspace`]; the Docker backend is only connected for commands that
//! need it.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use insta_core::domain::backend::{BackendError, ContainerBackend};
use insta_core::domain::config::InstaConfig;
use insta_core::domain::error::OrchestratorError;
use insta_core::domain::project::Project;
use insta_core::infrastructure::{ComposeTopologyLoader, DockerBackend, TopologySource};

/// Topology used when no local override file exists
pub const DEFAULT_TOPOLOGY: &str = include_str!("../assets/docker-compose.yaml");

pub struct Workspace {
    pub config: InstaConfig,
    pub project: Project,
    pub source: TopologySource,
}

impl Workspace {
    /// Load the project from an explicit topology file, the configured
    /// override file, or the embedded default, in that order.
    pub fn load(config: InstaConfig, topology: Option<&Path>) -> Result<Self> {
        let source = match topology {
            Some(path) if !path.is_file() => {
                bail!("Topology file not found: {}", path.display())
            }
            Some(path) => TopologySource::File(path.to_path_buf()),
            None => TopologySource::select(&config.topology_path, DEFAULT_TOPOLOGY),
        };

        let working_dir = match &source {
            TopologySource::File(path) => topology_dir(path)?,
            TopologySource::Embedded(_) => {
                std::env::current_dir().context("Failed to read current directory")?
            }
        };

        let project = source
            .load(
                &ComposeTopologyLoader::new(),
                &working_dir,
                config.project_name.as_deref(),
            )
            .map_err(OrchestratorError::from)?;

        tracing::debug!(
            project = project.name(),
            source = %source,
            services = project.services().len(),
            "Topology loaded"
        );
        Ok(Self {
            config,
            project,
            source,
        })
    }

    pub fn connect_backend(&self) -> Result<Arc<dyn ContainerBackend>> {
        let backend = DockerBackend::connect(&self.config.backend).map_err(|e| match e {
            BackendError::Unavailable(msg) => OrchestratorError::BackendUnavailable(msg),
            other => OrchestratorError::Backend(other.to_string()),
        })?;
        Ok(Arc::new(backend))
    }
}

/// Directory relative paths in a topology file resolve against
pub fn topology_dir(path: &Path) -> Result<PathBuf> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) if parent.is_absolute() => Ok(parent.to_path_buf()),
        Some(parent) => Ok(std::env::current_dir()
            .context("Failed to read current directory")?
            .join(parent)),
        None => std::env::current_dir().context("Failed to read current directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta_core::domain::classification::ServiceRole;

    #[test]
    fn test_embedded_topology_loads() {
        let config = InstaConfig {
            topology_path: PathBuf::from("/nonexistent/insta/docker-compose.yaml"),
            ..Default::default()
        };

        let workspace = Workspace::load(config.clone(), None).unwrap();

        assert_eq!(workspace.source, TopologySource::Embedded(DEFAULT_TOPOLOGY));
        assert_eq!(workspace.project.name(), "insta");
        let primary = config.classifier().primary_services(&workspace.project);
        assert_eq!(primary, vec!["db", "cache", "workspace"]);
        assert_eq!(
            config.classifier().role_of("mock-server"),
            ServiceRole::Auxiliary
        );
    }

    #[test]
    fn test_explicit_topology_and_project_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        std::fs::write(&path, "name: ignored\nservices:\n  api:\n    image: api:dev\n").unwrap();
        let config = InstaConfig {
            project_name: Some("Team-A".to_string()),
            ..Default::default()
        };

        let workspace = Workspace::load(config, Some(&path)).unwrap();

        assert_eq!(workspace.project.name(), "team-a");
        assert_eq!(workspace.project.working_dir(), &dir.path().to_path_buf());
        assert_eq!(workspace.project.service_names(), vec!["api"]);
    }

    #[test]
    fn test_missing_explicit_topology_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");

        let err = Workspace::load(InstaConfig::default(), Some(&missing))
            .err()
            .expect("load should fail");
        assert!(err.to_string().contains("Topology file not found"));
    }
}
