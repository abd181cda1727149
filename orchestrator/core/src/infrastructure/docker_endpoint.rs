// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Docker endpoint resolution
//!
//! Picks the daemon endpoint from, in order: an explicit host, a named Docker
//! context, or the client's local defaults. Context metadata lives under
//! `$DOCKER_CONFIG/contexts/meta/<sha256(name)>/meta.json`.

use crate::domain::backend::BackendError;
use crate::domain::config::BackendSettings;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Whatever the client library detects (DOCKER_HOST, default socket)
    LocalDefaults,
    Unix(String),
    Http(String),
    NamedPipe(String),
}

#[derive(Debug, Deserialize)]
struct ContextMeta {
    #[serde(rename = "Endpoints", default)]
    endpoints: HashMap<String, ContextEndpoint>,
}

#[derive(Debug, Deserialize)]
struct ContextEndpoint {
    #[serde(rename = "Host", default)]
    host: Option<String>,
}

impl DockerEndpoint {
    pub fn resolve(settings: &BackendSettings) -> Result<Self, BackendError> {
        Self::resolve_in(settings, &docker_config_dir())
    }

    /// Resolve against an explicit Docker config directory
    pub fn resolve_in(settings: &BackendSettings, config_dir: &Path) -> Result<Self, BackendError> {
        if let Some(host) = settings.host.as_deref().filter(|h| !h.is_empty()) {
            return Self::parse_host(host);
        }
        match settings.context.as_deref() {
            None | Some("") | Some("default") => Ok(Self::LocalDefaults),
            Some(name) => {
                let host = context_host(name, config_dir)?;
                Self::parse_host(&host)
            }
        }
    }

    pub fn parse_host(host: &str) -> Result<Self, BackendError> {
        if let Some(path) = host.strip_prefix("unix://") {
            Ok(Self::Unix(path.to_string()))
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Ok(Self::Http(host.to_string()))
        } else if let Some(pipe) = host.strip_prefix("npipe://") {
            Ok(Self::NamedPipe(pipe.to_string()))
        } else {
            Err(BackendError::Unavailable(format!(
                "unsupported Docker host '{}': expected unix://, tcp://, http:// or npipe://",
                host
            )))
        }
    }
}

fn docker_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".docker"))
        .unwrap_or_else(|| PathBuf::from(".docker"))
}

fn context_host(name: &str, config_dir: &Path) -> Result<String, BackendError> {
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let meta_path = config_dir
        .join("contexts")
        .join("meta")
        .join(digest)
        .join("meta.json");
    let content = std::fs::read_to_string(&meta_path).map_err(|e| {
        BackendError::Unavailable(format!(
            "Docker context '{}' not found ({}): {}",
            name,
            meta_path.display(),
            e
        ))
    })?;
    let meta: ContextMeta = serde_json::from_str(&content).map_err(|e| {
        BackendError::Unavailable(format!("Docker context '{}' is malformed: {}", name, e))
    })?;
    meta.endpoints
        .get("docker")
        .and_then(|endpoint| endpoint.host.clone())
        .ok_or_else(|| {
            BackendError::Unavailable(format!("Docker context '{}' has no docker endpoint", name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(context: Option<&str>, host: Option<&str>) -> BackendSettings {
        BackendSettings {
            context: context.map(str::to_string),
            host: host.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_explicit_host_wins() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = DockerEndpoint::resolve_in(
            &settings(Some("colima"), Some("unix:///run/user/1000/docker.sock")),
            dir.path(),
        )
        .unwrap();

        assert_eq!(resolved, DockerEndpoint::Unix("/run/user/1000/docker.sock".to_string()));
    }

    #[test]
    fn test_default_context_uses_local_defaults() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(
            DockerEndpoint::resolve_in(&settings(Some("default"), None), dir.path()).unwrap(),
            DockerEndpoint::LocalDefaults
        );
        assert_eq!(
            DockerEndpoint::resolve_in(&settings(None, None), dir.path()).unwrap(),
            DockerEndpoint::LocalDefaults
        );
    }

    #[test]
    fn test_named_context_reads_meta() {
        let dir = tempfile::tempdir().unwrap();
        let digest = hex::encode(Sha256::digest(b"remote"));
        let meta_dir = dir.path().join("contexts").join("meta").join(digest);
        std::fs::create_dir_all(&meta_dir).unwrap();
        std::fs::write(
            meta_dir.join("meta.json"),
            r#"{"Name":"remote","Metadata":{},"Endpoints":{"docker":{"Host":"tcp://10.1.2.3:2375","SkipTLSVerify":false}}}"#,
        )
        .unwrap();

        assert_eq!(
            DockerEndpoint::resolve_in(&settings(Some("remote"), None), dir.path()).unwrap(),
            DockerEndpoint::Http("tcp://10.1.2.3:2375".to_string())
        );
        assert!(matches!(
            DockerEndpoint::resolve_in(&settings(Some("missing"), None), dir.path()),
            Err(BackendError::Unavailable(_))
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(DockerEndpoint::parse_host("ssh://me@box").is_err());
        assert_eq!(
            DockerEndpoint::parse_host("npipe:////./pipe/docker_engine").unwrap(),
            DockerEndpoint::NamedPipe("//./pipe/docker_engine".to_string())
        );
    }
}
