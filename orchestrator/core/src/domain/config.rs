// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// CLI Configuration
//
// Process-wide settings read once at startup:
// - Project namespace override
// - Where the topology comes from (local override file, remote URL)
// - Classifier markers for auxiliary services
// - Container backend endpoint (host or Docker context)
// - Defaults for interactive sessions

use crate::domain::classification::{ServiceClassifier, DEFAULT_AUXILIARY_SUFFIXES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "INSTA_CONFIG_PATH";
pub const PROJECT_NAME_ENV: &str = "INSTA_PROJECT_NAME";
pub const DOCKER_CONTEXT_ENV: &str = "INSTA_DOCKER_CONTEXT";
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";
pub const TOPOLOGY_URL_ENV: &str = "INSTA_TOPOLOGY_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {error}")]
    Io { path: String, error: String },
    #[error("failed to parse config {path}: {error}")]
    Parse { path: String, error: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstaConfig {
    /// Namespace for backend resources; falls back to the topology's own name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Remote topology fetched by `update`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_url: Option<String>,

    /// Local override used instead of the embedded topology when it exists
    #[serde(default = "default_topology_path")]
    pub topology_path: PathBuf,

    /// Name suffixes that mark a service as auxiliary
    #[serde(default = "default_auxiliary_suffixes")]
    pub auxiliary_suffixes: Vec<String>,

    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub exec: ExecSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Docker context name; `default` means local defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Explicit endpoint (`unix://`, `tcp://`, `http://`, `npipe://`); wins over `context`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecSettings {
    /// Working directory for `connect`; the container's own when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default = "default_true")]
    pub tty: bool,

    /// Command run by `connect` when none is given
    #[serde(default = "default_shell")]
    pub default_command: String,
}

fn default_topology_path() -> PathBuf {
    PathBuf::from("docker-compose.yaml")
}

fn default_auxiliary_suffixes() -> Vec<String> {
    DEFAULT_AUXILIARY_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for InstaConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            topology_url: None,
            topology_path: default_topology_path(),
            auxiliary_suffixes: default_auxiliary_suffixes(),
            backend: BackendSettings::default(),
            exec: ExecSettings::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            context: None,
            host: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            working_dir: None,
            tty: true,
            default_command: default_shell(),
        }
    }
}

impl InstaConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            error: e.to_string(),
        })
    }

    /// Discover a configuration file using precedence order
    /// 1. INSTA_CONFIG_PATH environment variable
    /// 2. ./insta.yaml (working directory)
    /// 3. <user config dir>/insta/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./insta.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(dir) = dirs::config_dir() {
            let user_config = dir.join("insta").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default. An explicit
    /// path that cannot be read is an error rather than a silent fallback.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = cli_path {
            tracing::debug!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::debug!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = get(PROJECT_NAME_ENV) {
            tracing::debug!("Environment override: {}={}", PROJECT_NAME_ENV, name);
            self.project_name = Some(name);
        }
        if let Some(url) = get(TOPOLOGY_URL_ENV) {
            self.topology_url = Some(url);
        }
        if let Some(context) = get(DOCKER_CONTEXT_ENV) {
            tracing::debug!("Environment override: {}={}", DOCKER_CONTEXT_ENV, context);
            self.backend.context = Some(context);
        }
        if let Some(host) = get(DOCKER_HOST_ENV) {
            tracing::debug!("Environment override: {}={}", DOCKER_HOST_ENV, host);
            self.backend.host = Some(host);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.exec.default_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "exec.default_command must not be empty".to_string(),
            ));
        }
        if let Some(url) = &self.topology_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "topology_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        Ok(())
    }

    pub fn classifier(&self) -> ServiceClassifier {
        ServiceClassifier::new(self.auxiliary_suffixes.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = InstaConfig::default();

        assert_eq!(config.topology_path, PathBuf::from("docker-compose.yaml"));
        assert_eq!(config.auxiliary_suffixes, vec!["-data", "-init", "-server"]);
        assert_eq!(config.backend.timeout_secs, 120);
        assert!(config.exec.tty);
        assert_eq!(config.exec.default_command, "sh");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = InstaConfig::from_yaml_str(
            r#"
project_name: shop
auxiliary_suffixes: ["-sidecar"]
backend:
  context: colima
exec:
  working_dir: /workspace
"#,
        )
        .unwrap();

        assert_eq!(config.project_name.as_deref(), Some("shop"));
        assert_eq!(config.backend.context.as_deref(), Some("colima"));
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.exec.working_dir.as_deref(), Some("/workspace"));
        assert!(config.exec.tty);
        assert_eq!(config.classifier().suffixes(), ["-sidecar".to_string()]);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (PROJECT_NAME_ENV, "override"),
            (DOCKER_HOST_ENV, "tcp://10.0.0.2:2375"),
            (DOCKER_CONTEXT_ENV, "   "),
        ]);
        let mut config = InstaConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.project_name.as_deref(), Some("override"));
        assert_eq!(config.backend.host.as_deref(), Some("tcp://10.0.0.2:2375"));
        assert_eq!(config.backend.context, None);
    }

    #[test]
    fn test_validation() {
        let mut config = InstaConfig::default();
        config.topology_url = Some("ftp://example.com/compose.yaml".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = InstaConfig::default();
        config.backend.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");

        assert!(matches!(
            InstaConfig::load_or_default(Some(missing)),
            Err(ConfigError::Io { .. })
        ));
    }
}
