// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Project Model
//!
//! In-memory form of a loaded topology: a namespaced, declaration-ordered set
//! of service definitions plus the networks and volumes they reference.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Immutable aggregate shared read-only by every operation
//!
//! A [`Project`] is built once per process by the topology loader and is never
//! mutated afterwards. Services keep their declaration order so that batched
//! backend requests and listings are stable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Network every service joins when it declares none.
pub const DEFAULT_NETWORK: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    name: String,
    working_dir: PathBuf,
    services: Vec<ServiceDefinition>,
    networks: BTreeMap<String, NetworkDefinition>,
    volumes: BTreeMap<String, VolumeDefinition>,
}

impl Project {
    /// Assemble a project. Callers are expected to have validated name
    /// uniqueness and references; the topology loader does this.
    pub fn new(
        name: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        services: Vec<ServiceDefinition>,
        networks: BTreeMap<String, NetworkDefinition>,
        volumes: BTreeMap<String, VolumeDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            working_dir: working_dir.into(),
            services,
            networks,
            volumes,
        }
    }

    /// Namespace used by the backend to group this project's resources
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    /// Services in declaration order
    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.service(name).is_some()
    }

    /// Every declared service name, in declaration order
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn networks(&self) -> &BTreeMap<String, NetworkDefinition> {
        &self.networks
    }

    pub fn volumes(&self) -> &BTreeMap<String, VolumeDefinition> {
        &self.volumes
    }

    /// Names in `requested` that the project does not declare, in request order
    pub fn unknown_services<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        requested
            .iter()
            .filter(|name| !self.contains(name))
            .map(String::as_str)
            .collect()
    }

    /// Backend-side resource name for a project-scoped network or volume
    pub fn scoped_name(&self, resource: &str) -> String {
        format!("{}_{}", self.name, resource)
    }

    /// Expand `targets` with their transitive dependencies and order the result
    /// so that every service comes after the services it depends on. Ties keep
    /// declaration order. Unknown names are skipped.
    pub fn dependency_order(&self, targets: &[String]) -> Vec<String> {
        let mut wanted: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = targets.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            let Some(service) = self.service(name) else {
                continue;
            };
            if wanted.insert(service.name.as_str()) {
                stack.extend(service.depends_on.iter().map(String::as_str));
            }
        }

        let mut ordered: Vec<String> = Vec::with_capacity(wanted.len());
        let mut placed: HashSet<&str> = HashSet::new();
        // Kahn-style passes over declaration order; a cycle leaves the rest in
        // declaration order rather than looping forever.
        loop {
            let mut progressed = false;
            for service in &self.services {
                let name = service.name.as_str();
                if !wanted.contains(name) || placed.contains(name) {
                    continue;
                }
                let ready = service
                    .depends_on
                    .iter()
                    .all(|dep| placed.contains(dep.as_str()) || !wanted.contains(dep.as_str()));
                if ready {
                    placed.insert(name);
                    ordered.push(service.name.clone());
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        for service in &self.services {
            if wanted.contains(service.name.as_str()) && !placed.contains(service.name.as_str()) {
                ordered.push(service.name.clone());
            }
        }
        ordered
    }

    /// First dependency of `name` found in `failed`. A service whose
    /// dependency failed is not attempted.
    pub fn failed_dependency<'a>(
        &'a self,
        name: &str,
        failed: &HashSet<String>,
    ) -> Option<&'a str> {
        self.service(name)?
            .depends_on
            .iter()
            .find(|dep| failed.contains(dep.as_str()))
            .map(String::as_str)
    }
}

/// How one unit is realised as a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Sorted for deterministic container configuration
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    /// Project-level network keys, never empty after loading
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub stdin_open: bool,
}

impl ServiceDefinition {
    /// Minimal definition, mostly useful for tests and programmatic projects
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            build: None,
            command: None,
            entrypoint: None,
            working_dir: None,
            environment: BTreeMap::new(),
            depends_on: Vec::new(),
            restart: RestartPolicy::No,
            ports: Vec::new(),
            volumes: Vec::new(),
            networks: vec![DEFAULT_NETWORK.to_string()],
            labels: BTreeMap::new(),
            tty: false,
            stdin_open: false,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Environment in `KEY=VALUE` form as container runtimes expect it
    pub fn env_pairs(&self) -> Vec<String> {
        self.environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub context: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    No,
    Always,
    UnlessStopped,
    OnFailure { max_retries: Option<u32> },
}

impl RestartPolicy {
    /// Parse the compose spelling: `no`, `always`, `unless-stopped`,
    /// `on-failure` or `on-failure:N`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "no" | "" => Some(Self::No),
            "always" => Some(Self::Always),
            "unless-stopped" => Some(Self::UnlessStopped),
            "on-failure" => Some(Self::OnFailure { max_retries: None }),
            other => {
                let retries = other.strip_prefix("on-failure:")?;
                retries
                    .parse()
                    .ok()
                    .map(|n| Self::OnFailure { max_retries: Some(n) })
            }
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::No => write!(f, "no"),
            Self::Always => write!(f, "always"),
            Self::UnlessStopped => write!(f, "unless-stopped"),
            Self::OnFailure { max_retries: None } => write!(f, "on-failure"),
            Self::OnFailure { max_retries: Some(n) } => write!(f, "on-failure:{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

impl PortMapping {
    /// Parse `[[host_ip:]host_port:]container_port[/protocol]`
    pub fn parse(spec: &str) -> Option<Self> {
        let (ports, protocol) = match spec.split_once('/') {
            Some((ports, proto)) => (ports, proto.to_string()),
            None => (spec, "tcp".to_string()),
        };
        let parts: Vec<&str> = ports.rsplitn(3, ':').collect();
        let container_port = parts.first()?.parse().ok()?;
        let host_port = match parts.get(1) {
            Some(p) if !p.is_empty() => Some(p.parse().ok()?),
            _ => None,
        };
        let host_ip = parts.get(2).map(|ip| ip.to_string());
        Some(Self {
            host_ip,
            host_port,
            container_port,
            protocol,
        })
    }

    /// Docker's `<port>/<protocol>` key
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeMount {
    /// Project-scoped named volume declared at the top level
    Named {
        volume: String,
        target: String,
        read_only: bool,
    },
    /// Host path, already resolved against the project working directory
    Bind {
        source: PathBuf,
        target: String,
        read_only: bool,
    },
    /// Anonymous volume created by the runtime
    Anonymous { target: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Managed outside the project; never created or removed by the backend
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default)]
    pub external: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(services: Vec<ServiceDefinition>) -> Project {
        Project::new("demo", "/tmp", services, BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn test_dependency_order_puts_dependencies_first() {
        let p = project(vec![
            ServiceDefinition::new("web", "nginx").with_dependencies(["api"]),
            ServiceDefinition::new("api", "api").with_dependencies(["db"]),
            ServiceDefinition::new("db", "postgres"),
            ServiceDefinition::new("docs", "nginx"),
        ]);

        assert_eq!(p.dependency_order(&["web".to_string()]), vec!["db", "api", "web"]);
        assert_eq!(
            p.dependency_order(&p.service_names()),
            vec!["db", "docs", "api", "web"]
        );
    }

    #[test]
    fn test_dependency_order_survives_cycles() {
        let p = project(vec![
            ServiceDefinition::new("a", "x").with_dependencies(["b"]),
            ServiceDefinition::new("b", "x").with_dependencies(["a"]),
        ]);

        assert_eq!(p.dependency_order(&["a".to_string()]), vec!["a", "b"]);
    }

    #[test]
    fn test_failed_dependency_names_the_broken_dependency() {
        let p = project(vec![
            ServiceDefinition::new("db", "postgres"),
            ServiceDefinition::new("cache", "redis"),
            ServiceDefinition::new("api", "api").with_dependencies(["cache", "db"]),
        ]);
        let failed: HashSet<String> = ["db".to_string()].into_iter().collect();

        assert_eq!(p.failed_dependency("api", &failed), Some("db"));
        assert_eq!(p.failed_dependency("cache", &failed), None);
        assert_eq!(p.failed_dependency("missing", &failed), None);
    }

    #[test]
    fn test_unknown_services_preserves_request_order() {
        let p = project(vec![ServiceDefinition::new("web", "nginx")]);
        let requested = vec!["zeta".to_string(), "web".to_string(), "alpha".to_string()];

        assert_eq!(p.unknown_services(&requested), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_restart_policy_parse() {
        assert_eq!(RestartPolicy::parse("always"), Some(RestartPolicy::Always));
        assert_eq!(
            RestartPolicy::parse("on-failure:3"),
            Some(RestartPolicy::OnFailure { max_retries: Some(3) })
        );
        assert_eq!(RestartPolicy::parse("sometimes"), None);
        assert_eq!(RestartPolicy::UnlessStopped.to_string(), "unless-stopped");
    }

    #[test]
    fn test_port_mapping_parse() {
        let p = PortMapping::parse("127.0.0.1:8080:80/udp").unwrap();
        assert_eq!(p.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(p.host_port, Some(8080));
        assert_eq!(p.container_port, 80);
        assert_eq!(p.container_key(), "80/udp");

        let bare = PortMapping::parse("5432").unwrap();
        assert_eq!(bare.host_port, None);
        assert_eq!(bare.protocol, "tcp");

        assert!(PortMapping::parse("http").is_none());
    }
}
