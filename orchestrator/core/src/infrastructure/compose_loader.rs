// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose Topology Loader
//!
//! Parses the compose-style YAML subset used by local development stacks into
//! a validated [`Project`].
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML → Domain objects
//! - **Anti-Corruption:** Translates the compose schema to the project model
//!
//! # Topology Format
//!
//! ```yaml
//! name: shop
//! services:
//!   db:
//!     image: postgres:16-alpine
//!     environment:
//!       POSTGRES_PASSWORD: dev
//!     volumes:
//!       - db-data:/var/lib/postgresql/data
//!   api:
//!     build: ./api
//!     command: cargo run --bin api
//!     depends_on: [db]
//!     ports: ["8080:8080"]
//! volumes:
//!   db-data: {}
//! ```

use crate::domain::project::{
    BuildSpec, NetworkDefinition, PortMapping, Project, RestartPolicy, ServiceDefinition,
    VolumeDefinition, VolumeMount, DEFAULT_NETWORK,
};
use crate::domain::topology::{TopologyError, TopologyLoader};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Project name used when neither the caller nor the topology provides one
pub const FALLBACK_PROJECT_NAME: &str = "insta";

// ============================================================================
// YAML Schema (External Representation)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    services: OrderedMap<ServiceYaml>,
    #[serde(default)]
    networks: BTreeMap<String, Option<ResourceYaml>>,
    #[serde(default)]
    volumes: BTreeMap<String, Option<ResourceYaml>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceYaml {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    build: Option<BuildYaml>,
    #[serde(default)]
    command: Option<CommandYaml>,
    #[serde(default)]
    entrypoint: Option<CommandYaml>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    environment: Option<KeyValueYaml>,
    #[serde(default)]
    depends_on: Option<NameListYaml>,
    #[serde(default)]
    restart: Option<String>,
    #[serde(default)]
    ports: Vec<PortYaml>,
    #[serde(default)]
    volumes: Vec<String>,
    #[serde(default)]
    networks: Option<NameListYaml>,
    #[serde(default)]
    labels: Option<KeyValueYaml>,
    #[serde(default)]
    tty: bool,
    #[serde(default)]
    stdin_open: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BuildYaml {
    Context(String),
    Full {
        context: String,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandYaml {
    Line(String),
    Args(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyValueYaml {
    Map(BTreeMap<String, serde_yaml::Value>),
    List(Vec<String>),
}

/// `depends_on` and `networks` accept a list of names or a map keyed by name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameListYaml {
    List(Vec<String>),
    Map(OrderedMap<serde_yaml::Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortYaml {
    Number(u16),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct ResourceYaml {
    #[serde(default)]
    driver: Option<String>,
    #[serde(default)]
    external: bool,
}

/// Mapping that keeps declaration order and every entry, duplicates included,
/// so that duplicates can be reported by name.
#[derive(Debug)]
struct OrderedMap<T>(Vec<(String, T)>);

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(OrderedMap::default())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

// ============================================================================
// Loader
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ComposeTopologyLoader;

impl ComposeTopologyLoader {
    pub fn new() -> Self {
        Self
    }

    /// Read and load a topology file
    pub fn load_file(
        &self,
        path: impl AsRef<Path>,
        working_dir: &Path,
        project_name: Option<&str>,
    ) -> Result<Project, TopologyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TopologyError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        self.load(&text, working_dir, project_name)
    }
}

impl TopologyLoader for ComposeTopologyLoader {
    fn load(
        &self,
        text: &str,
        working_dir: &Path,
        project_name: Option<&str>,
    ) -> Result<Project, TopologyError> {
        let file: ComposeFile =
            serde_yaml::from_str(text).map_err(|e| TopologyError::Yaml(e.to_string()))?;

        let name = project_name
            .map(str::to_string)
            .or(file.name)
            .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string());
        let name = normalize_project_name(&name)?;

        let mut networks: BTreeMap<String, NetworkDefinition> = file
            .networks
            .into_iter()
            .map(|(key, def)| {
                let def = def.unwrap_or_default();
                (
                    key,
                    NetworkDefinition {
                        driver: def.driver,
                        external: def.external,
                    },
                )
            })
            .collect();
        let volumes: BTreeMap<String, VolumeDefinition> = file
            .volumes
            .into_iter()
            .map(|(key, def)| {
                let def = def.unwrap_or_default();
                (
                    key,
                    VolumeDefinition {
                        driver: def.driver,
                        external: def.external,
                    },
                )
            })
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        for (service, _) in &file.services.0 {
            if !seen.insert(service.clone()) {
                return Err(TopologyError::DuplicateService(service.clone()));
            }
        }

        let mut services = Vec::with_capacity(file.services.0.len());
        for (service_name, raw) in file.services.0 {
            let service = convert_service(&name, &service_name, raw, working_dir, &volumes)?;
            for network in &service.networks {
                if network != DEFAULT_NETWORK && !networks.contains_key(network) {
                    return Err(TopologyError::UnresolvedReference {
                        service: service_name.clone(),
                        kind: "network",
                        name: network.clone(),
                    });
                }
            }
            services.push(service);
        }

        for service in &services {
            for dep in &service.depends_on {
                if dep == &service.name {
                    return Err(TopologyError::InvalidField {
                        service: service.name.clone(),
                        field: "depends_on",
                        reason: "a service cannot depend on itself".to_string(),
                    });
                }
                if !seen.contains(dep) {
                    return Err(TopologyError::UnresolvedReference {
                        service: service.name.clone(),
                        kind: "service",
                        name: dep.clone(),
                    });
                }
            }
        }

        if services
            .iter()
            .any(|s| s.networks.iter().any(|n| n == DEFAULT_NETWORK))
        {
            networks.entry(DEFAULT_NETWORK.to_string()).or_default();
        }

        tracing::debug!(project = %name, services = services.len(), "Loaded topology");
        Ok(Project::new(name, working_dir, services, networks, volumes))
    }
}

fn convert_service(
    project: &str,
    name: &str,
    raw: ServiceYaml,
    working_dir: &Path,
    volumes: &BTreeMap<String, VolumeDefinition>,
) -> Result<ServiceDefinition, TopologyError> {
    let invalid = |field: &'static str, reason: String| TopologyError::InvalidField {
        service: name.to_string(),
        field,
        reason,
    };

    let build = raw.build.map(|b| match b {
        BuildYaml::Context(context) => BuildSpec {
            context: resolve_host_path(&context, working_dir),
            dockerfile: None,
        },
        BuildYaml::Full { context, dockerfile } => BuildSpec {
            context: resolve_host_path(&context, working_dir),
            dockerfile,
        },
    });
    let image = match (raw.image, &build) {
        (Some(image), _) if !image.trim().is_empty() => image,
        (_, Some(_)) => format!("{}-{}", project, name),
        _ => return Err(TopologyError::MissingImage(name.to_string())),
    };

    let command = raw
        .command
        .map(|c| convert_command(c).map_err(|e| invalid("command", e)))
        .transpose()?;
    let entrypoint = raw
        .entrypoint
        .map(|c| convert_command(c).map_err(|e| invalid("entrypoint", e)))
        .transpose()?;

    let environment = raw
        .environment
        .map(|kv| convert_key_values(kv).map_err(|e| invalid("environment", e)))
        .transpose()?
        .unwrap_or_default();
    let labels = raw
        .labels
        .map(|kv| convert_key_values(kv).map_err(|e| invalid("labels", e)))
        .transpose()?
        .unwrap_or_default();

    let restart = match raw.restart {
        Some(value) => RestartPolicy::parse(&value)
            .ok_or_else(|| invalid("restart", format!("unknown policy '{}'", value)))?,
        None => RestartPolicy::No,
    };

    let mut ports = Vec::with_capacity(raw.ports.len());
    for port in raw.ports {
        let spec = match port {
            PortYaml::Number(n) => n.to_string(),
            PortYaml::Text(s) => s,
        };
        ports.push(
            PortMapping::parse(&spec)
                .ok_or_else(|| invalid("ports", format!("cannot parse '{}'", spec)))?,
        );
    }

    let mut mounts = Vec::with_capacity(raw.volumes.len());
    for spec in raw.volumes {
        let mount = parse_volume(&spec, working_dir).map_err(|e| invalid("volumes", e))?;
        if let VolumeMount::Named { volume, .. } = &mount {
            if !volumes.contains_key(volume) {
                return Err(TopologyError::UnresolvedReference {
                    service: name.to_string(),
                    kind: "volume",
                    name: volume.clone(),
                });
            }
        }
        mounts.push(mount);
    }

    let depends_on = raw.depends_on.map(names_of).unwrap_or_default();
    let networks = match raw.networks.map(names_of) {
        Some(list) if !list.is_empty() => list,
        _ => vec![DEFAULT_NETWORK.to_string()],
    };

    Ok(ServiceDefinition {
        name: name.to_string(),
        image,
        build,
        command,
        entrypoint,
        working_dir: raw.working_dir,
        environment,
        depends_on,
        restart,
        ports,
        volumes: mounts,
        networks,
        labels,
        tty: raw.tty,
        stdin_open: raw.stdin_open,
    })
}

fn names_of(list: NameListYaml) -> Vec<String> {
    match list {
        NameListYaml::List(names) => names,
        NameListYaml::Map(map) => map.0.into_iter().map(|(k, _)| k).collect(),
    }
}

fn convert_command(command: CommandYaml) -> Result<Vec<String>, String> {
    match command {
        CommandYaml::Args(args) => Ok(args),
        CommandYaml::Line(line) => split_command_line(&line),
    }
}

fn convert_key_values(kv: KeyValueYaml) -> Result<BTreeMap<String, String>, String> {
    match kv {
        KeyValueYaml::List(items) => Ok(items
            .into_iter()
            .map(|item| match item.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (item, String::new()),
            })
            .collect()),
        KeyValueYaml::Map(map) => map
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::Null => String::new(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::String(s) => s,
                    _ => return Err(format!("value of '{}' must be a scalar", k)),
                };
                Ok((k, value))
            })
            .collect(),
    }
}

/// Parse the short volume syntax `[source:]target[:mode]`
fn parse_volume(spec: &str, working_dir: &Path) -> Result<VolumeMount, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, mode) = match parts.as_slice() {
        [target] => return Ok(VolumeMount::Anonymous { target: target.to_string() }),
        [source, target] => (*source, *target, None),
        [source, target, mode] => (*source, *target, Some(*mode)),
        _ => return Err(format!("cannot parse '{}'", spec)),
    };
    if target.is_empty() || source.is_empty() {
        return Err(format!("cannot parse '{}'", spec));
    }
    let read_only = match mode {
        None | Some("rw") => false,
        Some("ro") => true,
        Some(other) => return Err(format!("unsupported mode '{}' in '{}'", other, spec)),
    };

    if source.starts_with('.') || source.starts_with('/') || source.starts_with('~') {
        Ok(VolumeMount::Bind {
            source: resolve_host_path(source, working_dir),
            target: target.to_string(),
            read_only,
        })
    } else {
        Ok(VolumeMount::Named {
            volume: source.to_string(),
            target: target.to_string(),
            read_only,
        })
    }
}

fn resolve_host_path(path: &str, working_dir: &Path) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    let joined = working_dir.join(candidate);
    // Lexically drop `.` components so `./src` resolves to `<dir>/src`
    joined.components().filter(|c| !matches!(c, std::path::Component::CurDir)).collect()
}

fn normalize_project_name(name: &str) -> Result<String, TopologyError> {
    let lowered = name.trim().to_lowercase();
    let mut chars = lowered.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid_start && valid_rest {
        Ok(lowered)
    } else {
        Err(TopologyError::InvalidProjectName(name.to_string()))
    }
}

/// Split a command string the way a POSIX shell would tokenize words:
/// whitespace separates, single quotes are literal, double quotes allow
/// backslash escapes, a bare backslash escapes the next character.
pub fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut state = State::Normal;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' => {
                    state = State::Single;
                    in_word = true;
                }
                '"' => {
                    state = State::Double;
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        in_word = true;
                    }
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            State::Single => match c {
                '\'' => state = State::Normal,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Normal,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => return Err("unterminated double quote".to_string()),
                },
                c => current.push(c),
            },
        }
    }

    match state {
        State::Single => Err("unterminated single quote".to_string()),
        State::Double => Err("unterminated double quote".to_string()),
        State::Normal => {
            if in_word {
                words.push(current);
            }
            Ok(words)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> Result<Project, TopologyError> {
        ComposeTopologyLoader::new().load(yaml, Path::new("/work"), None)
    }

    #[test]
    fn test_parse_full_service() {
        let project = load(
            r#"
name: Shop
services:
  db:
    image: postgres:16-alpine
    environment:
      POSTGRES_PASSWORD: dev
      POSTGRES_PORT: 5432
      EMPTY:
    volumes:
      - db-data:/var/lib/postgresql/data
    restart: unless-stopped
  api:
    build:
      context: ./api
      dockerfile: Dockerfile.dev
    command: cargo run --bin "api server"
    working_dir: /app
    environment:
      - RUST_LOG=debug
      - FLAG
    depends_on:
      db:
        condition: service_started
    ports:
      - "8080:8080"
      - 9090
    volumes:
      - ./api:/app:ro
    networks: [backend]
    tty: true
volumes:
  db-data: {}
networks:
  backend:
    driver: bridge
"#,
        )
        .unwrap();

        assert_eq!(project.name(), "shop");
        assert_eq!(project.service_names(), vec!["db", "api"]);

        let db = project.service("db").unwrap();
        assert_eq!(db.environment["POSTGRES_PORT"], "5432");
        assert_eq!(db.environment["EMPTY"], "");
        assert_eq!(db.restart, RestartPolicy::UnlessStopped);
        assert_eq!(db.networks, vec!["default"]);
        assert!(matches!(&db.volumes[0], VolumeMount::Named { volume, .. } if volume == "db-data"));

        let api = project.service("api").unwrap();
        assert_eq!(api.image, "shop-api");
        let build = api.build.as_ref().unwrap();
        assert_eq!(build.context, PathBuf::from("/work/api"));
        assert_eq!(build.dockerfile.as_deref(), Some("Dockerfile.dev"));
        assert_eq!(
            api.command.as_ref().unwrap(),
            &vec!["cargo", "run", "--bin", "api server"]
        );
        assert_eq!(api.environment["RUST_LOG"], "debug");
        assert_eq!(api.environment["FLAG"], "");
        assert_eq!(api.depends_on, vec!["db"]);
        assert_eq!(api.ports.len(), 2);
        assert_eq!(api.ports[1].host_port, None);
        assert_eq!(api.ports[1].container_port, 9090);
        assert_eq!(
            api.volumes[0],
            VolumeMount::Bind {
                source: PathBuf::from("/work/api"),
                target: "/app".to_string(),
                read_only: true,
            }
        );
        assert_eq!(api.networks, vec!["backend"]);
        assert!(api.tty);

        assert!(project.networks().contains_key("default"));
        assert_eq!(project.networks()["backend"].driver.as_deref(), Some("bridge"));
    }

    #[test]
    fn test_name_override_and_fallback() {
        let yaml = "name: fromfile\nservices:\n  web:\n    image: nginx\n";
        let loader = ComposeTopologyLoader::new();

        let overridden = loader.load(yaml, Path::new("/"), Some("Override")).unwrap();
        assert_eq!(overridden.name(), "override");

        let fallback = load("services:\n  web:\n    image: nginx\n").unwrap();
        assert_eq!(fallback.name(), FALLBACK_PROJECT_NAME);
    }

    #[test]
    fn test_empty_topology_is_valid() {
        let project = load("services: {}\n").unwrap();
        assert!(project.is_empty());

        let bare = load("name: empty\n").unwrap();
        assert!(bare.is_empty());
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let err = load(
            "services:\n  web:\n    image: nginx\n  web:\n    image: httpd\n",
        )
        .unwrap_err();

        assert!(err.to_string().contains("duplicate"), "unexpected error: {}", err);
    }

    #[test]
    fn test_unresolved_references() {
        let dep = load("services:\n  web:\n    image: nginx\n    depends_on: [db]\n").unwrap_err();
        assert!(matches!(
            dep,
            TopologyError::UnresolvedReference { kind: "service", ref name, .. } if name == "db"
        ));

        let net = load("services:\n  web:\n    image: nginx\n    networks: [front]\n").unwrap_err();
        assert!(matches!(net, TopologyError::UnresolvedReference { kind: "network", .. }));

        let vol = load("services:\n  web:\n    image: nginx\n    volumes: [\"cache:/cache\"]\n")
            .unwrap_err();
        assert!(matches!(vol, TopologyError::UnresolvedReference { kind: "volume", .. }));
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(matches!(
            load("services:\n  web:\n    command: run\n").unwrap_err(),
            TopologyError::MissingImage(ref s) if s == "web"
        ));
        assert!(matches!(
            load("services:\n  web:\n    image: nginx\n    restart: sometimes\n").unwrap_err(),
            TopologyError::InvalidField { field: "restart", .. }
        ));
        assert!(matches!(
            load("services:\n  web:\n    image: nginx\n    depends_on: [web]\n").unwrap_err(),
            TopologyError::InvalidField { field: "depends_on", .. }
        ));
        assert!(matches!(
            load("name: \"bad name!\"\nservices: {}\n").unwrap_err(),
            TopologyError::InvalidProjectName(_)
        ));
        assert!(matches!(load("services: [web]\n").unwrap_err(), TopologyError::Yaml(_)));
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line(r#"sh -c 'echo "hi there"' plain\ word"#).unwrap(),
            vec!["sh", "-c", "echo \"hi there\"", "plain word"]
        );
        assert_eq!(
            split_command_line(r#"echo "a \"quoted\" \n""#).unwrap(),
            vec!["echo", "a \"quoted\" \\n"]
        );
        assert_eq!(split_command_line("  ").unwrap(), Vec::<String>::new());
        assert_eq!(split_command_line("echo ''").unwrap(), vec!["echo", ""]);
        assert!(split_command_line("echo 'oops").is_err());
    }
}
