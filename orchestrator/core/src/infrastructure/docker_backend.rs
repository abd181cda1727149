// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Docker container backend
//!
//! Realises a [`Project`] on a Docker daemon through `bollard`, using the same
//! labels and naming scheme as `docker compose` so both tools see the same
//! containers:
//!
//! - containers `<project>-<service>-1`, labelled with project and service
//! - networks `<project>_<network>` (`<project>_default` unless declared)
//! - named volumes `<project>_<volume>`
//!
//! Transport failures abort the whole request. Failures the daemon reports
//! for one service become that service's outcome and do not stop the rest,
//! except that dependents of a failed service are not attempted.

use crate::domain::backend::{
    BackendError, ContainerBackend, ExecOptions, ExecSession, OutcomeStatus, ServiceOutcome,
    SessionIo,
};
use crate::domain::config::BackendSettings;
use crate::domain::project::{Project, RestartPolicy, ServiceDefinition, VolumeMount};
use crate::infrastructure::docker_endpoint::DockerEndpoint;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, NetworkingConfig,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{
    EndpointSettings, ExecInspectResponse, HostConfig, PortBinding, RestartPolicy as DockerRestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, ListNetworksOptions};
use bollard::volume::CreateVolumeOptions;
use bollard::Docker;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const LABEL_PROJECT: &str = "com.docker.compose.project";
pub const LABEL_SERVICE: &str = "com.docker.compose.service";
pub const LABEL_NETWORK: &str = "com.docker.compose.network";
pub const LABEL_VOLUME: &str = "com.docker.compose.volume";
pub const LABEL_CONFIG_HASH: &str = "com.docker.compose.config-hash";
pub const LABEL_CONTAINER_NUMBER: &str = "com.docker.compose.container-number";
pub const LABEL_ONEOFF: &str = "com.docker.compose.oneoff";

/// Seconds a container gets to exit after SIGTERM before it is killed
const STOP_TIMEOUT_SECS: i64 = 10;

const EXIT_POLL_ATTEMPTS: u32 = 50;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct ContainerRef {
    id: String,
    service: String,
    config_hash: Option<String>,
}

pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connect using configured settings. Connection is lazy; use
    /// [`DockerBackend::healthcheck`] to verify the daemon answers.
    pub fn connect(settings: &BackendSettings) -> Result<Self, BackendError> {
        let endpoint = DockerEndpoint::resolve(settings)?;
        let timeout = settings.timeout_secs;
        let docker = match &endpoint {
            DockerEndpoint::LocalDefaults => Docker::connect_with_local_defaults(),
            #[cfg(unix)]
            DockerEndpoint::Unix(path) => {
                Docker::connect_with_unix(path, timeout, bollard::API_DEFAULT_VERSION)
            }
            #[cfg(windows)]
            DockerEndpoint::NamedPipe(pipe) => {
                Docker::connect_with_named_pipe(pipe, timeout, bollard::API_DEFAULT_VERSION)
            }
            DockerEndpoint::Http(addr) => {
                Docker::connect_with_http(addr, timeout, bollard::API_DEFAULT_VERSION)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(BackendError::Unavailable(format!(
                    "endpoint {:?} is not supported on this platform",
                    other
                )))
            }
        }
        .map_err(|e| {
            BackendError::Unavailable(format!(
                "Failed to connect to Docker: {}\n\n\
                 Common causes:\n\
                 - Docker daemon not running (check: docker ps)\n\
                 - Permission denied accessing Docker socket\n\
                 - Wrong Docker context or DOCKER_HOST",
                e
            ))
        })?;

        debug!(?endpoint, "Docker client configured");
        Ok(Self { docker })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), BackendError> {
        self.docker.ping().await.map_err(|e| {
            BackendError::Unavailable(format!(
                "Cannot connect to Docker daemon: {}\n\n\
                 Ensure Docker is running. Verify with: docker ps",
                e
            ))
        })?;
        Ok(())
    }

    async fn project_containers(
        &self,
        project: &str,
        running_only: bool,
    ) -> Result<Vec<ContainerRef>, DockerError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{}={}", LABEL_PROJECT, project)],
        );
        if running_only {
            filters.insert("status".to_string(), vec!["running".to_string()]);
        }
        let options = ListContainersOptions::<String> {
            all: !running_only,
            filters,
            ..Default::default()
        };

        let summaries = self.docker.list_containers(Some(options)).await?;
        Ok(summaries
            .into_iter()
            .filter_map(|summary| {
                let labels = summary.labels.unwrap_or_default();
                let service = labels.get(LABEL_SERVICE)?.clone();
                Some(ContainerRef {
                    id: summary.id?,
                    service,
                    config_hash: labels.get(LABEL_CONFIG_HASH).cloned(),
                })
            })
            .collect())
    }

    async fn ensure_networks(
        &self,
        project: &Project,
        services: &[&ServiceDefinition],
    ) -> Result<(), DockerError> {
        let mut keys: Vec<&str> = Vec::new();
        for service in services {
            for key in &service.networks {
                if !keys.contains(&key.as_str()) {
                    keys.push(key);
                }
            }
        }

        for key in keys {
            let definition = project.networks().get(key).cloned().unwrap_or_default();
            if definition.external {
                continue;
            }
            let name = project.scoped_name(key);
            let mut filters = HashMap::new();
            filters.insert("name".to_string(), vec![name.clone()]);
            let existing = self
                .docker
                .list_networks(Some(ListNetworksOptions::<String> { filters }))
                .await?;
            if existing.iter().any(|n| n.name.as_deref() == Some(name.as_str())) {
                continue;
            }

            info!(network = %name, "Creating network");
            let labels = HashMap::from([
                (LABEL_PROJECT.to_string(), project.name().to_string()),
                (LABEL_NETWORK.to_string(), key.to_string()),
            ]);
            self.docker
                .create_network(CreateNetworkOptions::<String> {
                    name,
                    driver: definition.driver.unwrap_or_else(|| "bridge".to_string()),
                    labels,
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }

    async fn ensure_volumes(
        &self,
        project: &Project,
        services: &[&ServiceDefinition],
    ) -> Result<(), DockerError> {
        let mut keys: Vec<&str> = Vec::new();
        for service in services {
            for mount in &service.volumes {
                if let VolumeMount::Named { volume, .. } = mount {
                    if !keys.contains(&volume.as_str()) {
                        keys.push(volume);
                    }
                }
            }
        }

        for key in keys {
            let definition = project.volumes().get(key).cloned().unwrap_or_default();
            if definition.external {
                continue;
            }
            let name = project.scoped_name(key);
            match self.docker.inspect_volume(&name).await {
                Ok(_) => continue,
                Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => {}
                Err(e) => return Err(e),
            }

            info!(volume = %name, "Creating volume");
            let labels = HashMap::from([
                (LABEL_PROJECT.to_string(), project.name().to_string()),
                (LABEL_VOLUME.to_string(), key.to_string()),
            ]);
            self.docker
                .create_volume(CreateVolumeOptions::<String> {
                    name,
                    driver: definition.driver.unwrap_or_else(|| "local".to_string()),
                    labels,
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }

    async fn ensure_image(&self, service: &ServiceDefinition) -> Result<(), BackendError> {
        if self.docker.inspect_image(&service.image).await.is_ok() {
            return Ok(());
        }
        if let Some(build) = &service.build {
            return Err(BackendError::Operation(format!(
                "image {} not found locally; build it first: docker build -t {} {}",
                service.image,
                service.image,
                build.context.display()
            )));
        }

        info!(image = %service.image, "Pulling image");
        let options = Some(CreateImageOptions {
            from_image: service.image.clone(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                return Err(match classify(e) {
                    BackendError::Operation(msg) => BackendError::Operation(format!(
                        "Failed to pull image {}: {}",
                        service.image, msg
                    )),
                    other => other,
                });
            }
        }
        info!(image = %service.image, "Successfully pulled image");
        Ok(())
    }

    /// Create the container for `service` and start it
    async fn create_and_start(
        &self,
        project: &Project,
        service: &ServiceDefinition,
    ) -> Result<(), BackendError> {
        self.ensure_image(service).await?;

        let name = container_name(project.name(), &service.name);
        let config = container_config(project, service);
        let res = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(classify)?;

        for key in service.networks.iter().skip(1) {
            let network = network_name(project, key);
            self.docker
                .connect_network(
                    &network,
                    ConnectNetworkOptions {
                        container: res.id.clone(),
                        endpoint_config: EndpointSettings {
                            aliases: Some(vec![service.name.clone()]),
                            ..Default::default()
                        },
                    },
                )
                .await
                .map_err(classify)?;
        }

        self.docker
            .start_container(&res.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(classify)?;
        info!(container = %name, "Started container");
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
    }

    /// Bring one service to running, reusing its container when the
    /// definition is unchanged
    async fn reconcile(
        &self,
        project: &Project,
        service: &ServiceDefinition,
        existing: Option<&ContainerRef>,
        running: &HashSet<String>,
    ) -> Result<OutcomeStatus, BackendError> {
        let wanted_hash = config_hash(service);
        match existing {
            Some(container) if container.config_hash.as_deref() == Some(wanted_hash.as_str()) => {
                if running.contains(&container.id) {
                    debug!(service = %service.name, "Already running");
                    return Ok(OutcomeStatus::AlreadyRunning);
                }
                self.docker
                    .start_container(&container.id, None::<StartContainerOptions<String>>)
                    .await
                    .map_err(classify)?;
                Ok(OutcomeStatus::Started)
            }
            Some(container) => {
                info!(service = %service.name, "Definition changed, recreating container");
                self.remove(&container.id).await.map_err(classify)?;
                self.create_and_start(project, service).await?;
                Ok(OutcomeStatus::Started)
            }
            None => {
                self.create_and_start(project, service).await?;
                Ok(OutcomeStatus::Started)
            }
        }
    }

    async fn remove_project_networks(&self, project: &Project) -> Result<(), BackendError> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{}={}", LABEL_PROJECT, project.name())],
        );
        let networks = self
            .docker
            .list_networks(Some(ListNetworksOptions::<String> { filters }))
            .await
            .map_err(classify)?;
        for network in networks {
            let Some(name) = network.name else { continue };
            match self.docker.remove_network(&name).await {
                Ok(()) => info!(network = %name, "Removed network"),
                Err(e) => match classify(e) {
                    BackendError::Unavailable(msg) => return Err(BackendError::Unavailable(msg)),
                    other => warn!(network = %name, "Failed to remove network: {}", other),
                },
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerBackend for DockerBackend {
    async fn start(
        &self,
        project: &Project,
        targets: &[String],
    ) -> Result<Vec<ServiceOutcome>, BackendError> {
        if let Some(unknown) = project.unknown_services(targets).first() {
            return Err(BackendError::ServiceNotFound(unknown.to_string()));
        }
        self.healthcheck().await?;

        let order = project.dependency_order(targets);
        let services: Vec<&ServiceDefinition> =
            order.iter().filter_map(|name| project.service(name)).collect();

        self.ensure_networks(project, &services).await.map_err(classify)?;
        self.ensure_volumes(project, &services).await.map_err(classify)?;

        let existing: HashMap<String, ContainerRef> = self
            .project_containers(project.name(), false)
            .await
            .map_err(classify)?
            .into_iter()
            .map(|c| (c.service.clone(), c))
            .collect();
        let running: HashSet<String> = self
            .project_containers(project.name(), true)
            .await
            .map_err(classify)?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let mut outcomes = Vec::with_capacity(services.len());
        let mut failed: HashSet<String> = HashSet::new();
        for service in services {
            if let Some(dep) = project.failed_dependency(&service.name, &failed) {
                failed.insert(service.name.clone());
                outcomes.push(ServiceOutcome::failed(
                    &service.name,
                    format!("dependency '{}' failed to start", dep),
                ));
                continue;
            }

            match self
                .reconcile(project, service, existing.get(&service.name), &running)
                .await
            {
                Ok(status) => outcomes.push(ServiceOutcome::new(&service.name, status)),
                Err(BackendError::Unavailable(msg)) => return Err(BackendError::Unavailable(msg)),
                Err(e) => {
                    warn!(service = %service.name, "Failed to start: {}", e);
                    failed.insert(service.name.clone());
                    outcomes.push(ServiceOutcome::failed(&service.name, e.to_string()));
                }
            }
        }
        Ok(outcomes)
    }

    async fn stop(
        &self,
        project: &Project,
        targets: &[String],
    ) -> Result<Vec<ServiceOutcome>, BackendError> {
        if let Some(unknown) = project.unknown_services(targets).first() {
            return Err(BackendError::ServiceNotFound(unknown.to_string()));
        }

        let containers = self
            .project_containers(project.name(), false)
            .await
            .map_err(classify)?;
        let running: HashSet<String> = self
            .project_containers(project.name(), true)
            .await
            .map_err(classify)?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let mut order = project.dependency_order(&project.service_names());
        order.reverse();

        let mut outcomes = Vec::new();
        for service in order.iter().filter(|s| targets.contains(s)) {
            for container in containers.iter().filter(|c| &c.service == service) {
                let was_running = running.contains(&container.id);
                let result = async {
                    if was_running {
                        self.docker
                            .stop_container(
                                &container.id,
                                Some(StopContainerOptions { t: STOP_TIMEOUT_SECS }),
                            )
                            .await?;
                    }
                    self.remove(&container.id).await
                }
                .await;

                match result.map_err(classify) {
                    Ok(()) => {
                        info!(service = %service, "Removed container");
                        let status = if was_running {
                            OutcomeStatus::Stopped
                        } else {
                            OutcomeStatus::Removed
                        };
                        outcomes.push(ServiceOutcome::new(service, status));
                    }
                    Err(BackendError::Unavailable(msg)) => {
                        return Err(BackendError::Unavailable(msg))
                    }
                    Err(e) => outcomes.push(ServiceOutcome::failed(service, e.to_string())),
                }
            }
        }

        let whole_project = project.services().iter().all(|s| targets.contains(&s.name));
        if whole_project && outcomes.iter().all(|o| o.status.is_success()) {
            self.remove_project_networks(project).await?;
        }
        Ok(outcomes)
    }

    async fn running_services(&self, project_name: &str) -> Result<Vec<String>, BackendError> {
        let mut services: Vec<String> = Vec::new();
        for container in self
            .project_containers(project_name, true)
            .await
            .map_err(classify)?
        {
            if !services.contains(&container.service) {
                services.push(container.service);
            }
        }
        Ok(services)
    }

    async fn open_exec(
        &self,
        project_name: &str,
        service: &str,
        command_line: &str,
        options: ExecOptions,
    ) -> Result<Box<dyn ExecSession>, BackendError> {
        let container = self
            .project_containers(project_name, true)
            .await
            .map_err(classify)?
            .into_iter()
            .find(|c| c.service == service)
            .ok_or_else(|| {
                BackendError::Operation(format!("service '{}' has no running container", service))
            })?;

        let env: Vec<String> = options
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let exec = self
            .docker
            .create_exec(
                &container.id,
                CreateExecOptions {
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(options.tty),
                    env: Some(env),
                    working_dir: options.working_dir.clone(),
                    cmd: Some(vec![
                        "sh".to_string(),
                        "-c".to_string(),
                        command_line.to_string(),
                    ]),
                    ..Default::default()
                },
            )
            .await
            .map_err(classify)?;

        let started = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    tty: options.tty,
                    ..Default::default()
                }),
            )
            .await
            .map_err(classify)?;

        let attached = match started {
            StartExecResults::Attached { output, input } => (output, input),
            StartExecResults::Detached => {
                return Err(BackendError::Operation(
                    "exec started detached; no streams to attach".to_string(),
                ))
            }
        };

        debug!(exec_id = %exec.id, service = service, "Exec session opened");
        Ok(Box::new(DockerExecSession {
            docker: self.docker.clone(),
            exec_id: exec.id,
            attached: Some(attached),
            stdin_pump: None,
        }))
    }
}

type ExecOutput = Pin<Box<dyn Stream<Item = Result<LogOutput, DockerError>> + Send>>;
type ExecInput = Pin<Box<dyn AsyncWrite + Send>>;

struct DockerExecSession {
    docker: Docker,
    exec_id: String,
    attached: Option<(ExecOutput, ExecInput)>,
    stdin_pump: Option<JoinHandle<()>>,
}

#[async_trait]
impl ExecSession for DockerExecSession {
    async fn run(&mut self, io: SessionIo) -> Result<i64, BackendError> {
        let (mut output, mut input) = self.attached.take().ok_or_else(|| {
            BackendError::Operation("exec session already consumed".to_string())
        })?;
        let SessionIo {
            mut stdin,
            mut stdout,
            mut stderr,
        } = io;

        self.stdin_pump = Some(tokio::spawn(async move {
            if let Err(e) = tokio::io::copy(&mut stdin, &mut input).await {
                debug!("stdin pump stopped: {}", e);
            }
            let _ = input.shutdown().await;
        }));

        let terminal =
            |e: std::io::Error| BackendError::Operation(format!("terminal write failed: {}", e));
        while let Some(frame) = output.next().await {
            match frame.map_err(classify)? {
                LogOutput::StdErr { message } => {
                    stderr.write_all(&message).await.map_err(terminal)?;
                    stderr.flush().await.map_err(terminal)?;
                }
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    stdout.write_all(&message).await.map_err(terminal)?;
                    stdout.flush().await.map_err(terminal)?;
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        if let Some(pump) = self.stdin_pump.take() {
            pump.abort();
        }

        wait_for_exit(&self.docker, &self.exec_id).await
    }

    async fn close(mut self: Box<Self>) -> Result<(), BackendError> {
        if let Some(pump) = self.stdin_pump.take() {
            pump.abort();
        }
        // Dropping the streams closes the hijacked connection
        self.attached = None;
        debug!(exec_id = %self.exec_id, "Exec session closed");
        Ok(())
    }
}

/// The output stream can end before the daemon records the exit code, so
/// poll until the exec reports that it is no longer running.
async fn wait_for_exit(docker: &Docker, exec_id: &str) -> Result<i64, BackendError> {
    for _ in 0..EXIT_POLL_ATTEMPTS {
        let inspect = docker.inspect_exec(exec_id).await.map_err(classify)?;
        if let Some(code) = settled_exit_code(&inspect) {
            return Ok(code);
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    Err(BackendError::Operation(format!(
        "exec {} did not report an exit code",
        exec_id
    )))
}

fn settled_exit_code(inspect: &ExecInspectResponse) -> Option<i64> {
    match (inspect.running, inspect.exit_code) {
        (Some(false), Some(code)) => Some(code),
        _ => None,
    }
}

/// Server responses are per-request failures; everything else means the
/// daemon could not be reached or spoke garbage.
fn classify(error: DockerError) -> BackendError {
    match error {
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => BackendError::Operation(format!("{} (status {})", message, status_code)),
        other => BackendError::Unavailable(other.to_string()),
    }
}

pub fn container_name(project: &str, service: &str) -> String {
    format!("{}-{}-1", project, service)
}

fn network_name(project: &Project, key: &str) -> String {
    match project.networks().get(key) {
        Some(def) if def.external => key.to_string(),
        _ => project.scoped_name(key),
    }
}

fn volume_name(project: &Project, key: &str) -> String {
    match project.volumes().get(key) {
        Some(def) if def.external => key.to_string(),
        _ => project.scoped_name(key),
    }
}

/// Stable digest of a service definition, used to detect drift
pub fn config_hash(service: &ServiceDefinition) -> String {
    let encoded = serde_json::to_vec(service).unwrap_or_default();
    hex::encode(Sha256::digest(&encoded))
}

fn container_config(project: &Project, service: &ServiceDefinition) -> Config<String> {
    let mut labels: HashMap<String, String> = service
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    labels.insert(LABEL_PROJECT.to_string(), project.name().to_string());
    labels.insert(LABEL_SERVICE.to_string(), service.name.clone());
    labels.insert(LABEL_CONFIG_HASH.to_string(), config_hash(service));
    labels.insert(LABEL_CONTAINER_NUMBER.to_string(), "1".to_string());
    labels.insert(LABEL_ONEOFF.to_string(), "False".to_string());

    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &service.ports {
        let key = port.container_key();
        exposed_ports.insert(key.clone(), HashMap::new());
        if port.host_port.is_some() || port.host_ip.is_some() {
            let binding = PortBinding {
                host_ip: port.host_ip.clone(),
                host_port: port.host_port.map(|p| p.to_string()),
            };
            port_bindings
                .entry(key)
                .or_insert(None)
                .get_or_insert_with(Vec::new)
                .push(binding);
        }
    }

    let mut binds: Vec<String> = Vec::new();
    let mut anonymous: HashMap<String, HashMap<(), ()>> = HashMap::new();
    for mount in &service.volumes {
        match mount {
            VolumeMount::Named {
                volume,
                target,
                read_only,
            } => binds.push(bind_spec(&volume_name(project, volume), target, *read_only)),
            VolumeMount::Bind {
                source,
                target,
                read_only,
            } => binds.push(bind_spec(&source.display().to_string(), target, *read_only)),
            VolumeMount::Anonymous { target } => {
                anonymous.insert(target.clone(), HashMap::new());
            }
        }
    }

    let primary_network = service
        .networks
        .first()
        .map(|key| network_name(project, key))
        .unwrap_or_else(|| project.scoped_name("default"));

    let host_config = HostConfig {
        binds: (!binds.is_empty()).then_some(binds),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        restart_policy: Some(restart_policy(service.restart)),
        network_mode: Some(primary_network.clone()),
        ..Default::default()
    };

    let endpoints = HashMap::from([(
        primary_network,
        EndpointSettings {
            aliases: Some(vec![service.name.clone()]),
            ..Default::default()
        },
    )]);

    Config {
        image: Some(service.image.clone()),
        cmd: service.command.clone(),
        entrypoint: service.entrypoint.clone(),
        env: Some(service.env_pairs()),
        working_dir: service.working_dir.clone(),
        labels: Some(labels),
        tty: Some(service.tty),
        open_stdin: Some(service.stdin_open),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        volumes: (!anonymous.is_empty()).then_some(anonymous),
        host_config: Some(host_config),
        networking_config: Some(NetworkingConfig {
            endpoints_config: endpoints,
        }),
        ..Default::default()
    }
}

fn bind_spec(source: &str, target: &str, read_only: bool) -> String {
    if read_only {
        format!("{}:{}:ro", source, target)
    } else {
        format!("{}:{}", source, target)
    }
}

fn restart_policy(policy: RestartPolicy) -> DockerRestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicy::No => (RestartPolicyNameEnum::NO, None),
        RestartPolicy::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicy::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicy::OnFailure { max_retries } => (
            RestartPolicyNameEnum::ON_FAILURE,
            max_retries.map(i64::from),
        ),
    };
    DockerRestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::PortMapping;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn project_with(service: ServiceDefinition) -> Project {
        Project::new("shop", "/work", vec![service], BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn test_container_config_labels_and_network() {
        let mut service = ServiceDefinition::new("api", "api:dev");
        service.environment.insert("RUST_LOG".to_string(), "debug".to_string());
        service.restart = RestartPolicy::OnFailure { max_retries: Some(3) };
        let project = project_with(service.clone());

        let config = container_config(&project, &service);
        let labels = config.labels.unwrap();

        assert_eq!(labels[LABEL_PROJECT], "shop");
        assert_eq!(labels[LABEL_SERVICE], "api");
        assert_eq!(labels[LABEL_CONFIG_HASH], config_hash(&service));
        assert_eq!(config.env.unwrap(), vec!["RUST_LOG=debug"]);

        let host = config.host_config.unwrap();
        assert_eq!(host.network_mode.as_deref(), Some("shop_default"));
        let restart = host.restart_policy.unwrap();
        assert_eq!(restart.name, Some(RestartPolicyNameEnum::ON_FAILURE));
        assert_eq!(restart.maximum_retry_count, Some(3));
        assert!(config
            .networking_config
            .unwrap()
            .endpoints_config
            .contains_key("shop_default"));
    }

    #[test]
    fn test_container_config_ports_and_mounts() {
        let mut service = ServiceDefinition::new("db", "postgres");
        service.ports = vec![
            PortMapping::parse("5432:5432").unwrap(),
            PortMapping::parse("9187").unwrap(),
        ];
        service.volumes = vec![
            VolumeMount::Named {
                volume: "db-data".to_string(),
                target: "/var/lib/postgresql/data".to_string(),
                read_only: false,
            },
            VolumeMount::Bind {
                source: PathBuf::from("/work/init"),
                target: "/docker-entrypoint-initdb.d".to_string(),
                read_only: true,
            },
            VolumeMount::Anonymous {
                target: "/tmp/cache".to_string(),
            },
        ];
        let project = project_with(service.clone());

        let config = container_config(&project, &service);
        let host = config.host_config.unwrap();

        assert_eq!(
            host.binds.unwrap(),
            vec![
                "shop_db-data:/var/lib/postgresql/data",
                "/work/init:/docker-entrypoint-initdb.d:ro",
            ]
        );
        let bindings = host.port_bindings.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(
            bindings["5432/tcp"].as_ref().unwrap()[0].host_port.as_deref(),
            Some("5432")
        );
        assert!(config.exposed_ports.unwrap().contains_key("9187/tcp"));
        assert!(config.volumes.unwrap().contains_key("/tmp/cache"));
    }

    #[test]
    fn test_config_hash_tracks_definition() {
        let service = ServiceDefinition::new("web", "nginx:1.27");
        let mut changed = service.clone();
        changed.image = "nginx:1.28".to_string();

        assert_eq!(config_hash(&service), config_hash(&service.clone()));
        assert_ne!(config_hash(&service), config_hash(&changed));
    }

    #[test]
    fn test_classify_separates_server_and_transport_errors() {
        let server = classify(DockerError::DockerResponseServerError {
            status_code: 409,
            message: "conflict".to_string(),
        });
        assert!(matches!(server, BackendError::Operation(ref m) if m.contains("conflict")));

        let transport = classify(DockerError::RequestTimeoutError);
        assert!(matches!(transport, BackendError::Unavailable(_)));
    }

    #[test]
    fn test_exit_code_only_counts_once_exec_has_stopped() {
        let still_running = ExecInspectResponse {
            running: Some(true),
            exit_code: None,
            ..Default::default()
        };
        let shutting_down = ExecInspectResponse {
            running: Some(false),
            exit_code: None,
            ..Default::default()
        };
        let failed = ExecInspectResponse {
            running: Some(false),
            exit_code: Some(2),
            ..Default::default()
        };

        assert_eq!(settled_exit_code(&still_running), None);
        assert_eq!(settled_exit_code(&shutting_down), None);
        assert_eq!(settled_exit_code(&failed), Some(2));
    }

    #[test]
    fn test_container_name() {
        assert_eq!(container_name("shop", "api"), "shop-api-1");
    }
}
