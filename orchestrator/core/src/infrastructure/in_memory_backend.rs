// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory container backend
//!
//! Deterministic stand-in for a real container runtime. It keeps the set of
//! running services per project, records every call it receives, and exposes
//! knobs to simulate start failures, an unreachable backend, and starts or
//! exec sessions that never finish. Used by tests and by anything that wants to
//! exercise orchestration without a container engine.

use crate::domain::backend::{
    BackendError, ContainerBackend, ExecOptions, ExecSession, OutcomeStatus, ServiceOutcome,
    SessionIo,
};
use crate::domain::project::Project;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Start { project: String, targets: Vec<String> },
    Stop { project: String, targets: Vec<String> },
    RunningServices { project: String },
    OpenExec {
        project: String,
        service: String,
        command_line: String,
        options: ExecOptions,
    },
}

impl BackendCall {
    /// Whether the call can change backend state
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Start { .. } | Self::Stop { .. } | Self::OpenExec { .. })
    }
}

#[derive(Debug, Clone)]
struct ScriptedExec {
    stdout: String,
    exit_code: i64,
}

#[derive(Debug, Default)]
struct State {
    /// project -> running services, in start order
    running: HashMap<String, Vec<String>>,
    calls: Vec<BackendCall>,
    failing: HashSet<String>,
    unavailable: bool,
    hang_start: bool,
    hang_exec: bool,
    scripts: HashMap<String, ScriptedExec>,
    open_sessions: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start of `service` fail
    pub fn fail_service(&self, service: impl Into<String>) {
        self.state.lock().failing.insert(service.into());
    }

    /// Simulate a backend that cannot be reached
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Make `start` block until the caller gives up on it
    pub fn hang_start(&self, hang: bool) {
        self.state.lock().hang_start = hang;
    }

    /// Make exec sessions block until cancelled
    pub fn hang_exec(&self, hang: bool) {
        self.state.lock().hang_exec = hang;
    }

    /// Output and exit code returned for a given command line
    pub fn script_exec(&self, command_line: impl Into<String>, stdout: impl Into<String>, exit_code: i64) {
        self.state.lock().scripts.insert(
            command_line.into(),
            ScriptedExec {
                stdout: stdout.into(),
                exit_code,
            },
        );
    }

    /// Mark a service running without going through `start`
    pub fn mark_running(&self, project: &str, service: impl Into<String>) {
        let mut state = self.state.lock();
        let running = state.running.entry(project.to_string()).or_default();
        let service = service.into();
        if !running.contains(&service) {
            running.push(service);
        }
    }

    pub fn running(&self, project: &str) -> Vec<String> {
        self.state
            .lock()
            .running
            .get(project)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.is_mutation()).count()
    }

    /// Exec sessions opened but not yet closed
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }

    fn check_available(state: &State) -> Result<(), BackendError> {
        if state.unavailable {
            return Err(BackendError::Unavailable(
                "connection refused (simulated)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerBackend for InMemoryBackend {
    async fn start(
        &self,
        project: &Project,
        targets: &[String],
    ) -> Result<Vec<ServiceOutcome>, BackendError> {
        let hang = {
            let mut state = self.state.lock();
            Self::check_available(&state)?;
            state.calls.push(BackendCall::Start {
                project: project.name().to_string(),
                targets: targets.to_vec(),
            });
            state.hang_start
        };
        if let Some(unknown) = project.unknown_services(targets).first() {
            return Err(BackendError::ServiceNotFound(unknown.to_string()));
        }
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        let mut outcomes = Vec::new();
        let mut failed: HashSet<String> = HashSet::new();
        for service in project.dependency_order(targets) {
            if let Some(dep) = project.failed_dependency(&service, &failed) {
                failed.insert(service.clone());
                outcomes.push(ServiceOutcome::failed(
                    service,
                    format!("dependency '{}' failed to start", dep),
                ));
                continue;
            }
            if state.failing.contains(&service) {
                failed.insert(service.clone());
                outcomes.push(ServiceOutcome::failed(service, "simulated start failure"));
                continue;
            }

            let running = state.running.entry(project.name().to_string()).or_default();
            if running.contains(&service) {
                outcomes.push(ServiceOutcome::new(service, OutcomeStatus::AlreadyRunning));
            } else {
                running.push(service.clone());
                outcomes.push(ServiceOutcome::new(service, OutcomeStatus::Started));
            }
        }
        Ok(outcomes)
    }

    async fn stop(
        &self,
        project: &Project,
        targets: &[String],
    ) -> Result<Vec<ServiceOutcome>, BackendError> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.calls.push(BackendCall::Stop {
            project: project.name().to_string(),
            targets: targets.to_vec(),
        });

        let mut order = project.dependency_order(&project.service_names());
        order.reverse();
        let running = state.running.entry(project.name().to_string()).or_default();
        let mut outcomes = Vec::new();
        for service in order.into_iter().filter(|s| targets.contains(s)) {
            if let Some(pos) = running.iter().position(|r| *r == service) {
                running.remove(pos);
                outcomes.push(ServiceOutcome::new(service, OutcomeStatus::Stopped));
            }
        }
        Ok(outcomes)
    }

    async fn running_services(&self, project_name: &str) -> Result<Vec<String>, BackendError> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.calls.push(BackendCall::RunningServices {
            project: project_name.to_string(),
        });
        Ok(state.running.get(project_name).cloned().unwrap_or_default())
    }

    async fn open_exec(
        &self,
        project_name: &str,
        service: &str,
        command_line: &str,
        options: ExecOptions,
    ) -> Result<Box<dyn ExecSession>, BackendError> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.calls.push(BackendCall::OpenExec {
            project: project_name.to_string(),
            service: service.to_string(),
            command_line: command_line.to_string(),
            options,
        });
        let is_running = state
            .running
            .get(project_name)
            .map(|r| r.iter().any(|s| s == service))
            .unwrap_or(false);
        if !is_running {
            return Err(BackendError::Operation(format!(
                "service '{}' has no running container",
                service
            )));
        }

        let script = state.scripts.get(command_line).cloned().unwrap_or(ScriptedExec {
            stdout: String::new(),
            exit_code: 0,
        });
        state.open_sessions += 1;
        Ok(Box::new(InMemorySession {
            state: self.state.clone(),
            script,
            hang: state.hang_exec,
        }))
    }
}

struct InMemorySession {
    state: Arc<Mutex<State>>,
    script: ScriptedExec,
    hang: bool,
}

#[async_trait]
impl ExecSession for InMemorySession {
    async fn run(&mut self, mut io: SessionIo) -> Result<i64, BackendError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        io.stdout
            .write_all(self.script.stdout.as_bytes())
            .await
            .map_err(|e| BackendError::Operation(e.to_string()))?;
        io.stdout
            .flush()
            .await
            .map_err(|e| BackendError::Operation(e.to_string()))?;
        Ok(self.script.exit_code)
    }

    async fn close(self: Box<Self>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
        Ok(())
    }
}
