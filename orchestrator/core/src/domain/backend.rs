// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container Backend contract
//!
//! The capability that actually creates, starts, stops and executes inside
//! containers. The orchestration core only ever talks to a backend through
//! [`ContainerBackend`], which is injected at construction so tests can
//! substitute a fake.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Port (Hexagonal Architecture) for the container runtime
//! - **Implementations:** `infrastructure::docker_backend`, `infrastructure::in_memory_backend`

use crate::domain::project::Project;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Container was created and/or started by this request
    Started,
    /// Container was already running; nothing was changed
    AlreadyRunning,
    /// Running container was stopped and removed
    Stopped,
    /// Exited container was removed
    Removed,
    Failed(String),
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::AlreadyRunning => write!(f, "already running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Removed => write!(f, "removed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of one service within a batched start/stop request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOutcome {
    pub service: String,
    pub status: OutcomeStatus,
}

impl ServiceOutcome {
    pub fn new(service: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            service: service.into(),
            status,
        }
    }

    pub fn failed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(service, OutcomeStatus::Failed(reason.into()))
    }
}

/// Options for an interactive execution inside a running service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    pub working_dir: Option<String>,
    pub tty: bool,
    pub env: BTreeMap<String, String>,
}

/// Standard streams wired into an exec session
pub struct SessionIo {
    pub stdin: Box<dyn AsyncRead + Send + Unpin>,
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl SessionIo {
    pub fn new(
        stdin: impl AsyncRead + Send + Unpin + 'static,
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// The calling process' own terminal streams
    pub fn inherit() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr())
    }
}

impl fmt::Debug for SessionIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIo").finish_non_exhaustive()
    }
}

/// One backend exec context. Exactly one command runs per session.
#[async_trait]
pub trait ExecSession: Send {
    /// Stream the command's stdio until it terminates; returns its exit code
    async fn run(&mut self, io: SessionIo) -> Result<i64, BackendError>;

    /// Release every backend resource held by the session. Must be safe to
    /// call after `run` completed, failed, or was abandoned mid-stream.
    async fn close(self: Box<Self>) -> Result<(), BackendError>;
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure: the backend could not be reached
    #[error("container backend unavailable: {0}")]
    Unavailable(String),
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    /// The backend answered but refused or failed the request
    #[error("backend operation failed: {0}")]
    Operation(String),
}

#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Reconcile `targets` to running. Every name in `targets` is addressed by
    /// this single call; the backend owns dependency ordering and may include
    /// outcomes for dependencies it started on the way.
    async fn start(
        &self,
        project: &Project,
        targets: &[String],
    ) -> Result<Vec<ServiceOutcome>, BackendError>;

    /// Stop and remove the containers of `targets`. Services with nothing to
    /// stop produce no outcome.
    async fn stop(
        &self,
        project: &Project,
        targets: &[String],
    ) -> Result<Vec<ServiceOutcome>, BackendError>;

    /// Services of the project namespace that currently have a running container
    async fn running_services(&self, project_name: &str) -> Result<Vec<String>, BackendError>;

    /// Open an exec context running `command_line` inside `service`
    async fn open_exec(
        &self,
        project_name: &str,
        service: &str,
        command_line: &str,
        options: ExecOptions,
    ) -> Result<Box<dyn ExecSession>, BackendError>;
}
