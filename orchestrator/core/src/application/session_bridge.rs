// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Interactive Session Bridge
//!
//! Attaches one command, with terminal-attached stdio, to a running service.
//! Each attach opens exactly one backend exec context and closes it on every
//! exit path: command completion, backend failure, or cancellation. Attaching
//! never starts a service implicitly.

use crate::application::orchestrator::run_cancellable;
use crate::domain::backend::{ContainerBackend, SessionIo};
use crate::domain::error::OrchestratorError;
use crate::domain::lifecycle::{ExecutionResult, SessionRequest};
use crate::domain::project::Project;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct SessionBridge {
    backend: Arc<dyn ContainerBackend>,
}

impl SessionBridge {
    pub fn new(backend: Arc<dyn ContainerBackend>) -> Self {
        Self { backend }
    }

    pub async fn attach(
        &self,
        project: &Project,
        request: SessionRequest,
        io: SessionIo,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, OrchestratorError> {
        let project_name = project.name();

        if !project.contains(&request.service) {
            return Err(OrchestratorError::ServiceNotFound {
                project: project_name.to_string(),
                services: vec![request.service],
            });
        }

        let running = run_cancellable(
            project_name,
            cancel,
            self.backend.running_services(project_name),
        )
        .await?;
        if !running.iter().any(|s| *s == request.service) {
            return Err(OrchestratorError::ServiceNotRunning {
                project: project_name.to_string(),
                service: request.service,
            });
        }

        info!(
            project = project_name,
            service = %request.service,
            command = %request.command_line,
            "Attaching session"
        );
        let mut session = run_cancellable(
            project_name,
            cancel,
            self.backend.open_exec(
                project_name,
                &request.service,
                &request.command_line,
                request.options.clone(),
            ),
        )
        .await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(service = %request.service, "Session cancelled");
                Err(OrchestratorError::Cancelled)
            }
            result = session.run(io) => result
                .map(|exit_code| ExecutionResult { exit_code })
                .map_err(|e| OrchestratorError::from_backend(project_name, e)),
        };

        if let Err(e) = session.close().await {
            warn!(service = %request.service, "Failed to release exec session: {}", e);
        } else {
            debug!(service = %request.service, "Exec session released");
        }

        if let Ok(result) = &outcome {
            info!(service = %request.service, exit_code = result.exit_code, "Session finished");
        }
        outcome
    }
}
