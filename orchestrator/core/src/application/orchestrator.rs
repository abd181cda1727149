// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lifecycle Orchestrator
//!
//! Executes bring-up and bring-down requests against the injected
//! [`ContainerBackend`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Translate a lifecycle request into one batched backend call
//!
//! The orchestrator is stateless between calls: it never caches whether a
//! service is up. Each call re-derives the target set from the project and
//! asks the backend to reconcile, so the backend stays the single source of
//! truth. Target names are validated before any backend call, which means an
//! unknown name never causes a backend mutation. No call is ever retried.

use crate::domain::backend::{BackendError, ContainerBackend, ServiceOutcome};
use crate::domain::error::OrchestratorError;
use crate::domain::lifecycle::{LifecycleOperation, LifecycleReport, LifecycleRequest};
use crate::domain::project::Project;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct LifecycleOrchestrator {
    backend: Arc<dyn ContainerBackend>,
}

impl LifecycleOrchestrator {
    pub fn new(backend: Arc<dyn ContainerBackend>) -> Self {
        Self { backend }
    }

    /// Dispatch a lifecycle request built by the caller
    pub async fn execute(
        &self,
        project: &Project,
        request: &LifecycleRequest,
        cancel: &CancellationToken,
    ) -> Result<LifecycleReport, OrchestratorError> {
        match request.operation {
            LifecycleOperation::Up => self.bring_up(project, &request.targets, cancel).await,
            LifecycleOperation::Down => self.bring_down(project, &request.targets, cancel).await,
        }
    }

    /// Start `targets` (every service when empty). Already-running services
    /// are reported as such rather than failing.
    pub async fn bring_up(
        &self,
        project: &Project,
        targets: &[String],
        cancel: &CancellationToken,
    ) -> Result<LifecycleReport, OrchestratorError> {
        let Some(targets) = resolve_targets(project, targets)? else {
            return Ok(LifecycleReport::new(LifecycleOperation::Up, Vec::new()));
        };

        info!(project = project.name(), services = ?targets, "Bringing services up");
        let outcomes = run_cancellable(
            project.name(),
            cancel,
            self.backend.start(project, &targets),
        )
        .await?;

        finish(LifecycleOperation::Up, outcomes)
    }

    /// Stop and remove `targets` (every service when empty). Services with
    /// nothing to stop are skipped, so tearing down an idle project succeeds
    /// with an empty report.
    pub async fn bring_down(
        &self,
        project: &Project,
        targets: &[String],
        cancel: &CancellationToken,
    ) -> Result<LifecycleReport, OrchestratorError> {
        let Some(targets) = resolve_targets(project, targets)? else {
            return Ok(LifecycleReport::new(LifecycleOperation::Down, Vec::new()));
        };

        info!(project = project.name(), services = ?targets, "Bringing services down");
        let outcomes = run_cancellable(
            project.name(),
            cancel,
            self.backend.stop(project, &targets),
        )
        .await?;

        finish(LifecycleOperation::Down, outcomes)
    }
}

/// Validate requested names and expand an empty request to the full service
/// set. `None` means the project has no services and nothing should be sent.
fn resolve_targets(
    project: &Project,
    requested: &[String],
) -> Result<Option<Vec<String>>, OrchestratorError> {
    let unknown = project.unknown_services(requested);
    if !unknown.is_empty() {
        return Err(OrchestratorError::ServiceNotFound {
            project: project.name().to_string(),
            services: unknown.into_iter().map(str::to_string).collect(),
        });
    }

    if project.is_empty() {
        debug!(project = project.name(), "Project declares no services, nothing to do");
        return Ok(None);
    }

    if requested.is_empty() {
        return Ok(Some(project.service_names()));
    }

    let mut targets: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        if !targets.contains(name) {
            targets.push(name.clone());
        }
    }
    Ok(Some(targets))
}

/// Await a backend call unless the caller cancels first. Backend-side effects
/// already issued are left for the backend to settle.
pub(crate) async fn run_cancellable<T, F>(
    project: &str,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, OrchestratorError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(project = project, "Operation cancelled while waiting for the backend");
            Err(OrchestratorError::Cancelled)
        }
        result = call => result.map_err(|e| OrchestratorError::from_backend(project, e)),
    }
}

fn finish(
    operation: LifecycleOperation,
    outcomes: Vec<ServiceOutcome>,
) -> Result<LifecycleReport, OrchestratorError> {
    let report = LifecycleReport::new(operation, outcomes);
    if report.has_failures() {
        warn!(%report, "Lifecycle request partially failed");
        return Err(OrchestratorError::PartialFailure { report });
    }
    info!(operation = %operation, count = report.outcomes.len(), "Lifecycle request completed");
    Ok(report)
}
