// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Orchestration error taxonomy
//!
//! Every failure the orchestrator or session bridge can return, with enough
//! structure for the caller to tell the kinds apart. Nothing here retries.

use crate::domain::backend::BackendError;
use crate::domain::lifecycle::LifecycleReport;
use crate::domain::topology::TopologyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("service(s) not found in project '{project}': {}", .services.join(", "))]
    ServiceNotFound {
        project: String,
        services: Vec<String>,
    },

    #[error("service '{service}' is not running in project '{project}'")]
    ServiceNotRunning { project: String, service: String },

    #[error("container backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("{report}")]
    PartialFailure { report: LifecycleReport },

    #[error("operation cancelled")]
    Cancelled,

    /// Backend refused a request that cannot be attributed to a single service
    #[error("backend error: {0}")]
    Backend(String),
}

impl OrchestratorError {
    /// Short kind label for operator-facing messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Topology(_) => "TopologyError",
            Self::ServiceNotFound { .. } => "ServiceNotFoundError",
            Self::ServiceNotRunning { .. } => "ServiceNotRunningError",
            Self::BackendUnavailable(_) => "BackendUnavailableError",
            Self::PartialFailure { .. } => "PartialFailureError",
            Self::Cancelled => "CancelledError",
            Self::Backend(_) => "BackendError",
        }
    }

    pub(crate) fn from_backend(project: &str, error: BackendError) -> Self {
        match error {
            BackendError::Unavailable(msg) => Self::BackendUnavailable(msg),
            BackendError::ServiceNotFound(service) => Self::ServiceNotFound {
                project: project.to_string(),
                services: vec![service],
            },
            BackendError::Operation(msg) => Self::Backend(msg),
        }
    }
}
