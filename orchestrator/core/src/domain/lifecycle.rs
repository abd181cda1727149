// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lifecycle and session request values
//!
//! Ephemeral values built per CLI invocation, consumed once by the
//! orchestrator or the session bridge, then discarded.

use crate::domain::backend::{ExecOptions, ServiceOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleOperation {
    Up,
    Down,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// One up/down request. An empty target list means every service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRequest {
    pub operation: LifecycleOperation,
    pub targets: Vec<String>,
}

impl LifecycleRequest {
    pub fn up<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(LifecycleOperation::Up, targets)
    }

    pub fn down<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(LifecycleOperation::Down, targets)
    }

    fn new<I, S>(operation: LifecycleOperation, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for target in targets {
            let target = target.into();
            if !deduped.contains(&target) {
                deduped.push(target);
            }
        }
        Self {
            operation,
            targets: deduped,
        }
    }

    pub fn targets_all(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Per-service outcome of one lifecycle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub operation: LifecycleOperation,
    pub outcomes: Vec<ServiceOutcome>,
}

impl LifecycleReport {
    pub fn new(operation: LifecycleOperation, outcomes: Vec<ServiceOutcome>) -> Self {
        Self { operation, outcomes }
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> Vec<&ServiceOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_success()).collect()
    }

    pub fn failed(&self) -> Vec<&ServiceOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.status.is_success())
    }
}

impl fmt::Display for LifecycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&str> = self.failed().iter().map(|o| o.service.as_str()).collect();
        let succeeded: Vec<&str> = self.succeeded().iter().map(|o| o.service.as_str()).collect();
        write!(
            f,
            "{} failed for [{}]; succeeded for [{}]",
            self.operation,
            failed.join(", "),
            succeeded.join(", ")
        )
    }
}

/// One interactive attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub service: String,
    pub command_line: String,
    pub options: ExecOptions,
}

impl SessionRequest {
    pub fn new(service: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            command_line: command_line.into(),
            options: ExecOptions {
                tty: true,
                ..Default::default()
            },
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.options.working_dir = Some(dir.into());
        self
    }

    pub fn with_tty(mut self, tty: bool) -> Self {
        self.options.tty = tty;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backend::OutcomeStatus;

    #[test]
    fn test_request_dedupes_targets() {
        let req = LifecycleRequest::up(["web", "db", "web"]);

        assert_eq!(req.targets, vec!["web", "db"]);
        assert!(!req.targets_all());
        assert!(LifecycleRequest::down(Vec::<String>::new()).targets_all());
    }

    #[test]
    fn test_report_splits_outcomes() {
        let report = LifecycleReport::new(
            LifecycleOperation::Up,
            vec![
                ServiceOutcome::new("db", OutcomeStatus::Started),
                ServiceOutcome::failed("web", "image not found"),
                ServiceOutcome::new("cache", OutcomeStatus::AlreadyRunning),
            ],
        );

        assert!(report.has_failures());
        assert_eq!(report.succeeded().len(), 2);
        assert_eq!(report.failed()[0].service, "web");
        assert_eq!(
            report.to_string(),
            "up failed for [web]; succeeded for [db, cache]"
        );
    }

    #[test]
    fn test_session_request_defaults_to_tty() {
        let req = SessionRequest::new("web", "echo hi").with_working_dir("/srv");

        assert!(req.options.tty);
        assert_eq!(req.options.working_dir.as_deref(), Some("/srv"));
        assert!(!req.with_tty(false).options.tty);
    }
}
