// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology Loader contract
//!
//! Turns raw topology text into a [`Project`]. Loading is a single atomic,
//! side-effect-free call; a malformed topology is fatal at startup and is
//! never retried.

use crate::domain::project::Project;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("malformed topology: {0}")]
    Yaml(String),

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{service}' references undeclared {kind} '{name}'")]
    UnresolvedReference {
        service: String,
        kind: &'static str,
        name: String,
    },

    #[error("service '{0}' declares neither an image nor a build context")]
    MissingImage(String),

    #[error("invalid project name '{0}': use lowercase letters, digits, '-' and '_'")]
    InvalidProjectName(String),

    #[error("service '{service}': invalid {field}: {reason}")]
    InvalidField {
        service: String,
        field: &'static str,
        reason: String,
    },

    #[error("failed to read topology {path}: {error}")]
    Io { path: String, error: String },
}

pub trait TopologyLoader: Send + Sync {
    /// Parse `text`, resolving relative paths against `working_dir`.
    /// `project_name` overrides any name declared in the text.
    fn load(
        &self,
        text: &str,
        working_dir: &Path,
        project_name: Option<&str>,
    ) -> Result<Project, TopologyError>;
}
