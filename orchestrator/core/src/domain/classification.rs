// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service Classifier
//!
//! Tags every service as user-facing (`primary`) or supporting
//! infrastructure (`auxiliary`) from its name alone. Data containers,
//! one-shot initialisers and bare servers are hidden from default listings
//! and from interactive selection, but remain addressable by explicit name.

use crate::domain::project::Project;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffixes that mark a service as auxiliary unless configured otherwise
pub const DEFAULT_AUXILIARY_SUFFIXES: [&str; 3] = ["-data", "-init", "-server"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Primary,
    Auxiliary,
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Auxiliary => write!(f, "auxiliary"),
        }
    }
}

/// One classified service, in project declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedService {
    pub name: String,
    pub role: ServiceRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceClassifier {
    suffixes: Vec<String>,
}

impl Default for ServiceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_AUXILIARY_SUFFIXES)
    }
}

impl ServiceClassifier {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn role_of(&self, service_name: &str) -> ServiceRole {
        if self.suffixes.iter().any(|sfx| service_name.ends_with(sfx.as_str())) {
            ServiceRole::Auxiliary
        } else {
            ServiceRole::Primary
        }
    }

    /// Classify every service of the project. Pure: the project is not touched
    /// and repeated calls return identical results.
    pub fn classify(&self, project: &Project) -> Vec<ClassifiedService> {
        project
            .services()
            .iter()
            .map(|service| ClassifiedService {
                name: service.name.clone(),
                role: self.role_of(&service.name),
            })
            .collect()
    }

    /// Names offered for listing and interactive selection
    pub fn primary_services(&self, project: &Project) -> Vec<String> {
        self.classify(project)
            .into_iter()
            .filter(|c| c.role == ServiceRole::Primary)
            .map(|c| c.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::ServiceDefinition;
    use std::collections::BTreeMap;

    fn project(names: &[&str]) -> Project {
        Project::new(
            "demo",
            "/tmp",
            names.iter().map(|n| ServiceDefinition::new(*n, "busybox")).collect(),
            BTreeMap::new(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_default_markers() {
        let classifier = ServiceClassifier::default();

        assert_eq!(classifier.role_of("cache-data"), ServiceRole::Auxiliary);
        assert_eq!(classifier.role_of("db-init"), ServiceRole::Auxiliary);
        assert_eq!(classifier.role_of("mock-server"), ServiceRole::Auxiliary);
        assert_eq!(classifier.role_of("api"), ServiceRole::Primary);
        assert_eq!(classifier.role_of("worker"), ServiceRole::Primary);
        // suffix test only, not substring
        assert_eq!(classifier.role_of("data-api"), ServiceRole::Primary);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let p = project(&["web", "web-data", "web-init"]);
        let classifier = ServiceClassifier::default();

        let first = classifier.classify(&p);
        let second = classifier.classify(&p);

        assert_eq!(first, second);
        assert_eq!(classifier.primary_services(&p), vec!["web"]);
    }

    #[test]
    fn test_custom_markers_override_defaults() {
        let classifier = ServiceClassifier::new(["-sidecar", ""]);

        assert_eq!(classifier.suffixes(), ["-sidecar".to_string()]);
        assert_eq!(classifier.role_of("log-sidecar"), ServiceRole::Auxiliary);
        assert_eq!(classifier.role_of("cache-data"), ServiceRole::Primary);
    }
}
