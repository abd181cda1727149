// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Top-level error reporting
//!
//! Every command error ends up here. Orchestration errors are printed with
//! their kind and, for partial failures, the per-service outcome table.

use colored::Colorize;
use insta_core::domain::error::OrchestratorError;

use crate::commands::print_report;

/// Render an error for the operator. Returns the exit code to use.
pub fn report_error(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<OrchestratorError>() {
        Some(OrchestratorError::PartialFailure { report }) => {
            eprintln!(
                "{} {}",
                "✗ PartialFailureError:".red().bold(),
                format!("{} failed", report.operation)
            );
            print_report(report);
        }
        Some(inner) => {
            eprintln!("{} {}", format!("✗ {}:", inner.kind()).red().bold(), inner);
        }
        None => {
            eprintln!("{} {}", "✗ Error:".red().bold(), error);
            for cause in error.chain().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
        }
    }
    match error.downcast_ref::<OrchestratorError>() {
        Some(OrchestratorError::Cancelled) => 130,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_exits_like_sigint() {
        let err = anyhow::Error::new(OrchestratorError::Cancelled);
        assert_eq!(report_error(&err), 130);
    }

    #[test]
    fn test_wrapped_orchestration_error_is_found() {
        let err = anyhow::Error::new(OrchestratorError::ServiceNotRunning {
            project: "shop".to_string(),
            service: "web-data".to_string(),
        })
        .context("connect failed");

        assert!(err.downcast_ref::<OrchestratorError>().is_some());
        assert_eq!(report_error(&err), 1);
    }
}
