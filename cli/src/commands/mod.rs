// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the insta CLI

pub mod completions;
pub mod connect;
pub mod down;
pub mod services;
pub mod up;
pub mod update;

pub use self::completions::CompletionsArgs;
pub use self::connect::ConnectArgs;
pub use self::down::DownArgs;
pub use self::services::ServicesArgs;
pub use self::up::UpArgs;
pub use self::update::UpdateArgs;

use colored::Colorize;
use insta_core::domain::backend::{OutcomeStatus, ServiceOutcome};
use insta_core::domain::lifecycle::LifecycleReport;

/// Width of the service column so outcome tables line up
fn name_width(outcomes: &[ServiceOutcome]) -> usize {
    outcomes.iter().map(|o| o.service.len()).max().unwrap_or(0)
}

pub(crate) fn format_outcome(outcome: &ServiceOutcome, width: usize) -> String {
    let (marker, status) = match &outcome.status {
        OutcomeStatus::Started => ("✓".green(), "started".green()),
        OutcomeStatus::AlreadyRunning => ("•".cyan(), "already running".cyan()),
        OutcomeStatus::Stopped => ("✓".green(), "stopped".green()),
        OutcomeStatus::Removed => ("✓".green(), "removed".dimmed()),
        OutcomeStatus::Failed(reason) => ("✗".red(), format!("failed: {}", reason).red()),
    };
    format!("  {} {:<width$}  {}", marker, outcome.service, status, width = width)
}

/// Print one line per service outcome
pub fn print_report(report: &LifecycleReport) {
    let width = name_width(&report.outcomes);
    for outcome in &report.outcomes {
        println!("{}", format_outcome(outcome, width));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_outcome_aligns_names() {
        colored::control::set_override(false);
        let outcomes = vec![
            ServiceOutcome::new("db", OutcomeStatus::Started),
            ServiceOutcome::failed("mock-server", "image not found"),
        ];
        let width = name_width(&outcomes);

        assert_eq!(format_outcome(&outcomes[0], width), "  ✓ db           started");
        assert_eq!(
            format_outcome(&outcomes[1], width),
            "  ✗ mock-server  failed: image not found"
        );
    }
}
