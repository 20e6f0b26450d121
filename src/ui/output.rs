//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag. Step
//! progress goes to stdout; debug traces and errors to stderr.

use std::fmt::Display;

use crate::engine::BulkReport;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Render a bulk report for the terminal.
pub fn format_report(report: &BulkReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!("manifest {}", &report.fingerprint[..12.min(report.fingerprint.len())]));
    for record in &report.applied {
        lines.push(format!("  applied {} ({})", record.id, record.state));
    }
    for skipped in &report.skipped {
        lines.push(format!("  skipped {}: {}", skipped.id, skipped.reason));
    }
    if !report.cycle_ids.is_empty() {
        lines.push(format!(
            "  note: dependency cycle tolerated among {}",
            report.cycle_ids.join(", ")
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LifecycleState;
    use crate::engine::AppliedRecord;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        // Quiet wins when both are set.
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
    }

    #[test]
    fn report_lists_applied_and_skipped() {
        let report = BulkReport {
            fingerprint: "abcdef0123456789".to_string(),
            order: vec!["pkg".into(), "cls".into()],
            applied: vec![AppliedRecord {
                id: "pkg".into(),
                state: LifecycleState::Created,
            }],
            skipped: vec![],
            cycle_ids: vec![],
        };
        let rendered = format_report(&report);
        assert!(rendered.contains("manifest abcdef012345"));
        assert!(rendered.contains("applied pkg (created)"));
    }
}
