//! engine
//!
//! Multi-object orchestration: load a manifest, schedule it, apply it.
//!
//! The flow for every bulk command is uniform:
//!
//! ```text
//! Load manifest -> Schedule -> Apply (sequential) -> Report
//! ```
//!
//! The executor never mutates the backend outside a per-object lifecycle
//! controller, and it applies exactly one record at a time.

pub mod executor;
pub mod manifest;

pub use executor::{ApplyMode, AppliedRecord, BulkError, BulkExecutor, BulkReport, BulkResult};
pub use manifest::{Manifest, ManifestEntry, ManifestError, RestoreStatus, SkippedEntry};

/// Execution context for commands.
///
/// Global settings derived from CLI flags that affect command behavior.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}
