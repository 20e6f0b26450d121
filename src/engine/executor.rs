//! engine::executor
//!
//! The bulk apply executor.
//!
//! # Executor Contract
//!
//! The executor MUST:
//! 1. Schedule records in dependency order before any mutation
//! 2. Apply records strictly sequentially, one in-flight request at a time
//! 3. Stop at the first failed record and report the applied prefix
//! 4. In upsert mode, retry a failed create chain exactly once as update
//! 5. Force-unlock a failed record's controller before stopping
//!
//! # Invariants
//!
//! - A record is applied only after everything it depends on
//! - The applied prefix is durable and self-consistent on abort
//! - Cycle tolerance is a reportable note, never a failure
//!
//! # Example
//!
//! ```ignore
//! let executor = BulkExecutor::new(backend, ApplyMode::Upsert, true);
//! match executor.run(&manifest, &ctx).await {
//!     BulkResult::Success { report } => {
//!         println!("applied {} records", report.applied.len());
//!     }
//!     BulkResult::Aborted { error, report } => {
//!         println!("stopped after {} records: {}", report.applied.len(), error);
//!     }
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::manifest::{Manifest, ManifestEntry, ManifestError, SkippedEntry};
use super::Context;
use crate::backend::Backend;
use crate::core::graph::DependencyGraph;
use crate::core::types::{LifecycleState, ObjectVersion};
use crate::lifecycle::{LifecycleError, ObjectLifecycleController};

/// How the executor treats each manifest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Full chain: validate, create, then push source if present.
    #[default]
    Create,
    /// Objects already exist: start at lock, push source.
    Update,
    /// Try the create chain; on any failure retry once as update.
    Upsert,
}

impl std::fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyMode::Create => write!(f, "create"),
            ApplyMode::Update => write!(f, "update"),
            ApplyMode::Upsert => write!(f, "upsert"),
        }
    }
}

/// Errors that stop a bulk run.
#[derive(Debug, Error)]
pub enum BulkError {
    /// The manifest could not be loaded.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// One record's lifecycle chain failed.
    #[error("record '{id}' failed: {source}")]
    ObjectFailed {
        /// Record id
        id: String,
        /// The failing lifecycle step
        source: LifecycleError,
    },

    /// An upsert record failed both attempts.
    #[error("record '{id}' failed as create ({create}) and as update ({update})")]
    UpsertFailed {
        /// Record id
        id: String,
        /// First-attempt failure
        create: LifecycleError,
        /// Retry failure
        update: LifecycleError,
    },
}

/// One successfully applied record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    /// Record id.
    pub id: String,
    /// Final controller state.
    pub state: LifecycleState,
}

/// What a bulk run did, success or not.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    /// Hex sha256 of the manifest bytes.
    pub fingerprint: String,
    /// The scheduled execution order.
    pub order: Vec<String>,
    /// Records applied, in order. On abort this is the durable prefix.
    pub applied: Vec<AppliedRecord>,
    /// Records the manifest excluded from execution.
    pub skipped: Vec<SkippedEntry>,
    /// Ids involved in dependency cycles, if any were tolerated.
    pub cycle_ids: Vec<String>,
}

/// Result of a bulk run.
#[derive(Debug)]
pub enum BulkResult {
    /// Every scheduled record applied.
    Success {
        /// Run report.
        report: BulkReport,
    },

    /// A record failed; everything before it is applied.
    Aborted {
        /// The failure that stopped the run.
        error: BulkError,
        /// Run report up to the failure.
        report: BulkReport,
    },
}

impl BulkResult {
    /// Check if the run applied everything.
    pub fn is_success(&self) -> bool {
        matches!(self, BulkResult::Success { .. })
    }

    /// The report, whichever way the run ended.
    pub fn report(&self) -> &BulkReport {
        match self {
            BulkResult::Success { report } => report,
            BulkResult::Aborted { report, .. } => report,
        }
    }
}

/// The bulk executor.
///
/// Applies a manifest record-by-record in dependency order. This is the
/// single pathway for multi-object mutations.
pub struct BulkExecutor {
    backend: Arc<dyn Backend>,
    mode: ApplyMode,
    activate: bool,
    transport: Option<String>,
}

impl BulkExecutor {
    /// Create an executor.
    pub fn new(backend: Arc<dyn Backend>, mode: ApplyMode, activate: bool) -> Self {
        Self {
            backend,
            mode,
            activate,
            transport: None,
        }
    }

    /// Attach a transport id to every mutating step.
    pub fn with_transport(mut self, transport: Option<String>) -> Self {
        self.transport = transport;
        self
    }

    /// Run the manifest.
    ///
    /// Applies records strictly sequentially in scheduler order; stops at
    /// the first failure and reports the applied prefix.
    pub async fn run(&self, manifest: &Manifest, ctx: &Context) -> BulkResult {
        let schedule = DependencyGraph::from_nodes(manifest.nodes()).execution_order();

        let mut report = BulkReport {
            fingerprint: manifest.fingerprint().to_string(),
            order: schedule.order().to_vec(),
            applied: Vec::new(),
            skipped: manifest.skipped().to_vec(),
            cycle_ids: schedule.cycle_ids().to_vec(),
        };
        if ctx.debug && schedule.had_cycle() {
            eprintln!(
                "[debug] dependency cycle tolerated among: {}",
                report.cycle_ids.join(", ")
            );
        }

        for id in report.order.clone() {
            // Scheduled ids come from the manifest's own nodes.
            let Some(entry) = manifest.entry(&id) else {
                continue;
            };
            if ctx.debug {
                eprintln!("[debug] applying {} ({})", entry.id, entry.handle);
            }

            match self.apply_one(entry).await {
                Ok(state) => {
                    report.applied.push(AppliedRecord { id, state });
                }
                Err(error) => {
                    return BulkResult::Aborted { error, report };
                }
            }
        }

        BulkResult::Success { report }
    }

    /// Apply one record per the configured mode.
    async fn apply_one(&self, entry: &ManifestEntry) -> Result<LifecycleState, BulkError> {
        match self.mode {
            ApplyMode::Create => self.apply_create(entry).await.map_err(|e| {
                BulkError::ObjectFailed {
                    id: entry.id.clone(),
                    source: e,
                }
            }),
            ApplyMode::Update => self.apply_update(entry).await.map_err(|e| {
                BulkError::ObjectFailed {
                    id: entry.id.clone(),
                    source: e,
                }
            }),
            ApplyMode::Upsert => {
                let create = match self.apply_create(entry).await {
                    Ok(state) => return Ok(state),
                    Err(e) => e,
                };
                // One retry, as update, after any create-chain failure.
                match self.apply_update(entry).await {
                    Ok(state) => Ok(state),
                    Err(update) => Err(BulkError::UpsertFailed {
                        id: entry.id.clone(),
                        create,
                        update,
                    }),
                }
            }
        }
    }

    fn controller(&self, entry: &ManifestEntry) -> ObjectLifecycleController {
        ObjectLifecycleController::new(self.backend.clone(), entry.handle.clone())
            .with_transport(self.transport.clone())
    }

    /// Full chain: validate, create, then push source if the record has one.
    async fn apply_create(&self, entry: &ManifestEntry) -> Result<LifecycleState, LifecycleError> {
        let mut controller = self.controller(entry);
        let outcome = async {
            controller.validate(&entry.config).await?;
            controller.create(&entry.config).await?;
            if entry.source.is_some() {
                self.push_source(&mut controller, entry).await?;
            }
            Ok(())
        }
        .await;
        self.finish(controller, outcome).await
    }

    /// Edit chain only: the object must already exist. Records without a
    /// source body are a no-op here.
    async fn apply_update(&self, entry: &ManifestEntry) -> Result<LifecycleState, LifecycleError> {
        let mut controller = self.controller(entry);
        if entry.source.is_none() {
            return Ok(controller.state());
        }
        let outcome = self.push_source(&mut controller, entry).await;
        self.finish(controller, outcome).await
    }

    async fn push_source(
        &self,
        controller: &mut ObjectLifecycleController,
        entry: &ManifestEntry,
    ) -> Result<(), LifecycleError> {
        let Some(source) = entry.source.as_deref() else {
            return Ok(());
        };
        controller.lock().await?;
        controller.update(source).await?;
        controller.check(ObjectVersion::Inactive, None).await?;
        controller.unlock().await?;
        Ok(())
    }

    /// Activate on success if requested; always release anything still
    /// held on failure so the abort leaves no dangling locks.
    async fn finish(
        &self,
        mut controller: ObjectLifecycleController,
        outcome: Result<(), LifecycleError>,
    ) -> Result<LifecycleState, LifecycleError> {
        match outcome {
            Ok(()) => {
                if self.activate && controller.result(crate::core::types::Step::Update).is_some() {
                    if let Err(e) = controller.activate().await {
                        controller.force_unlock().await;
                        return Err(e);
                    }
                }
                Ok(controller.state())
            }
            Err(e) => {
                controller.force_unlock().await;
                Err(e)
            }
        }
    }
}
