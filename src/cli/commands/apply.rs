//! apply command - apply a manifest in dependency order

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::backend::Backend;
use crate::engine::{ApplyMode, BulkExecutor, BulkResult, Context, Manifest};
use crate::ui::output::{self, Verbosity};

/// Apply a manifest.
pub async fn apply(
    ctx: &Context,
    backend: Arc<dyn Backend>,
    manifest_path: &Path,
    mode: ApplyMode,
    activate: bool,
    transport: Option<String>,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let manifest = Manifest::from_path(manifest_path).context("Failed to load manifest")?;

    output::debug(
        format!(
            "applying {} records in {} mode",
            manifest.entries().len(),
            mode
        ),
        verbosity,
    );

    let executor = BulkExecutor::new(backend, mode, activate).with_transport(transport);
    match executor.run(&manifest, ctx).await {
        BulkResult::Success { report } => {
            output::print(output::format_report(&report), verbosity);
            Ok(())
        }
        BulkResult::Aborted { error, report } => {
            output::print(output::format_report(&report), verbosity);
            output::warn(
                format!("stopped after {} of {} records", report.applied.len(), report.order.len()),
                verbosity,
            );
            Err(error).context("Apply aborted")
        }
    }
}
