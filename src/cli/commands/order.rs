//! order command - print a manifest's execution order

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::core::graph::DependencyGraph;
use crate::engine::{Context, Manifest};
use crate::ui::output::{self, Verbosity};

/// Print the order `apply` would use, without touching the backend.
pub fn order(ctx: &Context, manifest_path: &Path) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let manifest = Manifest::from_path(manifest_path).context("Failed to load manifest")?;
    let schedule = DependencyGraph::from_nodes(manifest.nodes()).execution_order();

    for id in schedule.order() {
        // Scheduled ids always come from the manifest itself.
        if let Some(entry) = manifest.entry(id) {
            println!("{}  {}", id, entry.handle);
        }
    }
    for skipped in manifest.skipped() {
        output::warn(
            format!("skipping {}: {}", skipped.id, skipped.reason),
            verbosity,
        );
    }
    if schedule.had_cycle() {
        output::warn(
            format!(
                "dependency cycle tolerated among: {}",
                schedule.cycle_ids().join(", ")
            ),
            verbosity,
        );
    }
    Ok(())
}
