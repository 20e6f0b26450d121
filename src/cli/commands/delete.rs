//! delete command - delete one object

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::backend::Backend;
use crate::engine::Context;
use crate::lifecycle::ObjectLifecycleController;
use crate::ui::output::{self, Verbosity};

use super::read::parse_handle;

/// Delete one object.
pub async fn delete(
    ctx: &Context,
    backend: Arc<dyn Backend>,
    kind: &str,
    name: &str,
    transport: Option<String>,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let handle = parse_handle(kind, name)?;

    let mut controller =
        ObjectLifecycleController::new(backend, handle.clone()).with_transport(transport);
    controller
        .delete(&serde_json::json!({}))
        .await
        .with_context(|| format!("Failed to delete {}", handle))?;

    output::print(format!("deleted {}", handle), verbosity);
    Ok(())
}
