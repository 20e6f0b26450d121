//! read command - read one object's source, metadata, or transport

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::backend::Backend;
use crate::core::types::{ObjectHandle, ObjectKind, ObjectName, ObjectVersion};
use crate::lifecycle::ObjectLifecycleController;

/// Read one object.
pub async fn read(
    backend: Arc<dyn Backend>,
    kind: &str,
    name: &str,
    version: ObjectVersion,
    metadata: bool,
    transport: bool,
) -> Result<()> {
    let handle = parse_handle(kind, name)?;
    let mut controller = ObjectLifecycleController::new(backend, handle);

    let result = if metadata {
        controller.read_metadata().await?
    } else if transport {
        controller.read_transport().await?
    } else {
        controller.read(version).await?
    };

    // Source bodies decode to a plain JSON string; print them verbatim.
    match result.data.as_str() {
        Some(text) => println!("{}", text),
        None => println!("{}", serde_json::to_string_pretty(&result.data)?),
    }
    Ok(())
}

pub(super) fn parse_handle(kind: &str, name: &str) -> Result<ObjectHandle> {
    let kind = ObjectKind::parse(kind).context("Unknown object kind")?;
    let name = ObjectName::new(name).context("Invalid object name")?;
    Ok(ObjectHandle::new(kind, name))
}
