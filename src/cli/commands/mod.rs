//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine or a lifecycle controller to do the work
//! 3. Formats and displays output
//!
//! Handlers do NOT issue backend requests directly; every mutation flows
//! through a lifecycle controller.

mod apply;
mod completion;
mod config_cmd;
mod delete;
mod order;
mod read;

pub use apply::apply;
pub use completion::completion;
pub use config_cmd::show as config_show;
pub use delete::delete;
pub use order::order;
pub use read::read;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::backend::{Backend, HttpBackend};
use crate::cli::args::Command;
use crate::core::config::BackendProfile;
use crate::engine::Context;

/// Connect to the configured backend.
///
/// Also returns the profile's default transport id, used when a command
/// does not pass `--transport` explicitly.
fn connect(
    config_path: Option<&Path>,
    interactive: bool,
) -> Result<(Arc<dyn Backend>, Option<String>)> {
    let profile = match config_path {
        Some(p) => BackendProfile::load_from(p),
        None => BackendProfile::load().map(|(profile, _)| profile),
    }
    .context("Failed to load connection profile")?;
    let password = profile
        .resolve_password(interactive)
        .context("No backend password available")?;
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&profile, password));
    Ok((backend, profile.transport))
}

/// Dispatch a parsed command to its handler.
pub async fn dispatch(
    command: Command,
    config_path: Option<&Path>,
    interactive: bool,
    ctx: &Context,
) -> Result<()> {
    match command {
        Command::Apply {
            manifest,
            mode,
            activate,
            transport,
        } => {
            let (backend, default_transport) = connect(config_path, interactive)?;
            let transport = transport.or(default_transport);
            apply(ctx, backend, &manifest, mode.into(), activate, transport).await
        }
        Command::Order { manifest } => order(ctx, &manifest),
        Command::Read {
            kind,
            name,
            version,
            metadata,
            transport,
        } => {
            let (backend, _) = connect(config_path, interactive)?;
            read(backend, &kind, &name, version.into(), metadata, transport).await
        }
        Command::Delete {
            kind,
            name,
            transport,
        } => {
            let (backend, default_transport) = connect(config_path, interactive)?;
            let transport = transport.or(default_transport);
            delete(ctx, backend, &kind, &name, transport).await
        }
        Command::Config { path } => config_show(config_path, path),
        Command::Completion { shell } => completion(shell),
    }
}
