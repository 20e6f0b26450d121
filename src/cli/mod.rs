//! cli
//!
//! Command-line interface layer for stagehand.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Does NOT issue backend requests directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! the [`crate::engine`] and [`crate::lifecycle`] layers; every backend
//! mutation flows through a lifecycle controller.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::engine;
use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let ctx = engine::Context {
        debug: cli.debug,
        quiet: cli.quiet,
    };
    let interactive = cli.interactive();

    commands::dispatch(cli.command, cli.config.as_deref(), interactive, &ctx).await
}
