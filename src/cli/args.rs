//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this profile file instead of the default
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output; implies no password prompt

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::core::types::ObjectVersion;
use crate::engine::ApplyMode;

/// Stagehand - lifecycle and bulk-apply tooling for versioned backend objects
#[derive(Parser, Debug)]
#[command(name = "sth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this profile file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Whether a password prompt may be shown.
    ///
    /// True only when stdin is a terminal and `--quiet` is not set;
    /// otherwise the password must come from the environment.
    pub fn interactive(&self) -> bool {
        !self.quiet && std::io::stdin().is_terminal()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a manifest of objects in dependency order
    #[command(
        name = "apply",
        long_about = "Apply a manifest of objects in dependency order.\n\n\
            Loads a flat or tree manifest, schedules its records so every \
            object is applied after the objects it depends on, and drives \
            each record through the edit lifecycle. Execution is strictly \
            sequential and stops at the first failure; everything applied \
            before the failure stays applied.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Create every object in the manifest, then activate the sources
    sth apply --manifest objects.json --activate

    # Push new sources to objects that already exist
    sth apply --manifest objects.json --mode update

    # Create-or-update, whichever each object needs
    sth apply --manifest objects.json --mode upsert"
    )]
    Apply {
        /// Manifest file to apply
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,

        /// How to treat each record
        #[arg(long, value_enum, default_value_t = ApplyModeArg::Create)]
        mode: ApplyModeArg,

        /// Activate pushed sources after a successful edit chain
        #[arg(long)]
        activate: bool,

        /// Transport/change-record id for mutating steps
        #[arg(long, value_name = "ID")]
        transport: Option<String>,
    },

    /// Print the execution order a manifest would be applied in
    #[command(name = "order")]
    Order {
        /// Manifest file to schedule
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,
    },

    /// Read one object's source, metadata, or transport assignment
    #[command(name = "read")]
    Read {
        /// Object kind (e.g. class, package, table)
        kind: String,

        /// Object name
        name: String,

        /// Which stored version to read
        #[arg(long, value_enum, default_value_t = VersionArg::Active)]
        version: VersionArg,

        /// Read metadata instead of source
        #[arg(long, conflicts_with = "transport")]
        metadata: bool,

        /// Read the transport assignment instead of source
        #[arg(long)]
        transport: bool,
    },

    /// Delete one object
    #[command(name = "delete")]
    Delete {
        /// Object kind (e.g. class, package, table)
        kind: String,

        /// Object name
        name: String,

        /// Transport/change-record id for the deletion
        #[arg(long, value_name = "ID")]
        transport: Option<String>,
    },

    /// Show the resolved connection profile
    #[command(name = "config")]
    Config {
        /// Print only the profile file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completion scripts
    #[command(name = "completion")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Apply mode argument.
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum ApplyModeArg {
    /// Validate and create, then push sources
    Create,
    /// Objects exist; push sources only
    Update,
    /// Create, falling back to update per object
    Upsert,
}

impl From<ApplyModeArg> for ApplyMode {
    fn from(arg: ApplyModeArg) -> Self {
        match arg {
            ApplyModeArg::Create => ApplyMode::Create,
            ApplyModeArg::Update => ApplyMode::Update,
            ApplyModeArg::Upsert => ApplyMode::Upsert,
        }
    }
}

/// Object version argument.
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum VersionArg {
    /// The live version
    Active,
    /// The staged draft
    Inactive,
}

impl From<VersionArg> for ObjectVersion {
    fn from(arg: VersionArg) -> Self {
        match arg {
            VersionArg::Active => ObjectVersion::Active,
            VersionArg::Inactive => ObjectVersion::Inactive,
        }
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_parses_mode_and_flags() {
        let cli = Cli::try_parse_from([
            "sth", "apply", "--manifest", "m.json", "--mode", "upsert", "--activate",
        ])
        .unwrap();
        let Command::Apply {
            manifest,
            mode,
            activate,
            transport,
        } = cli.command
        else {
            panic!("expected apply");
        };
        assert_eq!(manifest, PathBuf::from("m.json"));
        assert!(matches!(mode, ApplyModeArg::Upsert));
        assert!(activate);
        assert!(transport.is_none());
    }

    #[test]
    fn read_defaults_to_active_source() {
        let cli = Cli::try_parse_from(["sth", "read", "class", "zcl_demo"]).unwrap();
        let Command::Read {
            version, metadata, ..
        } = cli.command
        else {
            panic!("expected read");
        };
        assert!(matches!(version, VersionArg::Active));
        assert!(!metadata);
    }

    #[test]
    fn metadata_and_transport_reads_conflict() {
        let result =
            Cli::try_parse_from(["sth", "read", "class", "zcl_demo", "--metadata", "--transport"]);
        assert!(result.is_err());
    }
}
