//! config command - show the resolved connection profile

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::core::config::BackendProfile;

/// Show the resolved profile, or only its path.
pub fn show(config_path: Option<&Path>, path_only: bool) -> Result<()> {
    if path_only {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => BackendProfile::resolve_path().context("No profile file found")?,
        };
        println!("{}", path.display());
        return Ok(());
    }

    let profile = match config_path {
        Some(p) => BackendProfile::load_from(p),
        None => BackendProfile::load().map(|(profile, _)| profile),
    }
    .context("Failed to load profile")?;

    // The profile never contains the password, so this is safe to print.
    print!(
        "{}",
        toml::to_string_pretty(&profile).context("Failed to render profile")?
    );
    Ok(())
}
