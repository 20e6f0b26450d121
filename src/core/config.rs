//! core::config
//!
//! Backend connection profile configuration.
//!
//! # Location
//!
//! The profile file is located at (in order of precedence):
//! 1. `$STAGEHAND_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/stagehand/config.toml`
//! 3. `~/.stagehand/config.toml` (canonical write location)
//!
//! # Credentials
//!
//! The password is never stored in the profile file. It is resolved from
//! `$STAGEHAND_PASSWORD`, or prompted interactively via `rpassword` when
//! the process has a terminal.
//!
//! # Validation
//!
//! Profile values are validated after parsing: the base URL must be http(s)
//! and the timeout must be non-zero.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "STAGEHAND_CONFIG";

/// Environment variable supplying the backend password.
pub const PASSWORD_ENV: &str = "STAGEHAND_PASSWORD";

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ReadError {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file could not be parsed.
    #[error("failed to parse config {path}: {message}")]
    ParseError {
        /// Path that failed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A config value is invalid.
    #[error("invalid config value: {0}")]
    InvalidValue(String),

    /// No config file was found at any known location.
    #[error("no config file found; create ~/.stagehand/config.toml or set ${CONFIG_PATH_ENV}")]
    NotFound,

    /// Home directory could not be determined.
    #[error("cannot determine home directory")]
    NoHomeDir,

    /// No password available from environment or prompt.
    #[error("no password available; set ${PASSWORD_ENV} or run interactively")]
    NoPassword,
}

/// Connection profile for one versioned-edit backend.
///
/// # Example
///
/// ```toml
/// base_url = "https://dev.example.com:44300"
/// user = "DEVELOPER"
/// client = "001"
/// timeout_secs = 60
/// transport = "DEVK900042"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackendProfile {
    /// Backend root URL.
    pub base_url: String,

    /// Backend user name.
    pub user: String,

    /// Optional backend client/tenant identifier.
    #[serde(default)]
    pub client: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Default transport/change-record id attached to mutating requests.
    #[serde(default)]
    pub transport: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl BackendProfile {
    /// Load the profile using the documented path precedence.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotFound`] if no file exists at any location
    /// - [`ConfigError::ReadError`] / [`ConfigError::ParseError`] on I/O or
    ///   syntax problems
    /// - [`ConfigError::InvalidValue`] if validation fails
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let path = Self::resolve_path()?;
        let profile = Self::load_from(&path)?;
        Ok((profile, path))
    }

    /// Load and validate a profile from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let profile: BackendProfile =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Resolve the config file path using the documented precedence.
    pub fn resolve_path() -> Result<PathBuf, ConfigError> {
        if let Ok(explicit) = env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(explicit));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let candidate = config_dir.join("stagehand").join("config.toml");
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        let canonical = home.join(".stagehand").join("config.toml");
        if canonical.exists() {
            return Ok(canonical);
        }

        Err(ConfigError::NotFound)
    }

    /// Validate the profile values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::InvalidValue("user cannot be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the backend password.
    ///
    /// Prefers `$STAGEHAND_PASSWORD`; if absent and `interactive` is true,
    /// prompts on the terminal.
    pub fn resolve_password(&self, interactive: bool) -> Result<String, ConfigError> {
        if let Ok(password) = env::var(PASSWORD_ENV) {
            return Ok(password);
        }
        if interactive {
            let prompt = format!("Password for {}@{}: ", self.user, self.base_url);
            return rpassword::prompt_password(prompt).map_err(|_| ConfigError::NoPassword);
        }
        Err(ConfigError::NoPassword)
    }

    /// Per-request timeout as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn load_minimal_profile() {
        let file = write_config(
            r#"
base_url = "https://dev.example.com:44300"
user = "DEVELOPER"
"#,
        );
        let profile = BackendProfile::load_from(file.path()).expect("load");
        assert_eq!(profile.base_url, "https://dev.example.com:44300");
        assert_eq!(profile.user, "DEVELOPER");
        assert_eq!(profile.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(profile.client.is_none());
        assert!(profile.transport.is_none());
    }

    #[test]
    fn load_full_profile() {
        let file = write_config(
            r#"
base_url = "http://localhost:8080"
user = "DEV"
client = "001"
timeout_secs = 10
transport = "DEVK900042"
"#,
        );
        let profile = BackendProfile::load_from(file.path()).expect("load");
        assert_eq!(profile.client.as_deref(), Some("001"));
        assert_eq!(profile.timeout_secs, 10);
        assert_eq!(profile.transport.as_deref(), Some("DEVK900042"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let file = write_config(
            r#"
base_url = "http://localhost"
user = "DEV"
unknown_field = true
"#,
        );
        assert!(matches!(
            BackendProfile::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn rejects_non_http_url() {
        let file = write_config(
            r#"
base_url = "ftp://example.com"
user = "DEV"
"#,
        );
        assert!(matches!(
            BackendProfile::load_from(file.path()),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        let file = write_config(
            r#"
base_url = "http://localhost"
user = "DEV"
timeout_secs = 0
"#,
        );
        assert!(matches!(
            BackendProfile::load_from(file.path()),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_empty_user() {
        let file = write_config(
            r#"
base_url = "http://localhost"
user = "  "
"#,
        );
        assert!(matches!(
            BackendProfile::load_from(file.path()),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            BackendProfile::load_from(Path::new("/nonexistent/config.toml")),
            Err(ConfigError::ReadError { .. })
        ));
    }
}
