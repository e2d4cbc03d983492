//! Location of the per-user credential store.
//!
//! Resolution order:
//! 1. `BBKT_CONFIG_DIR` environment variable
//! 2. `~/.config/bbkt`
//!
//! The store itself is always `credentials.json` inside that directory.

use std::path::PathBuf;

use crate::{ConfigError, Result};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "BBKT_CONFIG_DIR";

/// File name of the credential store.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Get the effective configuration directory.
pub fn config_dir() -> Result<PathBuf> {
    config_dir_with(|key| std::env::var(key).ok())
}

/// Get the credential store path.
pub fn credentials_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CREDENTIALS_FILE))
}

/// Resolve the configuration directory against an arbitrary variable lookup.
pub fn config_dir_with<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".config").join("bbkt"))
}
