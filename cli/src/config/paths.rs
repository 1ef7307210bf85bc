//! Platform-specific path utilities for mediactl.

use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Get the configuration directory for mediactl.
///
/// - Linux: `~/.config/mediactl`
/// - macOS: `~/Library/Application Support/mediactl`
/// - Windows: `%APPDATA%\mediactl`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("mediactl"))
}

/// Get the data directory for mediactl.
///
/// - Linux: `~/.local/share/mediactl`
/// - macOS: `~/Library/Application Support/mediactl`
/// - Windows: `%APPDATA%\mediactl`
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| AppError::Config("Cannot determine data directory".to_string()))?;
    Ok(base.join("mediactl"))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default location of the persisted credential.
///
/// Falls back to `auth_token.json` in the working directory when no data
/// directory can be determined.
pub fn default_token_file() -> PathBuf {
    data_dir().map_or_else(
        |_| PathBuf::from("auth_token.json"),
        |dir| dir.join("auth_token.json"),
    )
}
