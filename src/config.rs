// src/config.rs

//! Configuration loading utilities.
//!
//! The storage directory holds `config.toml` next to the JSON tables.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;

pub const CONFIG_FILE: &str = "config.toml";

/// Location of the config file inside a storage directory.
pub fn config_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join(CONFIG_FILE)
}

/// Load the config for a storage directory and validate it.
///
/// A missing or unreadable file falls back to defaults; invalid values are an error.
pub fn load_all(storage_dir: &Path) -> Result<Config> {
    let config = Config::load_or_default(config_path(storage_dir));
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;
    Ok(config)
}
