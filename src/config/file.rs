//! Configuration file loading.

use crate::config::{Config, validate_config};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load configuration from a TOML file.
///
/// Returns default config if the file does not exist.
pub fn load_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load and validate configuration from `explicit` or the platform path.
///
/// Falls back to defaults if no config directory can be determined.
pub fn load_default_config(explicit: Option<&Path>) -> Result<Config> {
    let config = match super::config_file_path(explicit) {
        Ok(path) => load_config_file(&path)?,
        Err(_) => Config::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to a TOML file.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| Error::ConfigSerialize { source: e })?;

    std::fs::write(path, contents).map_err(|e| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save configuration to `explicit` or the platform path.
pub fn save_default_config(config: &Config, explicit: Option<&Path>) -> Result<PathBuf> {
    let path = super::config_file_path(explicit)?;
    save_config(config, &path)?;
    Ok(path)
}
