//! Configuration file discovery and loading
//!
//! Bootstrap settings live in a small TOML file. Its location is resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SOMS_CONFIG` environment variable
//! 3. User config directory (`~/.config/soms/<file>` on Linux)
//! 4. System config directory (`/etc/soms/<file>`, unix only)
//!
//! A missing file is not an error: callers fall back to built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SOMS_CONFIG";

/// Resolve which config file should be read, if any.
///
/// Explicit locations (CLI, environment) are returned even if the file does
/// not exist so the loader can report it; discovered locations are only
/// returned when present on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("soms").join(file_name)) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System config directory
    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/soms").join(file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML config file into `T`, falling back to `T::default()`.
///
/// - `None` or a nonexistent file: warning + defaults
/// - Unreadable or malformed file: `Error::Config`
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} does not exist, using built-in defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content).map_err(|e| {
        Error::Config(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}
