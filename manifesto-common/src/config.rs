//! Configuration file discovery and TOML loading
//!
//! Bootstrap configuration follows the usual priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file in the platform config directory
//! 4. Compiled defaults (fallback)
//!
//! This module only covers locating and parsing the file; each binary
//! owns its own `Deserialize` structs and defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "manifesto";

/// Config file name inside [`APP_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve which config file to read
///
/// Priority: explicit path (CLI) > environment variable > platform default.
/// Returns `None` when no candidate exists on disk; a missing config file
/// is never an error, the caller falls back to compiled defaults.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_file()
}

/// Platform default config file, if one exists
///
/// Linux: `~/.config/manifesto/config.toml`, then `/etc/manifesto/config.toml`.
/// Other platforms: the `dirs` config directory only.
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML file into `T`
///
/// Errors when the file cannot be read or does not parse.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let value = toml::from_str(&content)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(value)
}

/// Parse a TOML file into `T`, falling back to `T::default()`
///
/// A missing file is logged and replaced by defaults; a file that exists
/// but fails to parse is still an error.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) if path.exists() => load_toml(path),
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(T::default())
        }
        None => Ok(T::default()),
    }
}
