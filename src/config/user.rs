//! Settings loading for utsushi.
//!
//! User config location: $XDG_CONFIG_HOME/utsushi/utsushi.toml
//! Fallback: the platform config directory reported by `dirs`.

use std::path::{Path, PathBuf};

use super::Settings;
use crate::error::{UtsushiError, UtsushiResult};

const LOG_TARGET: &str = "utsushi::config";

const CONFIG_DIR_NAME: &str = "utsushi";
const CONFIG_FILE_NAME: &str = "utsushi.toml";

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/utsushi/utsushi.toml
/// 2. Otherwise: `dirs::config_dir()`/utsushi/utsushi.toml
///
/// Returns None if neither location can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load settings from a TOML file.
///
/// A missing file is not an error: it yields the defaults.
pub fn load_settings(path: &Path) -> UtsushiResult<Settings> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!(
                target: LOG_TARGET,
                "No config at {}, using defaults",
                path.display()
            );
            return Ok(Settings::default());
        }
        Err(err) => return Err(err.into()),
    };

    Settings::from_toml_str(&text)
        .map_err(|err| UtsushiError::config(format!("{}: {}", path.display(), err)))
}

/// Load the user-wide settings, or defaults when there are none.
pub fn load_user_settings() -> UtsushiResult<Settings> {
    match user_config_path() {
        Some(path) => load_settings(&path),
        None => Ok(Settings::default()),
    }
}
