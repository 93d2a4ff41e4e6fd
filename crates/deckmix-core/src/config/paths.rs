//! Standard locations for deckmix configuration files

use std::path::PathBuf;

/// Configuration directory
///
/// Returns `$XDG_CONFIG_HOME/deckmix` (or the platform equivalent),
/// falling back to `./.deckmix` when no config dir is known.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("deckmix"))
        .unwrap_or_else(|| PathBuf::from(".deckmix"))
}

/// Path of a named file inside the configuration directory
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// Directory holding controller mapping profiles
pub fn default_profile_dir() -> PathBuf {
    default_config_dir().join("profiles")
}
