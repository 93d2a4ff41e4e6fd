//! Player configuration for deckmix-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/deckmix/config.yaml

use std::path::{Path, PathBuf};

use anyhow::Result;
use deckmix_core::audio::AudioConfig;
use deckmix_core::config::{default_config_path as config_file, load_config_strict, EngineConfig};
use deckmix_midi::MidiConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckmixConfig {
    /// Mixer layout, tempo and effect limits
    pub engine: EngineConfig,
    /// Backend, device and buffer size
    pub audio: AudioConfig,
    /// Controller ports and mapping profile
    pub midi: MidiConfig,
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    config_file(CONFIG_FILE)
}

/// Load the config named on the command line, or the default one
///
/// An explicitly named file must exist and parse; the default location
/// falls back to defaults when missing or broken.
pub fn load(path: Option<&Path>) -> Result<DeckmixConfig> {
    match path {
        Some(path) => load_config_strict(path),
        None => Ok(deckmix_core::config::load_config(&default_config_path())),
    }
}
