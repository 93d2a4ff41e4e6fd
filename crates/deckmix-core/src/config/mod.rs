//! Shared configuration for deckmix applications
//!
//! - Generic YAML config loading/saving
//! - Standard config paths
//! - [`EngineConfig`], the startup shape of the mixing engine
//!
//! ```ignore
//! use deckmix_core::config::{load_config, default_config_path, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path("engine.yaml"));
//! ```

mod io;
mod paths;

pub use io::{load_config, load_config_strict, save_config};
pub use paths::{default_config_dir, default_config_path, default_profile_dir};

use serde::{Deserialize, Serialize};

use crate::engine::CrossfaderCurve;
use crate::types::{CrossfaderAssign, InputSource, DEFAULT_CHANNELS, MAX_CHANNELS, SAMPLE_RATE};

/// Initial per-channel routing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub input: InputSource,
    pub crossfader: CrossfaderAssign,
}

/// Engine startup configuration
///
/// Everything here is fixed for the lifetime of an [`AudioEngine`](crate::engine::AudioEngine);
/// the channel count in particular sizes every pre-allocated buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of channel strips (1..=8)
    pub channels: usize,
    pub sample_rate: u32,
    /// Tempo of the internal clock at startup
    pub initial_bpm: f64,
    /// Maximum number of effect units enabled at once across all slots
    pub max_active_effects: usize,
    /// Taps older than this are forgotten
    pub tap_window_ms: u64,
    /// Overruns within the recent-block window before status turns degraded
    pub overrun_threshold: u32,
    pub crossfader_curve: CrossfaderCurve,
    /// Per-channel routing; missing entries use defaults
    pub channel_setup: Vec<ChannelConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: SAMPLE_RATE,
            initial_bpm: 128.0,
            max_active_effects: 4,
            tap_window_ms: 2000,
            overrun_threshold: 8,
            crossfader_curve: CrossfaderCurve::default(),
            channel_setup: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Bring out-of-range values back to something the engine can run with
    ///
    /// Logs every adjustment. Called by `AudioEngine::new`, so a hand-edited
    /// config never produces an engine with zero channels or a zero rate.
    pub fn sanitized(mut self) -> Self {
        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            let clamped = self.channels.clamp(1, MAX_CHANNELS);
            log::warn!("config: channels={} out of range, using {}", self.channels, clamped);
            self.channels = clamped;
        }
        if self.sample_rate == 0 {
            log::warn!("config: sample_rate=0, using {}", SAMPLE_RATE);
            self.sample_rate = SAMPLE_RATE;
        }
        if !(self.initial_bpm.is_finite() && self.initial_bpm > 0.0) {
            log::warn!("config: initial_bpm={} invalid, using 128", self.initial_bpm);
            self.initial_bpm = 128.0;
        }
        if self.tap_window_ms == 0 {
            self.tap_window_ms = 2000;
        }
        if self.overrun_threshold == 0 {
            self.overrun_threshold = 1;
        }
        self
    }

    /// Routing for a zero-based channel index
    pub fn channel(&self, index: usize) -> ChannelConfig {
        self.channel_setup.get(index).copied().unwrap_or_default()
    }
}
