//! Audio backend configuration
//!
//! Backend selection, device selection and buffer settings. Loaded as the
//! `audio` section of the player's YAML config.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AudioError;
use crate::types::{MAX_BLOCK_SIZE, SAMPLE_RATE};

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Buffer used for [`BufferSize::LowLatency`] (~5.3 ms at 48 kHz)
pub const LOW_LATENCY_BUFFER_SIZE: u32 = 256;

/// Smallest buffer we ask a device for
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Host audio system to open the output on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioBackend {
    /// Platform default host
    #[default]
    Default,
    /// Served through the ALSA host (pulse/pipewire ALSA plugin)
    PulseAudio,
    Alsa,
    Jack,
}

impl AudioBackend {
    pub const ALL: [AudioBackend; 4] = [Self::Default, Self::PulseAudio, Self::Alsa, Self::Jack];

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::PulseAudio => "pulseaudio",
            Self::Alsa => "alsa",
            Self::Jack => "jack",
        }
    }

    /// Parse a backend name, case-insensitive
    pub fn from_name(name: &str) -> Result<Self, AudioError> {
        let lower = name.trim().to_ascii_lowercase();
        let lower = match lower.as_str() {
            "pulse" => "pulseaudio",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|backend| backend.name() == lower)
            .ok_or_else(|| AudioError::UnknownBackend(name.to_string()))
    }
}

impl fmt::Display for AudioBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioBackend {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the system choose the default buffer size
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to what the engine supports)
    Fixed(u32),
    /// Smallest buffer that is stable on typical hardware
    LowLatency,
}

impl BufferSize {
    /// Buffer size in frames, or None for system default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some((*frames).clamp(MIN_BUFFER_SIZE, MAX_BLOCK_SIZE as u32)),
            BufferSize::LowLatency => Some(LOW_LATENCY_BUFFER_SIZE),
        }
    }

    /// Block period in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate.max(1) as f32) * 1000.0)
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
/// so devices from different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "JACK", "ALSA")
    /// If None, uses the default/preferred host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Backend name: default, pulseaudio, alsa or jack
    pub backend: String,

    /// Output device (None = backend default)
    pub device: Option<DeviceId>,

    /// Preferred buffer size
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = 48 kHz when the device supports it)
    pub sample_rate: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: AudioBackend::Default.name().to_string(),
            device: None,
            buffer_size: BufferSize::default(),
            sample_rate: None,
        }
    }
}

impl AudioConfig {
    /// Validate and resolve the backend name
    pub fn backend(&self) -> Result<AudioBackend, AudioError> {
        AudioBackend::from_name(&self.backend)
    }

    /// Sample rate to ask the device for
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(SAMPLE_RATE)
    }

    /// Buffer size to ask the device for
    pub fn target_buffer_frames(&self) -> u32 {
        self.buffer_size.as_frames().unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_backend(mut self, backend: AudioBackend) -> Self {
        self.backend = backend.name().to_string();
        self
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_low_latency(mut self) -> Self {
        self.buffer_size = BufferSize::LowLatency;
        self
    }
}
