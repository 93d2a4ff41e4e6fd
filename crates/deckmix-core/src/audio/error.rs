//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or running an audio output
#[derive(Error, Debug)]
pub enum AudioError {
    /// Backend name in the configuration is not one we know
    #[error("Unknown audio backend: {0} (expected default, pulseaudio, alsa or jack)")]
    UnknownBackend(String),

    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Device rate differs from the rate the engine was configured for
    #[error("Sample rate mismatch: engine={engine}Hz, device={device}Hz")]
    SampleRateMismatch { engine: u32, device: u32 },
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
