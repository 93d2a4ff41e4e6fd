//! Audio I/O for deckmix
//!
//! The [`AudioBridge`] sits between a host callback and the engine: it pulls
//! decoded PCM from per-channel sources, renders a block, enforces the block
//! deadline and reports overruns. The cpal backend (feature `cpal-backend`)
//! only opens a device and moves the bridge into its callback.
//!
//! # Example Usage
//!
//! ```ignore
//! use deckmix_core::audio::{open_output, AudioBridge, AudioConfig};
//! use deckmix_core::engine::AudioEngine;
//!
//! let plan = open_output(&AudioConfig::default())?;
//! let (engine, mut handle) = AudioEngine::new(EngineConfig {
//!     sample_rate: plan.sample_rate(),
//!     ..Default::default()
//! });
//! let _output = plan.start(AudioBridge::new(engine))?;
//!
//! handle.set_crossfader(0.0)?;
//! let meters = handle.meter_snapshot();
//! ```

mod bridge;
mod config;
mod error;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
#[cfg(feature = "cpal-backend")]
mod device;

pub use bridge::{ring_source, AudioBridge, ChannelSource, RingFeeder, RingSource, SilenceSource};
pub use config::{
    AudioBackend, AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, LOW_LATENCY_BUFFER_SIZE,
    MIN_BUFFER_SIZE,
};
pub use error::{AudioError, AudioResult};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{open_output, AudioOutput, OutputPlan};
#[cfg(feature = "cpal-backend")]
pub use device::{available_output_devices, find_output_device, host_for_backend, list_output_devices};
