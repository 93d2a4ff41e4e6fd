//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │  (EngineHandle)  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ Relaxed atomics, event ring               ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  EngineAtomics   │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │    per-block writes │  (owns AudioBridge) │
//! └──────────────────┘                     └─────────────────────┘
//! ```
//!
//! Opening an output is two steps: [`open_output`] picks the device and
//! negotiates rate and buffer size, so the engine can be built for the rate
//! the device actually runs at; [`OutputPlan::start`] then moves the bridge
//! into the callback. The callback owns the bridge outright, no lock.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig, StreamError};

use super::bridge::AudioBridge;
use super::config::AudioConfig;
use super::device::{find_output_device, host_for_backend};
use super::error::{AudioError, AudioResult};

/// A device with its negotiated stream parameters, not yet running
pub struct OutputPlan {
    device: cpal::Device,
    device_name: String,
    stream_config: StreamConfig,
    buffer_size: u32,
}

impl OutputPlan {
    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn channels(&self) -> u16 {
        self.stream_config.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Build the stream, hand it the bridge and start playback
    pub fn start(self, mut bridge: AudioBridge) -> AudioResult<AudioOutput> {
        let sample_rate = self.sample_rate();
        if bridge.sample_rate() != sample_rate {
            return Err(AudioError::SampleRateMismatch {
                engine: bridge.sample_rate(),
                device: sample_rate,
            });
        }

        let channels = self.stream_config.channels as usize;
        let atomics = bridge.engine().atomics().clone();

        let stream = self
            .device
            .build_output_stream(
                &self.stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    bridge.render_interleaved(data, channels);
                },
                move |err| {
                    log::error!("audio: stream error: {}", err);
                    if matches!(err, StreamError::DeviceNotAvailable) {
                        atomics.mark_device_lost();
                    }
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!(
            "audio: stream started on {} ({} channels, {}Hz, {} frames)",
            self.device_name,
            channels,
            sample_rate,
            self.buffer_size
        );

        Ok(AudioOutput {
            _stream: stream,
            sample_rate,
            buffer_size: self.buffer_size,
        })
    }
}

/// Keeps the output stream alive; drop to stop audio
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioOutput {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Pick the output device and negotiate its stream parameters
pub fn open_output(config: &AudioConfig) -> AudioResult<OutputPlan> {
    let backend = config.backend()?;
    let host = host_for_backend(backend);
    let device = find_output_device(&host, config.device.as_ref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("audio: using {} on {:?} (backend {})", device_name, host.id(), backend);

    let (stream_config, buffer_size) = output_config(&device, config)?;
    log::info!(
        "audio: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        stream_config.sample_rate.0,
        buffer_size,
        buffer_size as f32 / stream_config.sample_rate.0 as f32 * 1000.0
    );

    Ok(OutputPlan {
        device,
        device_name,
        stream_config,
        buffer_size,
    })
}

/// Best f32 stereo configuration for a device
///
/// Prefers the requested rate (48 kHz by default); falls back to the
/// highest rate the device offers.
fn output_config(device: &cpal::Device, config: &AudioConfig) -> AudioResult<(StreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let target = config.target_sample_rate();
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target)
    };

    let best = supported
        .iter()
        .find(|c| c.channels() >= 2 && in_range(c))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::UnsupportedFormat("device has no f32 output configuration".to_string()))?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "audio: device doesn't support {}Hz, falling back to {}Hz",
            target,
            fallback.0
        );
        fallback
    };

    let buffer_size = config.target_buffer_frames();
    log::debug!("audio: buffer size {} frames for {:?}", buffer_size, config.buffer_size);

    let stream_config = StreamConfig {
        channels: best.channels(),
        sample_rate,
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };
    Ok((stream_config, buffer_size))
}
