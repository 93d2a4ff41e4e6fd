//! Audio I/O bridge: from a device callback to the engine and back
//!
//! The bridge owns the [`AudioEngine`] and one [`ChannelSource`] per channel.
//! On every device callback it pulls decoded PCM from the sources, renders a
//! block, and hands back master and cue. It knows nothing about cpal, so it
//! can be driven directly from tests or by an embedding host.
//!
//! Deadline handling: a block that takes longer than its own period
//! (`frames / sample_rate`) is replaced by silence and reported as an
//! overrun. When the number of overruns among the last 64 blocks reaches the
//! configured threshold the engine is flagged degraded; it recovers once a
//! full window passes clean.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::{AudioEngine, EngineAtomics, EngineEvent, EngineStatus};
use crate::error::{EngineError, EngineResult};
use crate::types::{ChannelId, StereoBuffer, StereoSample, MAX_BLOCK_SIZE};

/// Blocks remembered for the degraded/recovered decision
const OVERRUN_WINDOW: u32 = u64::BITS;

/// Decoded PCM for one channel
///
/// Called on the audio thread: implementations must not block or allocate.
pub trait ChannelSource: Send {
    /// Write up to `buffer.len()` frames; return how many were written
    ///
    /// Frames past the returned count are left silent by the bridge.
    fn fill(&mut self, buffer: &mut StereoBuffer) -> usize;
}

/// A channel with nothing loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct SilenceSource;

impl ChannelSource for SilenceSource {
    fn fill(&mut self, buffer: &mut StereoBuffer) -> usize {
        buffer.fill_silence();
        buffer.len()
    }
}

/// Consumer end of a PCM ring fed by a decoder thread
pub struct RingSource {
    consumer: rtrb::Consumer<StereoSample>,
}

/// Producer end of a PCM ring, owned by the decoder
pub struct RingFeeder {
    producer: rtrb::Producer<StereoSample>,
}

/// Create a PCM ring holding up to `capacity` frames
pub fn ring_source(capacity: usize) -> (RingFeeder, RingSource) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (RingFeeder { producer }, RingSource { consumer })
}

impl RingFeeder {
    /// Queue as many frames as fit; returns the number queued
    pub fn push_frames(&mut self, frames: &[StereoSample]) -> usize {
        let count = frames.len().min(self.producer.slots());
        if let Ok(mut chunk) = self.producer.write_chunk(count) {
            let (first, second) = chunk.as_mut_slices();
            let split = first.len();
            first.copy_from_slice(&frames[..split]);
            second.copy_from_slice(&frames[split..count]);
            chunk.commit_all();
        }
        count
    }

    /// Queue interleaved `[L, R, ...]` data; returns frames queued
    pub fn push_interleaved(&mut self, data: &[f32]) -> usize {
        let frames: &[StereoSample] = bytemuck::cast_slice(&data[..data.len() / 2 * 2]);
        self.push_frames(frames)
    }

    /// Free space in frames
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

impl ChannelSource for RingSource {
    fn fill(&mut self, buffer: &mut StereoBuffer) -> usize {
        let wanted = buffer.len();
        let count = wanted.min(self.consumer.slots());
        let out = buffer.as_mut_slice();
        if let Ok(chunk) = self.consumer.read_chunk(count) {
            let (first, second) = chunk.as_slices();
            out[..first.len()].copy_from_slice(first);
            out[first.len()..count].copy_from_slice(second);
            chunk.commit_all();
        }
        out[count..].fill(StereoSample::silence());
        count
    }
}

/// Drives an [`AudioEngine`] from a host callback
pub struct AudioBridge {
    engine: AudioEngine,
    atomics: Arc<EngineAtomics>,
    sources: Vec<Box<dyn ChannelSource>>,
    inputs: Vec<StereoBuffer>,
    /// Per channel: last fill came up short (reported once per starvation)
    starved: Vec<bool>,
    master: StereoBuffer,
    cue: StereoBuffer,
    sample_rate: u32,
    /// Fixed per-block budget; None = the block's own period
    deadline: Option<Duration>,
    overrun_threshold: u32,
    /// Bit i set = block (current - i) overran
    recent_overruns: u64,
    block_index: u64,
    degraded: bool,
    device_lost: bool,
}

impl AudioBridge {
    /// Wrap an engine; every channel starts on a [`SilenceSource`]
    ///
    /// Allocates all buffers; call before moving the bridge to the audio thread.
    pub fn new(engine: AudioEngine) -> Self {
        let config = engine.config();
        let channels = config.channels;
        let sample_rate = config.sample_rate;
        let overrun_threshold = config.overrun_threshold.clamp(1, OVERRUN_WINDOW);
        let atomics = Arc::clone(engine.atomics());

        Self {
            engine,
            atomics,
            sources: (0..channels)
                .map(|_| Box::new(SilenceSource) as Box<dyn ChannelSource>)
                .collect(),
            inputs: (0..channels)
                .map(|_| StereoBuffer::with_capacity(MAX_BLOCK_SIZE))
                .collect(),
            starved: vec![false; channels],
            master: StereoBuffer::with_capacity(MAX_BLOCK_SIZE),
            cue: StereoBuffer::with_capacity(MAX_BLOCK_SIZE),
            sample_rate,
            deadline: None,
            overrun_threshold,
            recent_overruns: 0,
            block_index: 0,
            degraded: false,
            device_lost: false,
        }
    }

    /// Use a fixed per-block deadline instead of the block period
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a PCM source to a channel
    pub fn set_source(&mut self, channel: ChannelId, source: Box<dyn ChannelSource>) -> EngineResult<()> {
        let slot = channel
            .index()
            .and_then(|index| self.sources.get_mut(index))
            .ok_or(EngineError::UnknownChannel(channel))?;
        *slot = source;
        Ok(())
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine {
        &mut self.engine
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn master(&self) -> &StereoBuffer {
        &self.master
    }

    pub fn cue(&self) -> &StereoBuffer {
        &self.cue
    }

    /// Render up to [`MAX_BLOCK_SIZE`] frames into the master and cue buffers
    ///
    /// Returns the number of frames rendered. On overrun or a lost device
    /// both outputs are silent for this block.
    pub fn render(&mut self, frames: usize) -> usize {
        let frames = frames.min(MAX_BLOCK_SIZE);
        self.master.set_len_from_capacity(frames);
        self.cue.set_len_from_capacity(frames);
        self.block_index += 1;

        if self.check_device_lost() {
            self.master.fill_silence();
            self.cue.fill_silence();
            return frames;
        }

        let started = Instant::now();
        self.pull_inputs(frames);
        self.engine.process(&self.inputs, &mut self.master, &mut self.cue);
        let elapsed = started.elapsed();

        let budget = self.deadline.unwrap_or_else(|| {
            Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
        });
        let overran = elapsed > budget;
        if overran {
            self.master.fill_silence();
            self.cue.fill_silence();
            self.atomics.record_overrun();
            self.engine.report(EngineEvent::Overrun { block: self.block_index });
        }
        self.track_overruns(overran);
        frames
    }

    /// Render into an interleaved device buffer with `channels` channels
    ///
    /// Master goes to the first two channels; with four or more channels
    /// cue goes to channels 3-4. Any further channels are silent.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
            let frames = chunk.len() / channels;
            self.render(frames);
            for ((frame, master), cue) in chunk
                .chunks_mut(channels)
                .zip(self.master.iter())
                .zip(self.cue.iter())
            {
                frame.fill(0.0);
                frame[0] = master.left;
                if channels > 1 {
                    frame[1] = master.right;
                }
                if channels > 3 {
                    frame[2] = cue.left;
                    frame[3] = cue.right;
                }
            }
        }
    }

    fn pull_inputs(&mut self, frames: usize) {
        for (index, (source, input)) in self.sources.iter_mut().zip(self.inputs.iter_mut()).enumerate() {
            input.set_len_from_capacity(frames);
            let written = source.fill(input).min(frames);
            let short = written < frames;
            if short && !self.starved[index] {
                if let Some(channel) = ChannelId::from_index(index) {
                    self.engine.report(EngineEvent::InputUnderrun { channel });
                }
            }
            self.starved[index] = short;
        }
    }

    fn check_device_lost(&mut self) -> bool {
        let lost = self.atomics.is_device_lost();
        if lost && !self.device_lost {
            self.engine.report(EngineEvent::DeviceLost);
            self.atomics.set_status(EngineStatus::Degraded);
        } else if !lost && self.device_lost {
            self.atomics.set_status(if self.degraded {
                EngineStatus::Degraded
            } else {
                EngineStatus::Running
            });
        }
        self.device_lost = lost;
        lost
    }

    fn track_overruns(&mut self, overran: bool) {
        self.recent_overruns = (self.recent_overruns << 1) | u64::from(overran);
        let recent = self.recent_overruns.count_ones();

        if !self.degraded && recent >= self.overrun_threshold {
            self.degraded = true;
            self.atomics.set_status(EngineStatus::Degraded);
            self.engine.report(EngineEvent::Degraded { recent_overruns: recent });
        } else if self.degraded && recent == 0 {
            self.degraded = false;
            self.atomics.set_status(EngineStatus::Running);
            self.engine.report(EngineEvent::Recovered);
        }
    }

    /// Overruns among the most recent blocks
    pub fn recent_overruns(&self) -> u32 {
        self.recent_overruns.count_ones()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}
