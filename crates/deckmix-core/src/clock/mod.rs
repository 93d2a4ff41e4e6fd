//! Sample clock and transport
//!
//! The clock is the single timebase of the engine. It advances by whole
//! blocks on the audio thread and hands every processor a
//! [`TransportSnapshot`] describing where the block starts, so beat-locked
//! effects never read a tempo that changes mid-block.

mod tap;

pub use tap::{TapResult, TapTempo, TAP_MAX_BPM, TAP_MIN_BPM};

use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::types::{ChannelId, MAX_CHANNELS, SAMPLE_RATE};

/// Highest tempo the clock accepts
pub const MAX_BPM: f64 = 999.0;

/// Which clock governs beat-locked processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMaster {
    /// The engine's own tempo (set directly or by tap)
    #[default]
    Internal,
    /// The tempo reported for the track playing on a channel
    Channel(ChannelId),
}

impl SyncMaster {
    /// Compact encoding for atomics: 0 = internal, n = channel n
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Internal => 0,
            Self::Channel(id) => id.number(),
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Internal,
            n => Self::Channel(ChannelId(n)),
        }
    }
}

/// Immutable view of the transport at the start of a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub bpm: f64,
    /// Position within the current beat, in [0, 1)
    pub beat_phase: f64,
    /// Whole beats elapsed since the clock started
    pub beat_count: u64,
    pub sync_master: SyncMaster,
    /// Frames elapsed since the clock started
    pub sample_position: u64,
    pub sample_rate: u32,
}

impl TransportSnapshot {
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.bpm
    }

    /// Duration of `beats` at the snapshot tempo, in milliseconds
    pub fn beats_to_ms(&self, beats: f64) -> f64 {
        beats * 60_000.0 / self.bpm
    }
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self {
            bpm: 128.0,
            beat_phase: 0.0,
            beat_count: 0,
            sync_master: SyncMaster::Internal,
            sample_position: 0,
            sample_rate: SAMPLE_RATE,
        }
    }
}

pub(crate) fn validate_bpm(bpm: f64) -> EngineResult<f64> {
    if bpm.is_finite() && bpm > 0.0 && bpm <= MAX_BPM {
        Ok(bpm)
    } else {
        Err(EngineError::InvalidBpm(bpm))
    }
}

/// Block-driven beat clock
pub struct SampleClock {
    sample_rate: u32,
    bpm: f64,
    beat_phase: f64,
    beat_count: u64,
    sample_position: u64,
    sync_master: SyncMaster,
    pending_sync_master: Option<SyncMaster>,
    /// Track tempo per channel, reported by whoever loads the track
    channel_bpm: [Option<f64>; MAX_CHANNELS],
    tap: TapTempo,
}

impl SampleClock {
    pub fn new(sample_rate: u32, bpm: f64, tap_window: Duration) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            bpm: validate_bpm(bpm).unwrap_or(128.0),
            beat_phase: 0.0,
            beat_count: 0,
            sample_position: 0,
            sync_master: SyncMaster::Internal,
            pending_sync_master: None,
            channel_bpm: [None; MAX_CHANNELS],
            tap: TapTempo::new(tap_window),
        }
    }

    /// Advance by one block and describe the block's starting position
    ///
    /// A pending sync-master change takes effect here, before the snapshot
    /// is taken. Phase moves by `frames / sample_rate * bpm / 60` beats.
    pub fn advance(&mut self, frames: usize) -> TransportSnapshot {
        if let Some(master) = self.pending_sync_master.take() {
            self.sync_master = master;
        }

        let bpm = self.effective_bpm();
        let snapshot = TransportSnapshot {
            bpm,
            beat_phase: self.beat_phase,
            beat_count: self.beat_count,
            sync_master: self.sync_master,
            sample_position: self.sample_position,
            sample_rate: self.sample_rate,
        };

        let delta = frames as f64 / self.sample_rate as f64 * bpm / 60.0;
        let total = self.beat_phase + delta;
        let whole = total.floor();
        self.beat_phase = total - whole;
        self.beat_count += whole as u64;
        self.sample_position += frames as u64;

        snapshot
    }

    /// Snapshot of the current position without advancing
    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            bpm: self.effective_bpm(),
            beat_phase: self.beat_phase,
            beat_count: self.beat_count,
            sync_master: self.pending_sync_master.unwrap_or(self.sync_master),
            sample_position: self.sample_position,
            sample_rate: self.sample_rate,
        }
    }

    /// Set the internal tempo; invalid values leave the previous tempo in place
    pub fn set_bpm(&mut self, bpm: f64) -> EngineResult<()> {
        self.bpm = validate_bpm(bpm)?;
        Ok(())
    }

    /// Shift the internal tempo by `delta` BPM
    pub fn nudge_bpm(&mut self, delta: f64) -> EngineResult<()> {
        self.set_bpm(self.bpm + delta)
    }

    /// Register a tap; on a valid estimate the internal tempo follows it
    pub fn tap_tempo(&mut self, timestamp: Duration) -> TapResult {
        let result = self.tap.tap(timestamp);
        if let TapResult::Tempo(bpm) = result {
            self.bpm = bpm;
        }
        result
    }

    /// Queue a sync-master change for the next block boundary
    pub fn set_sync_master(&mut self, master: SyncMaster) {
        self.pending_sync_master = Some(master);
    }

    /// Record the tempo of the material playing on a channel (`None` = unknown)
    pub fn set_channel_bpm(&mut self, channel: ChannelId, bpm: Option<f64>) -> EngineResult<()> {
        let index = channel
            .index()
            .filter(|&i| i < MAX_CHANNELS)
            .ok_or(EngineError::UnknownChannel(channel))?;
        self.channel_bpm[index] = match bpm {
            Some(value) => Some(validate_bpm(value)?),
            None => None,
        };
        Ok(())
    }

    /// Tempo currently driving the transport
    ///
    /// A channel master without a known track tempo falls back to the internal tempo.
    pub fn effective_bpm(&self) -> f64 {
        match self.sync_master {
            SyncMaster::Internal => self.bpm,
            SyncMaster::Channel(id) => id
                .index()
                .and_then(|i| self.channel_bpm.get(i).copied().flatten())
                .unwrap_or(self.bpm),
        }
    }

    pub fn internal_bpm(&self) -> f64 {
        self.bpm
    }

    pub fn sync_master(&self) -> SyncMaster {
        self.sync_master
    }

    pub fn beat_phase(&self) -> f64 {
        self.beat_phase
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
