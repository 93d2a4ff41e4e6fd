//! Lock-free metering and status for observers
//!
//! The audio thread writes these atomics once per block; the UI (or the
//! headless player's log loop) reads them without ever touching the engine.
//! Floats are stored as their bit patterns in `AtomicU32`/`AtomicU64`.
//!
//! All operations use `Ordering::Relaxed`: readers need visibility, not
//! synchronization with other memory. A snapshot may therefore mix values
//! from two adjacent blocks, which is harmless for meters.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::clock::{SyncMaster, TransportSnapshot};
use crate::engine::channel::ChannelLevel;
use crate::types::MAX_CHANNELS;

/// Overall engine health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Running,
    /// Recent overruns reached the configured threshold
    Degraded,
    /// Output device gone or stream closed
    Stopped,
}

impl EngineStatus {
    fn to_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Degraded => 1,
            Self::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Degraded,
            2 => Self::Stopped,
            _ => Self::Running,
        }
    }
}

/// Per-block levels, read as an immutable value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterSnapshot {
    /// Pre-mute levels, one per configured channel
    pub channels: [ChannelLevel; MAX_CHANNELS],
    pub channel_count: usize,
    pub master_peak: f32,
    pub cue_peak: f32,
}

impl MeterSnapshot {
    /// Levels of the configured channels only
    pub fn channels(&self) -> &[ChannelLevel] {
        &self.channels[..self.channel_count]
    }
}

/// Atomics shared between the audio thread (writer) and observers (readers)
pub struct EngineAtomics {
    channel_count: usize,
    peak: [AtomicU32; MAX_CHANNELS],
    rms: [AtomicU32; MAX_CHANNELS],
    master_peak: AtomicU32,
    cue_peak: AtomicU32,

    bpm: AtomicU64,
    beat_phase: AtomicU64,
    beat_count: AtomicU64,
    sample_position: AtomicU64,
    sample_rate: AtomicU32,
    /// Encoded with [`SyncMaster::to_u8`]
    sync_master: AtomicU8,

    status: AtomicU8,
    overruns: AtomicU64,
    /// Set from the device error callback; cleared when a stream restarts
    device_lost: AtomicBool,
}

impl EngineAtomics {
    pub fn new(channel_count: usize) -> Self {
        Self {
            channel_count: channel_count.min(MAX_CHANNELS),
            peak: std::array::from_fn(|_| AtomicU32::new(0)),
            rms: std::array::from_fn(|_| AtomicU32::new(0)),
            master_peak: AtomicU32::new(0),
            cue_peak: AtomicU32::new(0),
            bpm: AtomicU64::new(TransportSnapshot::default().bpm.to_bits()),
            beat_phase: AtomicU64::new(0),
            beat_count: AtomicU64::new(0),
            sample_position: AtomicU64::new(0),
            sample_rate: AtomicU32::new(crate::types::SAMPLE_RATE),
            sync_master: AtomicU8::new(SyncMaster::Internal.to_u8()),
            status: AtomicU8::new(EngineStatus::Running.to_u8()),
            overruns: AtomicU64::new(0),
            device_lost: AtomicBool::new(false),
        }
    }

    // ── Writer side (audio thread) ──────────────────────────────────────

    #[inline]
    pub(crate) fn store_channel(&self, index: usize, level: ChannelLevel) {
        if index < self.channel_count {
            self.peak[index].store(level.peak.to_bits(), Ordering::Relaxed);
            self.rms[index].store(level.rms.to_bits(), Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn store_bus(&self, master_peak: f32, cue_peak: f32) {
        self.master_peak.store(master_peak.to_bits(), Ordering::Relaxed);
        self.cue_peak.store(cue_peak.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn store_transport(&self, transport: &TransportSnapshot) {
        self.bpm.store(transport.bpm.to_bits(), Ordering::Relaxed);
        self.beat_phase.store(transport.beat_phase.to_bits(), Ordering::Relaxed);
        self.beat_count.store(transport.beat_count, Ordering::Relaxed);
        self.sample_position.store(transport.sample_position, Ordering::Relaxed);
        self.sample_rate.store(transport.sample_rate, Ordering::Relaxed);
        self.sync_master.store(transport.sync_master.to_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_status(&self, status: EngineStatus) {
        self.status.store(status.to_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Flag the output device as gone; safe to call from any thread
    pub fn mark_device_lost(&self) {
        self.device_lost.store(true, Ordering::Relaxed);
    }

    pub fn clear_device_lost(&self) {
        self.device_lost.store(false, Ordering::Relaxed);
    }

    // ── Reader side ─────────────────────────────────────────────────────

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn meters(&self) -> MeterSnapshot {
        let mut snapshot = MeterSnapshot {
            channel_count: self.channel_count,
            master_peak: f32::from_bits(self.master_peak.load(Ordering::Relaxed)),
            cue_peak: f32::from_bits(self.cue_peak.load(Ordering::Relaxed)),
            ..Default::default()
        };
        for index in 0..self.channel_count {
            snapshot.channels[index] = ChannelLevel {
                peak: f32::from_bits(self.peak[index].load(Ordering::Relaxed)),
                rms: f32::from_bits(self.rms[index].load(Ordering::Relaxed)),
            };
        }
        snapshot
    }

    pub fn transport(&self) -> TransportSnapshot {
        TransportSnapshot {
            bpm: f64::from_bits(self.bpm.load(Ordering::Relaxed)),
            beat_phase: f64::from_bits(self.beat_phase.load(Ordering::Relaxed)),
            beat_count: self.beat_count.load(Ordering::Relaxed),
            sync_master: SyncMaster::from_u8(self.sync_master.load(Ordering::Relaxed)),
            sample_position: self.sample_position.load(Ordering::Relaxed),
            sample_rate: self.sample_rate.load(Ordering::Relaxed),
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    /// Total blocks replaced with silence since startup
    pub fn overrun_count(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Relaxed)
    }
}

impl Default for EngineAtomics {
    fn default() -> Self {
        Self::new(crate::types::DEFAULT_CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelId;

    #[test]
    fn test_meter_roundtrip_through_bits() {
        let atomics = EngineAtomics::new(2);
        atomics.store_channel(1, ChannelLevel { peak: 0.75, rms: 0.5 });
        atomics.store_channel(5, ChannelLevel { peak: 1.0, rms: 1.0 }); // out of range, ignored
        atomics.store_bus(0.9, 0.3);

        let meters = atomics.meters();
        assert_eq!(meters.channels().len(), 2);
        assert_eq!(meters.channels()[1].peak, 0.75);
        assert_eq!(meters.channels()[1].rms, 0.5);
        assert_eq!(meters.channels()[0].peak, 0.0);
        assert_eq!(meters.master_peak, 0.9);
        assert_eq!(meters.cue_peak, 0.3);
    }

    #[test]
    fn test_transport_roundtrip() {
        let atomics = EngineAtomics::new(4);
        let transport = TransportSnapshot {
            bpm: 174.0,
            beat_phase: 0.25,
            beat_count: 42,
            sync_master: SyncMaster::Channel(ChannelId(3)),
            sample_position: 96_000,
            sample_rate: 44_100,
        };
        atomics.store_transport(&transport);
        assert_eq!(atomics.transport(), transport);
    }

    #[test]
    fn test_status_and_device_flag() {
        let atomics = EngineAtomics::default();
        assert_eq!(atomics.status(), EngineStatus::Running);
        atomics.set_status(EngineStatus::Degraded);
        assert_eq!(atomics.status(), EngineStatus::Degraded);

        atomics.record_overrun();
        atomics.record_overrun();
        assert_eq!(atomics.overrun_count(), 2);

        atomics.mark_device_lost();
        assert!(atomics.is_device_lost());
        atomics.clear_device_lost();
        assert!(!atomics.is_device_lost());
    }
}
