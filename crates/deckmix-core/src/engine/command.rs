//! Lock-free command queue from the control thread to the audio thread
//!
//! The control thread pushes [`EngineCommand`]s into an rtrb ring; the audio
//! thread drains the ring once at the start of every block. Parameters
//! therefore change only at block boundaries and never mid-block.
//!
//! The queue is single-producer: MIDI input, UI and scripting all funnel
//! through the one [`EngineHandle`](super::EngineHandle) owned by the control
//! thread.
//!
//! ```ignore
//! let (tx, rx) = command_channel();
//! tx.push(EngineCommand::SetFader { channel: ChannelId(1), position: 0.8 })?;
//! // audio thread, once per block:
//! engine.process_commands();
//! ```

use std::time::Duration;

use basedrop::Owned;

use super::channel::EqBand;
use super::filter::FilterMode;
use super::mixer::CrossfaderCurve;
use crate::clock::SyncMaster;
use crate::control::ControlEvent;
use crate::effect::{BeatDivision, EffectParam, EffectSlot, EffectUnit};
use crate::types::{ChannelId, CrossfaderAssign, InputSource};

/// Commands sent from the control thread to the audio thread
///
/// Effect units travel as [`basedrop::Owned`] so that when the audio thread
/// replaces or removes one, the deallocation is deferred to the collector
/// thread.
pub enum EngineCommand {
    // Channel strip
    SetTrim { channel: ChannelId, db: f32 },
    SetEq { channel: ChannelId, band: EqBand, db: f32 },
    SetFilterMode { channel: ChannelId, mode: FilterMode },
    SetFilterCutoff { channel: ChannelId, hz: f32 },
    SetFilterResonance { channel: ChannelId, resonance: f32 },
    SetFader { channel: ChannelId, position: f32 },
    SetCue { channel: ChannelId, enabled: bool },
    SetMute { channel: ChannelId, muted: bool },
    SetSolo { channel: ChannelId, solo: bool },
    SetInputSource { channel: ChannelId, source: InputSource },
    SetCrossfaderAssign { channel: ChannelId, assign: CrossfaderAssign },
    /// Tempo of the material on a channel, used when it is sync master
    SetChannelBpm { channel: ChannelId, bpm: Option<f64> },

    // Mix bus
    SetCrossfader { position: f32 },
    SetCrossfaderCurve { curve: CrossfaderCurve },
    SetMaster { position: f32 },
    SetBooth { gain: f32 },
    SetBalance { balance: f32 },
    SetCueMix { mix: f32 },
    SetCueVolume { volume: f32 },

    // Effect slots
    /// Install a unit (replacing any previous one) and enable it
    InsertEffect { slot: EffectSlot, unit: Owned<EffectUnit> },
    RemoveEffect { slot: EffectSlot },
    SetEffectEnabled { slot: EffectSlot, enabled: bool },
    SetEffectParam { slot: EffectSlot, param: EffectParam, value: f32 },
    SetEffectDivision { slot: EffectSlot, division: BeatDivision },

    // Transport
    SetBpm { bpm: f64 },
    NudgeBpm { delta: f64 },
    TapTempo { timestamp: Duration },
    SetSyncMaster { master: SyncMaster },

    /// Raw controller input, resolved by the control router on the audio thread
    Control(ControlEvent),
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsertEffect { slot, unit } => f
                .debug_struct("InsertEffect")
                .field("slot", slot)
                .field("kind", &unit.kind())
                .finish(),
            Self::Control(event) => f.debug_tuple("Control").field(event).finish(),
            other => f.write_str(other.name()),
        }
    }
}

impl EngineCommand {
    /// Variant name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTrim { .. } => "SetTrim",
            Self::SetEq { .. } => "SetEq",
            Self::SetFilterMode { .. } => "SetFilterMode",
            Self::SetFilterCutoff { .. } => "SetFilterCutoff",
            Self::SetFilterResonance { .. } => "SetFilterResonance",
            Self::SetFader { .. } => "SetFader",
            Self::SetCue { .. } => "SetCue",
            Self::SetMute { .. } => "SetMute",
            Self::SetSolo { .. } => "SetSolo",
            Self::SetInputSource { .. } => "SetInputSource",
            Self::SetCrossfaderAssign { .. } => "SetCrossfaderAssign",
            Self::SetChannelBpm { .. } => "SetChannelBpm",
            Self::SetCrossfader { .. } => "SetCrossfader",
            Self::SetCrossfaderCurve { .. } => "SetCrossfaderCurve",
            Self::SetMaster { .. } => "SetMaster",
            Self::SetBooth { .. } => "SetBooth",
            Self::SetBalance { .. } => "SetBalance",
            Self::SetCueMix { .. } => "SetCueMix",
            Self::SetCueVolume { .. } => "SetCueVolume",
            Self::InsertEffect { .. } => "InsertEffect",
            Self::RemoveEffect { .. } => "RemoveEffect",
            Self::SetEffectEnabled { .. } => "SetEffectEnabled",
            Self::SetEffectParam { .. } => "SetEffectParam",
            Self::SetEffectDivision { .. } => "SetEffectDivision",
            Self::SetBpm { .. } => "SetBpm",
            Self::NudgeBpm { .. } => "NudgeBpm",
            Self::TapTempo { .. } => "TapTempo",
            Self::SetSyncMaster { .. } => "SetSyncMaster",
            Self::Control(_) => "Control",
        }
    }
}

/// Capacity of the command ring; a burst of MIDI from several controllers fits easily
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Create the command ring
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::SetFader {
            channel: ChannelId(2),
            position: 0.5,
        })
        .unwrap();

        match rx.pop().unwrap() {
            EngineCommand::SetFader { channel, position } => {
                assert_eq!(channel, ChannelId(2));
                assert_eq!(position, 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_size_stays_small() {
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 40, "EngineCommand is {} bytes, expected <= 40", size);
    }

    #[test]
    fn test_queue_reports_full() {
        let (mut tx, _rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            tx.push(EngineCommand::SetBpm { bpm: 120.0 }).unwrap();
        }
        assert!(tx.push(EngineCommand::SetBpm { bpm: 120.0 }).is_err());
    }
}
