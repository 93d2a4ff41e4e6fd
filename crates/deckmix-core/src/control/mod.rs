//! Controller input: mapping tables, value transforms and soft takeover
//!
//! The MIDI layer turns raw bytes into [`ControlEvent`]s and pushes them
//! through the engine's command queue. On the audio thread the
//! [`ControlRouter`] resolves each event against the active
//! [`MappingTable`] and writes the result into the engine.

mod mapping;
mod normalize;
mod router;
mod takeover;
mod target;

pub use mapping::{MappingEntry, MappingTable, Transform};
pub use normalize::{encoder_to_delta, normalize_cc_value, ControlRange, EncoderMode, CENTER_DEADZONE};
pub use router::{mapping_cell, ControlRouter, DispatchOutcome, MappingCell, ParameterAccess};
pub use takeover::{SoftTakeover, TAKEOVER_TOLERANCE};
pub use target::{
    ChannelParam, EffectControl, MixerParam, ParameterTarget, TargetKind, TransportParam,
    BPM_CONTROL_MAX, BPM_CONTROL_MIN, TAKEOVER_SLOTS,
};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Physical control on a controller: a note (button, pad) or a CC (fader, knob)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlNumber {
    Note {
        /// MIDI channel (0-15)
        channel: u8,
        note: u8,
    },
    ControlChange {
        /// MIDI channel (0-15)
        channel: u8,
        cc: u8,
    },
}

impl ControlNumber {
    pub fn note(channel: u8, note: u8) -> Self {
        Self::Note { channel, note }
    }

    pub fn cc(channel: u8, cc: u8) -> Self {
        Self::ControlChange { channel, cc }
    }
}

impl fmt::Display for ControlNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note { channel, note } => write!(f, "note {} ch {}", note, channel + 1),
            Self::ControlChange { channel, cc } => write!(f, "cc {} ch {}", cc, channel + 1),
        }
    }
}

/// Lookup key of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlKey {
    pub controller: u16,
    pub control: ControlNumber,
}

/// One parsed controller message
///
/// Notes carry their velocity as `value` (0 for note off); CCs their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    /// Which connected controller sent it
    pub controller: u16,
    pub control: ControlNumber,
    /// 0-127
    pub value: u8,
    /// Arrival time, relative to the MIDI layer's start
    pub timestamp: Duration,
}

impl ControlEvent {
    /// Button pressed / value non-zero
    #[inline]
    pub fn is_press(&self) -> bool {
        self.value > 0
    }
}
