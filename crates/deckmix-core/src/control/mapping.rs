//! Compiled controller mappings
//!
//! A [`MappingTable`] is built off the audio thread from a profile, then
//! handed to the engine as a whole. The audio thread only ever reads it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::normalize::{ControlRange, EncoderMode};
use super::target::{ParameterTarget, TargetKind};
use super::{ControlKey, ControlNumber};
use crate::error::MappingError;

/// How a raw controller value becomes a parameter value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Position maps linearly onto the target range
    #[default]
    Linear,
    /// Position maps geometrically (frequencies, times); needs a positive range
    Log,
    /// Each press flips a switch or fires a trigger; releases are ignored
    Toggle,
    /// Relative encoder: each tick moves the position by `step`
    ///
    /// Stepped targets move one discrete position per tick instead.
    Increment {
        step: f32,
        #[serde(default)]
        mode: EncoderMode,
    },
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Log => "log",
            Self::Toggle => "toggle",
            Self::Increment { .. } => "increment",
        }
    }

    /// Whether this transform can drive `target`
    pub fn supports(&self, target: &ParameterTarget) -> bool {
        match (self, target.kind()) {
            (Self::Toggle, TargetKind::Continuous | TargetKind::Stepped) => false,
            (Self::Increment { .. }, TargetKind::Switch | TargetKind::Trigger) => false,
            (Self::Log, _) => target.kind() == TargetKind::Continuous && target.range().min() > 0.0,
            _ => true,
        }
    }

    /// Position 0..1 to a value in `range`
    pub fn apply(&self, position: f32, range: ControlRange) -> f32 {
        match self {
            Self::Log if range.min() > 0.0 => {
                let position = position.clamp(0.0, 1.0);
                range.min() * (range.max() / range.min()).powf(position)
            }
            _ => range.from_normalized(position),
        }
    }

    /// Inverse of [`apply`](Self::apply)
    pub fn position(&self, value: f32, range: ControlRange) -> f32 {
        match self {
            Self::Log if range.min() > 0.0 => {
                let value = value.clamp(range.min(), range.max());
                ((value / range.min()).ln() / (range.max() / range.min()).ln()).clamp(0.0, 1.0)
            }
            _ => range.to_normalized(value),
        }
    }
}

/// Resolved destination of one control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingEntry {
    pub target: ParameterTarget,
    pub transform: Transform,
}

/// Lookup from (controller, control) to target and transform
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    generation: u64,
    entries: HashMap<ControlKey, MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping, validating it against a mixer with `channel_count` channels
    pub fn insert(
        &mut self,
        key: ControlKey,
        entry: MappingEntry,
        channel_count: usize,
    ) -> Result<(), MappingError> {
        if let Some(channel) = entry.target.channel() {
            if channel.number() as usize > channel_count {
                return Err(MappingError::ChannelOutOfRange {
                    target: entry.target.to_string(),
                    max: channel_count,
                });
            }
        }
        if !entry.transform.supports(&entry.target) {
            return Err(MappingError::IncompatibleTransform {
                transform: entry.transform.name(),
                target: entry.target.to_string(),
            });
        }
        if self.entries.contains_key(&key) {
            return Err(MappingError::DuplicateControl {
                controller: key.controller,
                control: key.control.to_string(),
            });
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    #[inline]
    pub fn get(&self, key: &ControlKey) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    /// Look up a controller's control directly
    pub fn lookup(&self, controller: u16, control: ControlNumber) -> Option<&MappingEntry> {
        self.get(&ControlKey { controller, control })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControlKey, &MappingEntry)> {
        self.entries.iter()
    }

    /// Stamp assigned when the table is installed; changes reset soft takeover
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }
}
