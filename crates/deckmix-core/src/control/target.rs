//! Parameter targets a controller can drive
//!
//! Targets are written in profiles as dotted paths and resolved once, when
//! the profile is compiled into a mapping table:
//!
//! | Path                         | Target                                   |
//! |------------------------------|------------------------------------------|
//! | `channel.{n}.{param}`        | trim, eq_low/mid/high, filter_cutoff, filter_resonance, filter_mode, fader, cue, mute, solo, crossfader_assign, sync |
//! | `mixer.{param}`              | crossfader, crossfader_curve, master, booth, balance, cue_mix, cue_volume |
//! | `effect.{n or master}.{param}` | enabled, or any effect parameter name |
//! | `transport.{param}`          | bpm, tap, nudge_up, nudge_down, internal |

use std::fmt;

use super::normalize::ControlRange;
use crate::effect::{BeatDivision, EffectParam, EffectSlot};
use crate::engine::{BOOTH_MAX_GAIN, TRIM_MAX_DB, TRIM_MIN_DB};
use crate::engine::{FILTER_MAX_HZ, FILTER_MIN_HZ};
use crate::error::MappingError;
use crate::types::{ChannelId, MAX_CHANNELS};

/// BPM range reachable from an absolute tempo control
pub const BPM_CONTROL_MIN: f32 = 60.0;
pub const BPM_CONTROL_MAX: f32 = 200.0;

/// Number of soft-takeover states the router keeps, one per continuous target
pub const TAKEOVER_SLOTS: usize = 288;

const CHANNEL_STRIDE: usize = 16;
const MIXER_BASE: usize = MAX_CHANNELS * CHANNEL_STRIDE;
const EFFECT_BASE: usize = MIXER_BASE + 8;
const TRANSPORT_BASE: usize = EFFECT_BASE + (MAX_CHANNELS + 1) * CHANNEL_STRIDE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelParam {
    Trim,
    EqLow,
    EqMid,
    EqHigh,
    FilterCutoff,
    FilterResonance,
    FilterMode,
    Fader,
    Cue,
    Mute,
    Solo,
    CrossfaderAssign,
    /// Make this channel the sync master
    Sync,
}

impl ChannelParam {
    const ALL: [ChannelParam; 13] = [
        Self::Trim,
        Self::EqLow,
        Self::EqMid,
        Self::EqHigh,
        Self::FilterCutoff,
        Self::FilterResonance,
        Self::FilterMode,
        Self::Fader,
        Self::Cue,
        Self::Mute,
        Self::Solo,
        Self::CrossfaderAssign,
        Self::Sync,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::EqLow => "eq_low",
            Self::EqMid => "eq_mid",
            Self::EqHigh => "eq_high",
            Self::FilterCutoff => "filter_cutoff",
            Self::FilterResonance => "filter_resonance",
            Self::FilterMode => "filter_mode",
            Self::Fader => "fader",
            Self::Cue => "cue",
            Self::Mute => "mute",
            Self::Solo => "solo",
            Self::CrossfaderAssign => "crossfader_assign",
            Self::Sync => "sync",
        }
    }

    fn ordinal(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MixerParam {
    Crossfader,
    CrossfaderCurve,
    Master,
    Booth,
    Balance,
    CueMix,
    CueVolume,
}

impl MixerParam {
    const ALL: [MixerParam; 7] = [
        Self::Crossfader,
        Self::CrossfaderCurve,
        Self::Master,
        Self::Booth,
        Self::Balance,
        Self::CueMix,
        Self::CueVolume,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Crossfader => "crossfader",
            Self::CrossfaderCurve => "crossfader_curve",
            Self::Master => "master",
            Self::Booth => "booth",
            Self::Balance => "balance",
            Self::CueMix => "cue_mix",
            Self::CueVolume => "cue_volume",
        }
    }

    fn ordinal(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectControl {
    Enabled,
    Param(EffectParam),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportParam {
    Bpm,
    Tap,
    NudgeUp,
    NudgeDown,
    /// Return sync master to the internal clock
    Internal,
}

impl TransportParam {
    const ALL: [TransportParam; 5] = [
        Self::Bpm,
        Self::Tap,
        Self::NudgeUp,
        Self::NudgeDown,
        Self::Internal,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Bpm => "bpm",
            Self::Tap => "tap",
            Self::NudgeUp => "nudge_up",
            Self::NudgeDown => "nudge_down",
            Self::Internal => "internal",
        }
    }
}

/// How a target consumes controller values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Positional value with a range; subject to soft takeover
    Continuous,
    /// A few discrete positions chosen from a normalized value
    Stepped,
    /// On/off state
    Switch,
    /// One-shot action on press
    Trigger,
}

/// A single engine parameter, resolved from a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterTarget {
    Channel { channel: ChannelId, param: ChannelParam },
    Mixer(MixerParam),
    Effect { slot: EffectSlot, control: EffectControl },
    Transport(TransportParam),
}

impl ParameterTarget {
    /// Resolve a dotted path such as `channel.2.eq_low`
    pub fn parse(path: &str) -> Result<Self, MappingError> {
        let invalid = || MappingError::InvalidTarget(path.to_string());
        let parts: Vec<&str> = path.trim().split('.').collect();

        match parts.as_slice() {
            ["channel", number, name] => {
                let channel = parse_channel(number).ok_or_else(invalid)?;
                let param = ChannelParam::ALL
                    .into_iter()
                    .find(|p| p.name() == *name)
                    .ok_or_else(invalid)?;
                Ok(Self::Channel { channel, param })
            }
            ["mixer", name] => MixerParam::ALL
                .into_iter()
                .find(|p| p.name() == *name)
                .map(Self::Mixer)
                .ok_or_else(invalid),
            ["effect", slot, name] => {
                let slot = if *slot == "master" {
                    EffectSlot::Master
                } else {
                    EffectSlot::Channel(parse_channel(slot).ok_or_else(invalid)?)
                };
                let control = if *name == "enabled" {
                    EffectControl::Enabled
                } else {
                    EffectControl::Param(EffectParam::from_name(name).ok_or_else(invalid)?)
                };
                Ok(Self::Effect { slot, control })
            }
            ["transport", name] => TransportParam::ALL
                .into_iter()
                .find(|p| p.name() == *name)
                .map(Self::Transport)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    /// Channel the target refers to, if any
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::Channel { channel, .. } => Some(*channel),
            Self::Effect { slot: EffectSlot::Channel(channel), .. } => Some(*channel),
            _ => None,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Channel { param, .. } => match param {
                ChannelParam::FilterMode | ChannelParam::CrossfaderAssign => TargetKind::Stepped,
                ChannelParam::Cue | ChannelParam::Mute | ChannelParam::Solo => TargetKind::Switch,
                ChannelParam::Sync => TargetKind::Trigger,
                _ => TargetKind::Continuous,
            },
            Self::Mixer(MixerParam::CrossfaderCurve) => TargetKind::Stepped,
            Self::Mixer(_) => TargetKind::Continuous,
            Self::Effect { control, .. } => match control {
                EffectControl::Enabled | EffectControl::Param(EffectParam::Sync) => {
                    TargetKind::Switch
                }
                EffectControl::Param(EffectParam::Division) => TargetKind::Stepped,
                EffectControl::Param(_) => TargetKind::Continuous,
            },
            Self::Transport(TransportParam::Bpm) => TargetKind::Continuous,
            Self::Transport(_) => TargetKind::Trigger,
        }
    }

    /// Range of the values written to the engine
    pub fn range(&self) -> ControlRange {
        match self {
            Self::Channel { param, .. } => match param {
                ChannelParam::Trim => ControlRange::Custom { min: TRIM_MIN_DB, max: TRIM_MAX_DB },
                ChannelParam::EqLow | ChannelParam::EqMid | ChannelParam::EqHigh => ControlRange::Eq,
                ChannelParam::FilterCutoff => ControlRange::Custom {
                    min: FILTER_MIN_HZ,
                    max: FILTER_MAX_HZ,
                },
                _ => ControlRange::Unit,
            },
            Self::Mixer(param) => match param {
                MixerParam::Crossfader | MixerParam::Balance => ControlRange::Bipolar,
                MixerParam::Booth => ControlRange::Custom { min: 0.0, max: BOOTH_MAX_GAIN },
                _ => ControlRange::Unit,
            },
            Self::Effect { control: EffectControl::Param(param), .. } => {
                let (min, max) = param.range();
                ControlRange::Custom { min, max }
            }
            Self::Effect { .. } => ControlRange::Unit,
            Self::Transport(TransportParam::Bpm) => ControlRange::Custom {
                min: BPM_CONTROL_MIN,
                max: BPM_CONTROL_MAX,
            },
            Self::Transport(_) => ControlRange::Unit,
        }
    }

    /// Number of discrete positions of a stepped target
    pub fn step_count(&self) -> Option<usize> {
        match self.kind() {
            TargetKind::Stepped if self.is_division() => Some(BeatDivision::ALL.len()),
            TargetKind::Stepped => Some(3),
            _ => None,
        }
    }

    /// Position index of an engine value on a stepped target
    pub fn step_index(&self, value: f32) -> usize {
        if self.is_division() {
            let division = BeatDivision::nearest(value);
            return BeatDivision::ALL.iter().position(|d| *d == division).unwrap_or(0);
        }
        let last = self.step_count().unwrap_or(1).saturating_sub(1);
        ((value.clamp(0.0, 1.0) * last as f32).round() as usize).min(last)
    }

    /// Engine value of position `index` on a stepped target
    pub fn step_value(&self, index: usize) -> f32 {
        if self.is_division() {
            let index = index.min(BeatDivision::ALL.len() - 1);
            return BeatDivision::ALL[index].beats();
        }
        let last = self.step_count().unwrap_or(1).saturating_sub(1).max(1);
        index.min(last) as f32 / last as f32
    }

    fn is_division(&self) -> bool {
        matches!(
            self,
            Self::Effect { control: EffectControl::Param(EffectParam::Division), .. }
        )
    }

    /// Index into the router's soft-takeover table; continuous targets only
    pub fn takeover_slot(&self) -> Option<usize> {
        if self.kind() != TargetKind::Continuous {
            return None;
        }
        let slot = match self {
            Self::Channel { channel, param } => channel.index()? * CHANNEL_STRIDE + param.ordinal(),
            Self::Mixer(param) => MIXER_BASE + param.ordinal(),
            Self::Effect { slot, control } => {
                let slot_index = match slot {
                    EffectSlot::Channel(channel) => channel.index()?,
                    EffectSlot::Master => MAX_CHANNELS,
                };
                let param_index = match control {
                    EffectControl::Enabled => CHANNEL_STRIDE - 1,
                    EffectControl::Param(param) => {
                        EffectParam::ALL.iter().position(|p| p == param)?
                    }
                };
                EFFECT_BASE + slot_index * CHANNEL_STRIDE + param_index
            }
            Self::Transport(_) => TRANSPORT_BASE,
        };
        (slot < TAKEOVER_SLOTS).then_some(slot)
    }
}

impl fmt::Display for ParameterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel { channel, param } => write!(f, "channel.{}.{}", channel, param.name()),
            Self::Mixer(param) => write!(f, "mixer.{}", param.name()),
            Self::Effect { slot, control } => {
                match slot {
                    EffectSlot::Channel(channel) => write!(f, "effect.{}.", channel)?,
                    EffectSlot::Master => f.write_str("effect.master.")?,
                }
                match control {
                    EffectControl::Enabled => f.write_str("enabled"),
                    EffectControl::Param(param) => f.write_str(param.name()),
                }
            }
            Self::Transport(param) => write!(f, "transport.{}", param.name()),
        }
    }
}

fn parse_channel(text: &str) -> Option<ChannelId> {
    let number: u8 = text.parse().ok()?;
    (1..=MAX_CHANNELS as u8).contains(&number).then_some(ChannelId(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            ParameterTarget::parse("channel.2.fader").unwrap(),
            ParameterTarget::Channel { channel: ChannelId(2), param: ChannelParam::Fader }
        );
        assert_eq!(
            ParameterTarget::parse("mixer.crossfader").unwrap(),
            ParameterTarget::Mixer(MixerParam::Crossfader)
        );
        assert_eq!(
            ParameterTarget::parse("effect.master.mix").unwrap(),
            ParameterTarget::Effect {
                slot: EffectSlot::Master,
                control: EffectControl::Param(EffectParam::Mix),
            }
        );
        assert_eq!(
            ParameterTarget::parse("effect.3.enabled").unwrap(),
            ParameterTarget::Effect {
                slot: EffectSlot::Channel(ChannelId(3)),
                control: EffectControl::Enabled,
            }
        );
        assert_eq!(
            ParameterTarget::parse("transport.tap").unwrap(),
            ParameterTarget::Transport(TransportParam::Tap)
        );
    }

    #[test]
    fn test_invalid_paths_rejected() {
        for path in [
            "",
            "channel.0.fader",
            "channel.9.fader",
            "channel.x.fader",
            "channel.1.volume",
            "mixer",
            "effect.1.wobble",
            "transport.bpm.extra",
            "deck.play",
        ] {
            assert!(
                matches!(ParameterTarget::parse(path), Err(MappingError::InvalidTarget(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for path in [
            "channel.1.eq_high",
            "channel.4.crossfader_assign",
            "mixer.cue_volume",
            "effect.2.feedback",
            "effect.master.enabled",
            "transport.nudge_down",
        ] {
            assert_eq!(ParameterTarget::parse(path).unwrap().to_string(), path);
        }
    }

    #[test]
    fn test_takeover_slots_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for number in 1..=MAX_CHANNELS as u8 {
            for param in ChannelParam::ALL {
                let target = ParameterTarget::Channel { channel: ChannelId(number), param };
                if let Some(slot) = target.takeover_slot() {
                    assert!(seen.insert(slot));
                }
            }
            for param in EffectParam::ALL {
                let target = ParameterTarget::Effect {
                    slot: EffectSlot::Channel(ChannelId(number)),
                    control: EffectControl::Param(param),
                };
                if let Some(slot) = target.takeover_slot() {
                    assert!(seen.insert(slot));
                }
            }
        }
        for param in MixerParam::ALL {
            if let Some(slot) = ParameterTarget::Mixer(param).takeover_slot() {
                assert!(seen.insert(slot));
            }
        }
        let bpm = ParameterTarget::Transport(TransportParam::Bpm).takeover_slot().unwrap();
        assert!(seen.insert(bpm));
        assert!(seen.iter().all(|slot| *slot < TAKEOVER_SLOTS));
    }

    #[test]
    fn test_division_is_stepped() {
        let division = ParameterTarget::parse("effect.1.division").unwrap();
        assert_eq!(division.kind(), TargetKind::Stepped);
        assert_eq!(division.takeover_slot(), None);
        assert_eq!(division.step_count(), Some(BeatDivision::ALL.len()));
        assert_eq!(division.step_value(division.step_index(0.5)), 0.5);
        assert_eq!(division.step_value(99), 4.0);
    }

    #[test]
    fn test_three_way_step_positions() {
        let mode = ParameterTarget::parse("channel.1.filter_mode").unwrap();
        assert_eq!(mode.step_count(), Some(3));
        assert_eq!(mode.step_index(0.5), 1);
        assert_eq!(mode.step_value(2), 1.0);
        assert_eq!(mode.step_value(1), 0.5);
    }

    #[test]
    fn test_switches_have_no_takeover() {
        let mute = ParameterTarget::parse("channel.1.mute").unwrap();
        assert_eq!(mute.kind(), TargetKind::Switch);
        assert_eq!(mute.takeover_slot(), None);
    }
}
