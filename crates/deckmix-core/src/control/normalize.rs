//! Value normalization for controller input
//!
//! MIDI values are 0-127, but engine parameters have their own ranges:
//! - Faders and levels: 0.0 to 1.0
//! - Crossfader and balance: -1.0 to 1.0 (bipolar)
//! - EQ: -26 dB to +6 dB with 0 dB at the knob's centre detent
//!
//! Every mapping passes through a normalized 0..1 position so soft
//! takeover can compare physical and engine positions on one scale.

use serde::{Deserialize, Serialize};

use crate::engine::{EQ_MAX_DB, EQ_MIN_DB};

/// MIDI units either side of 64 that snap to the centre on detented knobs
pub const CENTER_DEADZONE: u8 = 2;

const MIDI_MAX: f32 = 127.0;
const MIDI_CENTER: f32 = 64.0;

/// Value range of a parameter target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRange {
    /// 0.0 to 1.0
    Unit,
    /// -1.0 to 1.0
    Bipolar,
    /// EQ gain in dB, cut on the lower half of the travel, boost on the upper
    Eq,
    Custom { min: f32, max: f32 },
}

impl ControlRange {
    pub fn min(&self) -> f32 {
        match self {
            Self::Unit => 0.0,
            Self::Bipolar => -1.0,
            Self::Eq => EQ_MIN_DB,
            Self::Custom { min, .. } => *min,
        }
    }

    pub fn max(&self) -> f32 {
        match self {
            Self::Unit | Self::Bipolar => 1.0,
            Self::Eq => EQ_MAX_DB,
            Self::Custom { max, .. } => *max,
        }
    }

    /// Value at the middle of the physical travel
    pub fn center(&self) -> f32 {
        match self {
            Self::Eq => 0.0,
            _ => self.from_normalized(0.5),
        }
    }

    /// Detented controls snap to centre around MIDI 64
    pub fn center_deadzone(&self) -> Option<u8> {
        match self {
            Self::Bipolar | Self::Eq => Some(CENTER_DEADZONE),
            _ => None,
        }
    }

    /// Position 0..1 to a value in this range
    pub fn from_normalized(&self, position: f32) -> f32 {
        let position = position.clamp(0.0, 1.0);
        match self {
            Self::Eq => {
                if position <= 0.5 {
                    EQ_MIN_DB * (1.0 - position * 2.0)
                } else {
                    EQ_MAX_DB * ((position - 0.5) * 2.0)
                }
            }
            _ => self.min() + position * (self.max() - self.min()),
        }
    }

    /// Value in this range to a position 0..1
    pub fn to_normalized(&self, value: f32) -> f32 {
        let value = value.clamp(self.min(), self.max());
        match self {
            Self::Eq => {
                if value <= 0.0 {
                    0.5 * (1.0 - value / EQ_MIN_DB)
                } else {
                    0.5 + 0.5 * value / EQ_MAX_DB
                }
            }
            _ => {
                let span = self.max() - self.min();
                if span <= 0.0 {
                    0.0
                } else {
                    (value - self.min()) / span
                }
            }
        }
    }
}

/// Normalize a MIDI value (0-127) to 0.0..1.0
///
/// With a deadzone, values within `deadzone` of 64 map to exactly 0.5 and the
/// remaining travel on each side is stretched to fill its half.
pub fn normalize_cc_value(midi_value: u8, center_deadzone: Option<u8>) -> f32 {
    let midi = (midi_value as f32).min(MIDI_MAX);

    let Some(deadzone) = center_deadzone else {
        return midi / MIDI_MAX;
    };

    let low = MIDI_CENTER - deadzone as f32;
    let high = MIDI_CENTER + deadzone as f32;
    if midi >= low && midi <= high {
        0.5
    } else if midi < low {
        0.5 * midi / low
    } else {
        0.5 + 0.5 * (midi - high) / (MIDI_MAX - high)
    }
}

/// How a relative encoder encodes direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderMode {
    /// 1-63 = clockwise, 65-127 = counter-clockwise
    #[default]
    Relative,
    /// Signed around 64: <64 = CCW, >64 = CW
    RelativeSigned,
}

/// Convert a relative encoder value to a signed tick count
pub fn encoder_to_delta(midi_value: u8, mode: EncoderMode) -> i32 {
    match mode {
        EncoderMode::Relative => match midi_value {
            1..=63 => midi_value as i32,
            65..=127 => -((midi_value as i32) - 64),
            _ => 0,
        },
        EncoderMode::RelativeSigned => (midi_value as i32) - 64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_and_bipolar_endpoints() {
        assert_eq!(normalize_cc_value(0, None), 0.0);
        assert_eq!(normalize_cc_value(127, None), 1.0);
        assert_eq!(ControlRange::Bipolar.from_normalized(0.0), -1.0);
        assert_eq!(ControlRange::Bipolar.from_normalized(1.0), 1.0);
    }

    #[test]
    fn test_deadzone_snaps_to_center() {
        for value in 62..=66 {
            assert_eq!(normalize_cc_value(value, Some(CENTER_DEADZONE)), 0.5);
        }
        assert_eq!(normalize_cc_value(0, Some(CENTER_DEADZONE)), 0.0);
        assert_eq!(normalize_cc_value(127, Some(CENTER_DEADZONE)), 1.0);
        assert!(normalize_cc_value(61, Some(CENTER_DEADZONE)) < 0.5);
        assert!(normalize_cc_value(67, Some(CENTER_DEADZONE)) > 0.5);
    }

    #[test]
    fn test_eq_center_is_unity() {
        let eq = ControlRange::Eq;
        assert_eq!(eq.from_normalized(0.5), 0.0);
        assert_eq!(eq.from_normalized(0.0), EQ_MIN_DB);
        assert_eq!(eq.from_normalized(1.0), EQ_MAX_DB);
        assert_eq!(eq.center(), 0.0);
        for db in [-26.0, -12.0, 0.0, 3.0, 6.0] {
            assert!((eq.from_normalized(eq.to_normalized(db)) - db).abs() < 1e-4);
        }
    }

    #[test]
    fn test_custom_range_inverse() {
        let range = ControlRange::Custom { min: 60.0, max: 200.0 };
        assert_eq!(range.to_normalized(130.0), 0.5);
        assert_eq!(range.to_normalized(500.0), 1.0);
    }

    #[test]
    fn test_encoder_relative() {
        assert_eq!(encoder_to_delta(1, EncoderMode::Relative), 1);
        assert_eq!(encoder_to_delta(10, EncoderMode::Relative), 10);
        assert_eq!(encoder_to_delta(65, EncoderMode::Relative), -1);
        assert_eq!(encoder_to_delta(75, EncoderMode::Relative), -11);
        assert_eq!(encoder_to_delta(64, EncoderMode::Relative), 0);
        assert_eq!(encoder_to_delta(0, EncoderMode::Relative), 0);

        assert_eq!(encoder_to_delta(66, EncoderMode::RelativeSigned), 2);
        assert_eq!(encoder_to_delta(60, EncoderMode::RelativeSigned), -4);
    }
}
