//! Drive-into-soft-clip distortion

use super::{Algorithm, EffectParam};
use crate::error::{EngineError, EngineResult};
use crate::types::StereoSample;

/// Level below which [`soft_clip`] is the identity
pub const SOFT_CLIP_KNEE: f32 = 0.8;

/// Gain at full drive
const MAX_DRIVE_GAIN: f32 = 25.0;

/// Saturating curve that is linear up to the knee and approaches ±1 smoothly
///
/// Continuous in value and slope at the knee; never reaches or exceeds 1.0.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= SOFT_CLIP_KNEE {
        return x;
    }
    if !magnitude.is_finite() {
        return x.signum() * (1.0 - f32::EPSILON);
    }
    let headroom = 1.0 - SOFT_CLIP_KNEE;
    let shaped = SOFT_CLIP_KNEE + headroom * ((magnitude - SOFT_CLIP_KNEE) / headroom).tanh();
    // tanh rounds to exactly 1.0 in f32 for large inputs
    x.signum() * shaped.min(1.0 - f32::EPSILON)
}

pub(crate) struct Distortion {
    gain: f32,
}

impl Distortion {
    pub fn new() -> Self {
        let mut distortion = Self { gain: 1.0 };
        distortion.set_drive(0.3);
        distortion
    }

    fn set_drive(&mut self, drive: f32) {
        self.gain = 1.0 + drive * (MAX_DRIVE_GAIN - 1.0);
    }
}

impl Algorithm for Distortion {
    #[inline]
    fn process_frame(&mut self, input: StereoSample) -> StereoSample {
        // Pull the level back so higher drive adds harmonics, not loudness
        let makeup = 1.0 / self.gain.sqrt();
        StereoSample::new(
            soft_clip(input.left * self.gain) * makeup,
            soft_clip(input.right * self.gain) * makeup,
        )
    }

    fn set_time_ms(&mut self, _ms: f32) -> bool {
        false
    }

    fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()> {
        match param {
            EffectParam::Drive => self.set_drive(value),
            _ => return Err(EngineError::UnsupportedParameter { param }),
        }
        Ok(())
    }

    fn param(&self, param: EffectParam) -> Option<f32> {
        (param == EffectParam::Drive).then(|| (self.gain - 1.0) / (MAX_DRIVE_GAIN - 1.0))
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_clip_identity_below_knee() {
        for x in [-0.8, -0.3, 0.0, 0.5, 0.8] {
            assert_eq!(soft_clip(x), x);
        }
    }

    #[test]
    fn test_soft_clip_bounded() {
        for x in [0.81, 1.0, 2.0, 50.0, 1e9, f32::INFINITY] {
            let y = soft_clip(x);
            assert!(y < 1.0 && y > SOFT_CLIP_KNEE, "soft_clip({}) = {}", x, y);
            assert_eq!(soft_clip(-x), -y);
        }
    }

    #[test]
    fn test_soft_clip_monotonic() {
        let mut prev = soft_clip(-4.0);
        let mut x = -4.0;
        while x < 4.0 {
            x += 0.01;
            let y = soft_clip(x);
            assert!(y >= prev);
            prev = y;
        }
    }

    #[test]
    fn test_full_drive_output_within_unity() {
        let mut distortion = Distortion::new();
        distortion.set_param(EffectParam::Drive, 1.0).unwrap();
        let out = distortion.process_frame(StereoSample::new(3.0, -3.0));
        assert!(out.left <= 1.0 && out.right >= -1.0);
    }
}
