//! LFO-driven effects: chorus, flanger and phaser
//!
//! For all three the `time` parameter is the LFO period, so beat sync locks
//! one sweep to a musical division. `rate` sets the same LFO in Hz.

use super::delay_line::{DelayLine, Lfo};
use super::{Algorithm, EffectParam};
use crate::error::{EngineError, EngineResult};
use crate::types::StereoSample;

/// Slowest and fastest sweep
pub const MIN_RATE_HZ: f32 = 0.05;
pub const MAX_RATE_HZ: f32 = 10.0;

/// Right side runs a quarter cycle ahead for width
const STEREO_PHASE: f32 = 0.25;

#[derive(Debug, Clone, Copy)]
struct SweepShape {
    /// Shortest delay in the sweep
    base_ms: f32,
    /// Sweep width at depth 1.0
    width_ms: f32,
    feedback: f32,
    rate_hz: f32,
}

const CHORUS: SweepShape = SweepShape {
    base_ms: 12.0,
    width_ms: 8.0,
    feedback: 0.0,
    rate_hz: 0.8,
};

const FLANGER: SweepShape = SweepShape {
    base_ms: 0.5,
    width_ms: 4.5,
    feedback: 0.6,
    rate_hz: 0.25,
};

fn rate_from_period(period_ms: f32) -> f32 {
    (1000.0 / period_ms.max(1.0)).clamp(MIN_RATE_HZ, MAX_RATE_HZ)
}

/// Delay line whose read head is swept by an LFO (chorus and flanger)
pub(crate) struct ModulatedDelay {
    line: DelayLine,
    lfo: Lfo,
    samples_per_ms: f32,
    shape: SweepShape,
    depth: f32,
    feedback: f32,
    last_wet: StereoSample,
}

impl ModulatedDelay {
    pub fn chorus(sample_rate: u32) -> Self {
        Self::new(CHORUS, sample_rate)
    }

    pub fn flanger(sample_rate: u32) -> Self {
        Self::new(FLANGER, sample_rate)
    }

    fn new(shape: SweepShape, sample_rate: u32) -> Self {
        let samples_per_ms = sample_rate as f32 / 1000.0;
        let max = ((shape.base_ms + shape.width_ms) * samples_per_ms).ceil() as usize + 2;
        Self {
            line: DelayLine::new(max),
            lfo: Lfo::new(shape.rate_hz, sample_rate),
            samples_per_ms,
            shape,
            depth: 0.7,
            feedback: shape.feedback,
            last_wet: StereoSample::silence(),
        }
    }

    #[inline]
    fn delay_at(&self, offset: f32) -> f32 {
        // Map LFO [-1, 1] to [0, 1] of the sweep
        let sweep = (self.lfo.value(offset) + 1.0) * 0.5 * self.depth;
        (self.shape.base_ms + sweep * self.shape.width_ms) * self.samples_per_ms
    }
}

impl Algorithm for ModulatedDelay {
    #[inline]
    fn process_frame(&mut self, input: StereoSample) -> StereoSample {
        self.line.write(input + self.last_wet.scaled(self.feedback));
        let left = self.line.read(self.delay_at(0.0)).left;
        let right = self.line.read(self.delay_at(STEREO_PHASE)).right;
        self.lfo.advance();
        self.last_wet = StereoSample::new(left, right);
        self.last_wet
    }

    fn set_time_ms(&mut self, ms: f32) -> bool {
        self.lfo.set_rate(rate_from_period(ms));
        true
    }

    fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()> {
        match param {
            EffectParam::Rate => self.lfo.set_rate(value.clamp(MIN_RATE_HZ, MAX_RATE_HZ)),
            EffectParam::Depth => self.depth = value,
            EffectParam::Feedback => self.feedback = value,
            _ => return Err(EngineError::UnsupportedParameter { param }),
        }
        Ok(())
    }

    fn param(&self, param: EffectParam) -> Option<f32> {
        match param {
            EffectParam::Rate => Some(self.lfo.rate()),
            EffectParam::Depth => Some(self.depth),
            EffectParam::Feedback => Some(self.feedback),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.line.reset();
        self.lfo.reset();
        self.last_wet = StereoSample::silence();
    }
}

const PHASER_STAGES: usize = 6;
const PHASER_MIN_HZ: f32 = 200.0;
const PHASER_MAX_HZ: f32 = 3200.0;

/// First-order allpass state for one side
#[derive(Debug, Clone, Copy, Default)]
struct AllpassStage {
    x1: f32,
    y1: f32,
}

impl AllpassStage {
    #[inline]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        let output = coeff * input + self.x1 - coeff * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }
}

/// Cascade of swept allpass stages with feedback
pub(crate) struct Phaser {
    stages: [[AllpassStage; PHASER_STAGES]; 2],
    lfo: Lfo,
    sample_rate: f32,
    depth: f32,
    feedback: f32,
    last_wet: StereoSample,
}

impl Phaser {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stages: [[AllpassStage::default(); PHASER_STAGES]; 2],
            lfo: Lfo::new(0.5, sample_rate),
            sample_rate: sample_rate as f32,
            depth: 0.8,
            feedback: 0.4,
            last_wet: StereoSample::silence(),
        }
    }

    /// Allpass coefficient for the sweep position at `offset` cycles
    #[inline]
    fn coeff_at(&self, offset: f32) -> f32 {
        let sweep = (self.lfo.value(offset) + 1.0) * 0.5 * self.depth;
        // Exponential sweep sounds even across the range
        let freq = PHASER_MIN_HZ * (PHASER_MAX_HZ / PHASER_MIN_HZ).powf(sweep);
        let t = (std::f32::consts::PI * freq / self.sample_rate).tan();
        (t - 1.0) / (t + 1.0)
    }
}

impl Algorithm for Phaser {
    fn process_frame(&mut self, input: StereoSample) -> StereoSample {
        let coeffs = [self.coeff_at(0.0), self.coeff_at(STEREO_PHASE)];
        let inputs = [
            input.left + self.last_wet.left * self.feedback,
            input.right + self.last_wet.right * self.feedback,
        ];
        let mut out = [0.0f32; 2];
        for side in 0..2 {
            let mut value = inputs[side];
            for stage in &mut self.stages[side] {
                value = stage.process(value, coeffs[side]);
            }
            out[side] = value;
        }
        self.lfo.advance();
        self.last_wet = StereoSample::new(out[0], out[1]);
        // Notches come from summing the phase-shifted path with its input
        StereoSample::new((input.left + out[0]) * 0.5, (input.right + out[1]) * 0.5)
    }

    fn set_time_ms(&mut self, ms: f32) -> bool {
        self.lfo.set_rate(rate_from_period(ms));
        true
    }

    fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()> {
        match param {
            EffectParam::Rate => self.lfo.set_rate(value.clamp(MIN_RATE_HZ, MAX_RATE_HZ)),
            EffectParam::Depth => self.depth = value,
            EffectParam::Feedback => self.feedback = value.min(0.9),
            _ => return Err(EngineError::UnsupportedParameter { param }),
        }
        Ok(())
    }

    fn param(&self, param: EffectParam) -> Option<f32> {
        match param {
            EffectParam::Rate => Some(self.lfo.rate()),
            EffectParam::Depth => Some(self.depth),
            EffectParam::Feedback => Some(self.feedback),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.stages = [[AllpassStage::default(); PHASER_STAGES]; 2];
        self.lfo.reset();
        self.last_wet = StereoSample::silence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_sine(algorithm: &mut dyn Algorithm, frames: usize) -> Vec<StereoSample> {
        (0..frames)
            .map(|i| {
                let x = (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 48_000.0).sin() * 0.5;
                algorithm.process_frame(StereoSample::mono(x))
            })
            .collect()
    }

    #[test]
    fn test_chorus_output_bounded() {
        let mut chorus = ModulatedDelay::chorus(48_000);
        for frame in run_sine(&mut chorus, 48_000) {
            assert!(frame.peak() <= 1.0);
        }
    }

    #[test]
    fn test_flanger_feedback_stays_stable() {
        let mut flanger = ModulatedDelay::flanger(48_000);
        flanger.set_param(EffectParam::Feedback, 0.95).unwrap();
        let out = run_sine(&mut flanger, 96_000);
        assert!(out.iter().all(|f| f.left.is_finite() && f.peak() < 20.0));
    }

    #[test]
    fn test_period_maps_to_rate() {
        assert!((rate_from_period(500.0) - 2.0).abs() < 1e-6);
        assert_eq!(rate_from_period(1_000_000.0), MIN_RATE_HZ);
    }

    #[test]
    fn test_phaser_reset_clears_state() {
        let mut phaser = Phaser::new(48_000);
        run_sine(&mut phaser, 4096);
        phaser.reset();
        assert_eq!(phaser.process_frame(StereoSample::silence()), StereoSample::silence());
    }

    #[test]
    fn test_phaser_rejects_drive() {
        let mut phaser = Phaser::new(48_000);
        assert!(phaser.set_param(EffectParam::Drive, 0.5).is_err());
    }
}
