//! Stereo feedback delay

use super::delay_line::{DelayLine, Smoothed};
use super::{Algorithm, EffectParam};
use crate::error::{EngineError, EngineResult};
use crate::types::StereoSample;

/// Longest delay time; covers 4 beats down to 60 BPM
pub const MAX_DELAY_MS: f32 = 4000.0;

const DEFAULT_TIME_MS: f32 = 375.0;
const DEFAULT_FEEDBACK: f32 = 0.4;
/// Glide applied when the delay time moves, keeps the read head from jumping
const TIME_GLIDE_MS: f32 = 40.0;

pub(crate) struct Delay {
    line: DelayLine,
    sample_rate: f32,
    delay_samples: Smoothed,
    feedback: f32,
}

impl Delay {
    pub fn new(sample_rate: u32) -> Self {
        let max_samples = (MAX_DELAY_MS / 1000.0 * sample_rate as f32).ceil() as usize;
        let initial = DEFAULT_TIME_MS / 1000.0 * sample_rate as f32;
        Self {
            line: DelayLine::new(max_samples),
            sample_rate: sample_rate as f32,
            delay_samples: Smoothed::new(initial, sample_rate, TIME_GLIDE_MS),
            feedback: DEFAULT_FEEDBACK,
        }
    }
}

impl Algorithm for Delay {
    #[inline]
    fn process_frame(&mut self, input: StereoSample) -> StereoSample {
        let delayed = self.line.read(self.delay_samples.next());
        self.line.write(input + delayed.scaled(self.feedback));
        delayed
    }

    fn set_time_ms(&mut self, ms: f32) -> bool {
        let samples = ms.clamp(1.0, MAX_DELAY_MS) / 1000.0 * self.sample_rate;
        self.delay_samples.set_target(samples);
        true
    }

    fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()> {
        match param {
            EffectParam::Feedback => self.feedback = value,
            _ => return Err(EngineError::UnsupportedParameter { param }),
        }
        Ok(())
    }

    fn param(&self, param: EffectParam) -> Option<f32> {
        (param == EffectParam::Feedback).then_some(self.feedback)
    }

    fn reset(&mut self) {
        self.line.reset();
        self.delay_samples.settle();
    }
}
