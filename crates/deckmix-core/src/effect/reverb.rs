//! Freeverb-style stereo reverb with pre-delay
//!
//! Eight damped comb filters in parallel feed four allpass diffusers per
//! side. The right side uses slightly longer lines for stereo spread.

use super::delay_line::DelayLine;
use super::{Algorithm, EffectParam};
use crate::error::{EngineError, EngineResult};
use crate::types::StereoSample;

/// Comb lengths in samples at 44.1 kHz, mutually prime-ish to avoid ringing
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];
const STEREO_SPREAD: usize = 23;

const ALLPASS_FEEDBACK: f32 = 0.5;
/// Comb sum gain, keeps eight parallel combs near unity
const COMB_GAIN: f32 = 0.125;

/// Longest pre-delay
pub const MAX_PRE_DELAY_MS: f32 = 250.0;

struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    damp_state: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
            damp_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.damp_state = output * (1.0 - damp) + self.damp_state * damp;
        self.buffer[self.pos] = input + self.damp_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.damp_state = 0.0;
        self.pos = 0;
    }
}

struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        self.buffer[self.pos] = input + buffered * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        buffered - input
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

pub(crate) struct Reverb {
    pre_delay: DelayLine,
    pre_delay_samples: f32,
    sample_rate: f32,
    combs: [Vec<Comb>; 2],
    allpasses: [Vec<Allpass>; 2],
    /// Room size, 0..1
    size: f32,
    /// High-frequency damping, 0..1
    damping: f32,
}

impl Reverb {
    pub fn new(sample_rate: u32) -> Self {
        let scale = sample_rate as f32 / 44_100.0;
        let scaled = |len: usize, spread: usize| ((len + spread) as f32 * scale) as usize;

        let combs = [0, STEREO_SPREAD].map(|spread| {
            COMB_LENGTHS
                .iter()
                .map(|&len| Comb::new(scaled(len, spread)))
                .collect()
        });
        let allpasses = [0, STEREO_SPREAD].map(|spread| {
            ALLPASS_LENGTHS
                .iter()
                .map(|&len| Allpass::new(scaled(len, spread)))
                .collect()
        });

        let max_pre_delay = (MAX_PRE_DELAY_MS / 1000.0 * sample_rate as f32).ceil() as usize;
        Self {
            pre_delay: DelayLine::new(max_pre_delay),
            pre_delay_samples: 1.0,
            sample_rate: sample_rate as f32,
            combs,
            allpasses,
            size: 0.5,
            damping: 0.5,
        }
    }

    /// Comb feedback for the current room size
    fn feedback(&self) -> f32 {
        0.7 + self.size * 0.28
    }
}

impl Algorithm for Reverb {
    fn process_frame(&mut self, input: StereoSample) -> StereoSample {
        self.pre_delay.write(input);
        let delayed = self.pre_delay.read(self.pre_delay_samples);
        let mono = (delayed.left + delayed.right) * 0.5;
        let feedback = self.feedback();
        let damping = self.damping;

        let mut out = [0.0f32; 2];
        for (side, value) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for comb in &mut self.combs[side] {
                acc += comb.process(mono, feedback, damping);
            }
            acc *= COMB_GAIN;
            for allpass in &mut self.allpasses[side] {
                acc = allpass.process(acc);
            }
            *value = acc;
        }
        StereoSample::new(out[0], out[1])
    }

    /// Time sets the pre-delay
    fn set_time_ms(&mut self, ms: f32) -> bool {
        self.pre_delay_samples = (ms.clamp(0.0, MAX_PRE_DELAY_MS) / 1000.0 * self.sample_rate).max(1.0);
        true
    }

    fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()> {
        match param {
            // Feedback on a reverb is the room size
            EffectParam::Size | EffectParam::Feedback => self.size = value.clamp(0.0, 1.0),
            EffectParam::Damping => self.damping = value,
            _ => return Err(EngineError::UnsupportedParameter { param }),
        }
        Ok(())
    }

    fn param(&self, param: EffectParam) -> Option<f32> {
        match param {
            EffectParam::Size | EffectParam::Feedback => Some(self.size),
            EffectParam::Damping => Some(self.damping),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.pre_delay.reset();
        self.combs.iter_mut().flatten().for_each(Comb::reset);
        self.allpasses.iter_mut().flatten().for_each(Allpass::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_builds_a_tail() {
        let mut reverb = Reverb::new(48_000);
        reverb.process_frame(StereoSample::mono(1.0));
        let tail: f32 = (0..8192)
            .map(|_| reverb.process_frame(StereoSample::silence()).left.abs())
            .sum();
        assert!(tail > 0.01, "tail energy {}", tail);
    }

    #[test]
    fn test_sides_differ() {
        let mut reverb = Reverb::new(48_000);
        reverb.process_frame(StereoSample::mono(1.0));
        let mut differs = false;
        for _ in 0..4096 {
            let out = reverb.process_frame(StereoSample::silence());
            if (out.left - out.right).abs() > 1e-6 {
                differs = true;
            }
        }
        assert!(differs);
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut reverb = Reverb::new(48_000);
        for _ in 0..2048 {
            reverb.process_frame(StereoSample::mono(0.5));
        }
        reverb.reset();
        for _ in 0..2048 {
            assert_eq!(reverb.process_frame(StereoSample::silence()), StereoSample::silence());
        }
    }
}
