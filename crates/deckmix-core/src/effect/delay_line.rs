//! Building blocks shared by the time-based effects

use std::f32::consts::PI;

use crate::types::StereoSample;

/// Stereo circular delay line with fractional reads
///
/// The buffer is sized once at construction; reads and writes never allocate.
pub(crate) struct DelayLine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
}

impl DelayLine {
    /// Line able to delay by up to `max_samples`
    pub fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); max_samples.max(1) + 2],
            write_pos: 0,
        }
    }

    /// Longest delay this line can produce, in samples
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }

    /// Read `delay` samples behind the next write, linearly interpolated
    ///
    /// A delay of 1.0 returns the most recently written frame.
    #[inline]
    pub fn read(&self, delay: f32) -> StereoSample {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, self.max_delay());
        let whole = delay.floor();
        let frac = delay - whole;

        let i0 = (self.write_pos + len - whole as usize) % len;
        let i1 = (i0 + len - 1) % len;
        let a = self.buffer[i0];
        let b = self.buffer[i1];
        StereoSample::new(
            a.left + (b.left - a.left) * frac,
            a.right + (b.right - a.right) * frac,
        )
    }

    #[inline]
    pub fn write(&mut self, frame: StereoSample) {
        self.buffer[self.write_pos] = frame;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn reset(&mut self) {
        self.buffer.fill(StereoSample::silence());
        self.write_pos = 0;
    }
}

/// One-pole glide toward a target, for click-free time changes
#[derive(Debug, Clone)]
pub(crate) struct Smoothed {
    current: f32,
    target: f32,
    coeff: f32,
}

impl Smoothed {
    pub fn new(value: f32, sample_rate: u32, glide_ms: f32) -> Self {
        let samples = glide_ms / 1000.0 * sample_rate as f32;
        let coeff = if samples <= 1.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        };
        Self {
            current: value,
            target: value,
            coeff,
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to the target
    pub fn settle(&mut self) {
        self.current = self.target;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        self.current += (self.target - self.current) * self.coeff;
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

/// Sine LFO with a per-instance phase
#[derive(Debug, Clone)]
pub(crate) struct Lfo {
    phase: f32,
    increment: f32,
    sample_rate: f32,
}

impl Lfo {
    pub fn new(rate_hz: f32, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            phase: 0.0,
            increment: rate_hz / sample_rate,
            sample_rate,
        }
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.increment = rate_hz / self.sample_rate;
    }

    pub fn rate(&self) -> f32 {
        self.increment * self.sample_rate
    }

    /// Value at the current phase plus `offset` cycles, in [-1, 1]
    #[inline]
    pub fn value(&self, offset: f32) -> f32 {
        ((self.phase + offset) * 2.0 * PI).sin()
    }

    #[inline]
    pub fn advance(&mut self) {
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
