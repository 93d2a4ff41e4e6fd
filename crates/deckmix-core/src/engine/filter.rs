//! Channel strip filters: RBJ biquads for the EQ, a TPT state-variable
//! filter for the sweepable channel filter

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Biquad coefficients, normalized by a0
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    pub const PASSTHROUGH: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Shelf slope S = 0.9, gentle enough for a DJ EQ
    fn shelf_alpha(a: f32, sin_w0: f32) -> f32 {
        sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt()
    }

    pub fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = Self::shelf_alpha(a, sin_w0);
        let sqrt_a = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + sqrt_a;
        Self {
            b0: a * ((a + 1.0) - (a - 1.0) * cos_w0 + sqrt_a) / a0,
            b1: 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) - (a - 1.0) * cos_w0 - sqrt_a) / a0,
            a1: -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - sqrt_a) / a0,
        }
    }

    pub fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    pub fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = Self::shelf_alpha(a, sin_w0);
        let sqrt_a = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + sqrt_a;
        Self {
            b0: a * ((a + 1.0) + (a - 1.0) * cos_w0 + sqrt_a) / a0,
            b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) + (a - 1.0) * cos_w0 - sqrt_a) / a0,
            a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - sqrt_a) / a0,
        }
    }
}

/// Direct form I history for both sides
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BiquadState {
    x1: [f32; 2],
    x2: [f32; 2],
    y1: [f32; 2],
    y2: [f32; 2],
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: [f32; 2], c: &BiquadCoeffs) -> [f32; 2] {
        let mut out = [0.0; 2];
        for side in 0..2 {
            let x = input[side];
            let y = c.b0 * x + c.b1 * self.x1[side] + c.b2 * self.x2[side]
                - c.a1 * self.y1[side]
                - c.a2 * self.y2[side];
            self.x2[side] = self.x1[side];
            self.x1[side] = x;
            self.y2[side] = self.y1[side];
            self.y1[side] = y;
            out[side] = y;
        }
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Response of the channel filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Off,
    LowPass,
    HighPass,
}

impl FilterMode {
    /// Map a normalized control value onto the three modes
    pub fn from_normalized(value: f32) -> Self {
        if value < 1.0 / 3.0 {
            Self::Off
        } else if value < 2.0 / 3.0 {
            Self::LowPass
        } else {
            Self::HighPass
        }
    }

    pub fn to_normalized(self) -> f32 {
        match self {
            Self::Off => 0.0,
            Self::LowPass => 0.5,
            Self::HighPass => 1.0,
        }
    }
}

pub const FILTER_MIN_HZ: f32 = 20.0;
pub const FILTER_MAX_HZ: f32 = 20_000.0;

/// Zero-delay-feedback state-variable filter (Simper's TPT form)
#[derive(Debug, Clone)]
pub(crate) struct StateVariableFilter {
    ic1: [f32; 2],
    ic2: [f32; 2],
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl StateVariableFilter {
    pub fn new(cutoff_hz: f32, resonance: f32, sample_rate: f32) -> Self {
        let mut filter = Self {
            ic1: [0.0; 2],
            ic2: [0.0; 2],
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        };
        filter.set(cutoff_hz, resonance, sample_rate);
        filter
    }

    /// `resonance` 0..1 maps onto Q 0.5..10
    pub fn set(&mut self, cutoff_hz: f32, resonance: f32, sample_rate: f32) {
        let nyquist_guard = sample_rate * 0.49;
        let cutoff = cutoff_hz.clamp(FILTER_MIN_HZ, FILTER_MAX_HZ.min(nyquist_guard));
        let q = 0.5 + resonance.clamp(0.0, 1.0) * 9.5;
        let g = (PI * cutoff / sample_rate).tan();
        self.k = 1.0 / q;
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    #[inline]
    pub fn process(&mut self, input: [f32; 2], mode: FilterMode) -> [f32; 2] {
        let mut out = input;
        for side in 0..2 {
            let x = input[side];
            let v3 = x - self.ic2[side];
            let v1 = self.a1 * self.ic1[side] + self.a2 * v3;
            let v2 = self.ic2[side] + self.a2 * self.ic1[side] + self.a3 * v3;
            self.ic1[side] = 2.0 * v1 - self.ic1[side];
            self.ic2[side] = 2.0 * v2 - self.ic2[side];
            out[side] = match mode {
                FilterMode::Off => x,
                FilterMode::LowPass => v2,
                FilterMode::HighPass => x - self.k * v1 - v2,
            };
        }
        out
    }

    pub fn reset(&mut self) {
        self.ic1 = [0.0; 2];
        self.ic2 = [0.0; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Output peak over input peak, both as sampled
    ///
    /// High test tones never hit the crest at 48kHz (8kHz peaks at 0.866),
    /// so the input's own sampled peak is the reference.
    fn sine_gain(mut f: impl FnMut([f32; 2]) -> [f32; 2], freq: f32) -> f32 {
        let sr = 48_000.0;
        let mut in_peak = 0.0f32;
        let mut out_peak = 0.0f32;
        for i in 0..48_000 {
            let x = (2.0 * PI * freq * i as f32 / sr).sin();
            let y = f([x, x])[0];
            // Skip the settling period
            if i > 24_000 {
                in_peak = in_peak.max(x.abs());
                out_peak = out_peak.max(y.abs());
            }
        }
        out_peak / in_peak
    }

    #[test]
    fn test_zero_db_shelf_is_transparent() {
        let coeffs = BiquadCoeffs::low_shelf(100.0, 0.0, 48_000.0);
        let mut state = BiquadState::default();
        let gain = sine_gain(|x| state.process(x, &coeffs), 1000.0);
        assert!((gain - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_low_shelf_cut_attenuates_bass() {
        let coeffs = BiquadCoeffs::low_shelf(100.0, -26.0, 48_000.0);
        let mut state = BiquadState::default();
        let gain = sine_gain(|x| state.process(x, &coeffs), 20.0);
        assert!(gain < 0.25, "gain {}", gain);
    }

    #[test]
    fn test_peaking_boost() {
        let coeffs = BiquadCoeffs::peaking(1000.0, 6.0, 0.7, 48_000.0);
        let mut state = BiquadState::default();
        let gain = sine_gain(|x| state.process(x, &coeffs), 1000.0);
        assert!((gain - 2.0).abs() < 0.05, "gain {}", gain);
    }

    #[test]
    fn test_svf_lowpass_removes_highs() {
        let mut svf = StateVariableFilter::new(200.0, 0.0, 48_000.0);
        let gain = sine_gain(|x| svf.process(x, FilterMode::LowPass), 8000.0);
        assert!(gain < 0.01, "gain {}", gain);
    }

    #[test]
    fn test_svf_highpass_passes_highs() {
        let mut svf = StateVariableFilter::new(200.0, 0.0, 48_000.0);
        let gain = sine_gain(|x| svf.process(x, FilterMode::HighPass), 8000.0);
        assert!(gain > 0.95, "gain {}", gain);
    }
}
