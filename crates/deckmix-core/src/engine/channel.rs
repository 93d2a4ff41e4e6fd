//! Channel strip: trim, 3-band EQ, filter, metering, mute and fader state
//!
//! [`ChannelStrip::process`] produces the pre-fader signal. The fader is
//! applied by the mix bus while summing so the cue bus can tap the same
//! block before the fader.

use super::filter::{BiquadCoeffs, BiquadState, FilterMode, StateVariableFilter, FILTER_MAX_HZ, FILTER_MIN_HZ};
use crate::config::ChannelConfig;
use crate::types::{ChannelId, CrossfaderAssign, InputSource, StereoBuffer};

pub const EQ_MIN_DB: f32 = -26.0;
pub const EQ_MAX_DB: f32 = 6.0;
pub const TRIM_MIN_DB: f32 = -24.0;
pub const TRIM_MAX_DB: f32 = 12.0;

/// Level at the bottom of the fader travel before it snaps to silence
pub const FADER_MIN_DB: f32 = -60.0;

const EQ_LOW_HZ: f32 = 100.0;
const EQ_MID_HZ: f32 = 1000.0;
const EQ_HIGH_HZ: f32 = 10_000.0;
const EQ_MID_Q: f32 = 0.7;

/// EQ band selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl EqBand {
    fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Mid => 1,
            Self::High => 2,
        }
    }
}

/// Fader position to linear gain
///
/// Position maps linearly onto decibels from [`FADER_MIN_DB`] to 0 dB; the
/// very bottom of the travel is true silence. Non-decreasing over [0, 1].
pub fn fader_gain(position: f32) -> f32 {
    let position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
    if position == 0.0 {
        return 0.0;
    }
    db_to_gain(FADER_MIN_DB * (1.0 - position))
}

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Levels of the most recent block, measured before mute and fader
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelLevel {
    pub peak: f32,
    pub rms: f32,
}

/// Per-channel processing and state
#[derive(Debug, Clone)]
pub struct ChannelStrip {
    id: ChannelId,
    sample_rate: f32,
    input: InputSource,
    trim_db: f32,
    trim: f32,
    eq_db: [f32; 3],
    eq_coeffs: [BiquadCoeffs; 3],
    eq_state: [BiquadState; 3],
    /// Bands whose coefficients must be recomputed before the next block
    eq_dirty: [bool; 3],
    filter_mode: FilterMode,
    filter_cutoff: f32,
    filter_resonance: f32,
    filter: StateVariableFilter,
    filter_dirty: bool,
    fader: f32,
    /// Fader gain the previous block ended on, start of the next ramp
    applied_fader_gain: f32,
    cue: bool,
    mute: bool,
    solo: bool,
    assign: CrossfaderAssign,
    level: ChannelLevel,
}

impl ChannelStrip {
    pub fn new(id: ChannelId, sample_rate: u32, setup: ChannelConfig) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let cutoff = 1000.0;
        Self {
            id,
            sample_rate,
            input: setup.input,
            trim_db: 0.0,
            trim: 1.0,
            eq_db: [0.0; 3],
            eq_coeffs: [BiquadCoeffs::PASSTHROUGH; 3],
            eq_state: [BiquadState::default(); 3],
            eq_dirty: [false; 3],
            filter_mode: FilterMode::Off,
            filter_cutoff: cutoff,
            filter_resonance: 0.0,
            filter: StateVariableFilter::new(cutoff, 0.0, sample_rate),
            filter_dirty: false,
            fader: 1.0,
            applied_fader_gain: 1.0,
            cue: false,
            mute: false,
            solo: false,
            assign: setup.crossfader,
            level: ChannelLevel::default(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn input_source(&self) -> InputSource {
        self.input
    }

    pub fn set_input_source(&mut self, input: InputSource) {
        self.input = input;
    }

    /// Set the trim in dB (clamped to the trim range)
    pub fn set_trim_db(&mut self, db: f32) {
        if db.is_nan() {
            return;
        }
        self.trim_db = db.clamp(TRIM_MIN_DB, TRIM_MAX_DB);
        self.trim = db_to_gain(self.trim_db);
    }

    pub fn trim_db(&self) -> f32 {
        self.trim_db
    }

    /// Set one EQ band in dB; only that band's coefficients are recomputed
    pub fn set_eq_db(&mut self, band: EqBand, db: f32) {
        if db.is_nan() {
            return;
        }
        let db = db.clamp(EQ_MIN_DB, EQ_MAX_DB);
        let i = band.index();
        if self.eq_db[i] != db {
            self.eq_db[i] = db;
            self.eq_dirty[i] = true;
        }
    }

    pub fn eq_db(&self, band: EqBand) -> f32 {
        self.eq_db[band.index()]
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        if mode != self.filter_mode {
            // Start the new response from rest instead of the old one's state
            self.filter.reset();
            self.filter_mode = mode;
        }
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) {
        if hz.is_nan() {
            return;
        }
        self.filter_cutoff = hz.clamp(FILTER_MIN_HZ, FILTER_MAX_HZ);
        self.filter_dirty = true;
    }

    pub fn filter_cutoff(&self) -> f32 {
        self.filter_cutoff
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        if resonance.is_nan() {
            return;
        }
        self.filter_resonance = resonance.clamp(0.0, 1.0);
        self.filter_dirty = true;
    }

    pub fn filter_resonance(&self) -> f32 {
        self.filter_resonance
    }

    pub fn set_fader(&mut self, position: f32) {
        if position.is_nan() {
            return;
        }
        self.fader = position.clamp(0.0, 1.0);
    }

    pub fn fader(&self) -> f32 {
        self.fader
    }

    pub fn fader_gain(&self) -> f32 {
        fader_gain(self.fader)
    }

    /// Gain ramp for the block about to be summed: (start, end)
    ///
    /// Advances the ramp so the next block starts where this one ends.
    pub(crate) fn take_fader_ramp(&mut self) -> (f32, f32) {
        let end = self.fader_gain();
        let start = std::mem::replace(&mut self.applied_fader_gain, end);
        (start, end)
    }

    pub fn set_cue(&mut self, enabled: bool) {
        self.cue = enabled;
    }

    pub fn cue(&self) -> bool {
        self.cue
    }

    pub fn set_mute(&mut self, muted: bool) {
        self.mute = muted;
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    pub fn solo(&self) -> bool {
        self.solo
    }

    pub fn set_crossfader_assign(&mut self, assign: CrossfaderAssign) {
        self.assign = assign;
    }

    pub fn crossfader_assign(&self) -> CrossfaderAssign {
        self.assign
    }

    /// Levels of the last processed block
    pub fn level(&self) -> ChannelLevel {
        self.level
    }

    fn update_coefficients(&mut self) {
        for i in 0..3 {
            if !self.eq_dirty[i] {
                continue;
            }
            let db = self.eq_db[i];
            self.eq_coeffs[i] = if db == 0.0 {
                BiquadCoeffs::PASSTHROUGH
            } else {
                match i {
                    0 => BiquadCoeffs::low_shelf(EQ_LOW_HZ, db, self.sample_rate),
                    1 => BiquadCoeffs::peaking(EQ_MID_HZ, db, EQ_MID_Q, self.sample_rate),
                    _ => BiquadCoeffs::high_shelf(EQ_HIGH_HZ, db, self.sample_rate),
                }
            };
            self.eq_dirty[i] = false;
        }

        if self.filter_dirty {
            self.filter
                .set(self.filter_cutoff, self.filter_resonance, self.sample_rate);
            self.filter_dirty = false;
        }
    }

    /// Trim, EQ, filter and meter `input` into `output`, then apply mute
    ///
    /// `output` takes the length of `input` (within its capacity).
    pub fn process(&mut self, input: &StereoBuffer, output: &mut StereoBuffer) {
        self.update_coefficients();
        output.set_len_from_capacity(input.len());

        let trim = self.trim;
        let mode = self.filter_mode;
        for (dst, src) in output.iter_mut().zip(input.iter()) {
            let mut frame = [src.left * trim, src.right * trim];
            for band in 0..3 {
                frame = self.eq_state[band].process(frame, &self.eq_coeffs[band]);
            }
            if mode != FilterMode::Off {
                frame = self.filter.process(frame, mode);
            }
            dst.left = frame[0];
            dst.right = frame[1];
        }

        // Metered before mute so a muted channel still shows its signal
        self.level = ChannelLevel {
            peak: output.peak(),
            rms: output.rms(),
        };

        if self.mute {
            output.fill_silence();
        }
    }

    /// Clear filter histories (levels and parameters are kept)
    pub fn reset(&mut self) {
        self.eq_state.iter_mut().for_each(BiquadState::reset);
        self.filter.reset();
    }
}
