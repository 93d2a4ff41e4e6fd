//! Insert effects
//!
//! An [`EffectUnit`] wraps one of a closed set of algorithms
//! ([`EffectKind`]) behind a uniform process / set_parameter / reset
//! contract and adds what every kind shares: enable state, wet/dry mix and
//! an optionally beat-locked time constant.
//!
//! Units allocate their delay lines in [`EffectUnit::new`], so they are built
//! on a control thread and moved to the audio thread already sized.

mod delay;
mod delay_line;
mod distortion;
mod modulation;
mod reverb;

pub use delay::MAX_DELAY_MS;
pub use distortion::{soft_clip, SOFT_CLIP_KNEE};
pub use modulation::{MAX_RATE_HZ, MIN_RATE_HZ};
pub use reverb::MAX_PRE_DELAY_MS;

use serde::{Deserialize, Serialize};

use crate::clock::TransportSnapshot;
use crate::error::{EngineError, EngineResult};
use crate::types::{ChannelId, StereoBuffer, StereoSample};

/// Tempo change that forces a beat-locked time to be recomputed
pub const SYNC_BPM_THRESHOLD: f64 = 0.5;

/// Longest value accepted for the `time` parameter (20 s LFO period)
pub const MAX_TIME_MS: f32 = 20_000.0;

/// Available effect algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Delay,
    Reverb,
    Chorus,
    Flanger,
    Phaser,
    Distortion,
}

impl EffectKind {
    pub const ALL: [EffectKind; 6] = [
        Self::Delay,
        Self::Reverb,
        Self::Chorus,
        Self::Flanger,
        Self::Phaser,
        Self::Distortion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Reverb => "reverb",
            Self::Chorus => "chorus",
            Self::Flanger => "flanger",
            Self::Phaser => "phaser",
            Self::Distortion => "distortion",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Parameters this kind responds to
    pub fn params(self) -> &'static [EffectParam] {
        use EffectParam::*;
        match self {
            Self::Delay => &[Mix, Time, Feedback, Sync, Division],
            Self::Reverb => &[Mix, Time, Feedback, Sync, Division, Size, Damping],
            Self::Chorus | Self::Flanger | Self::Phaser => {
                &[Mix, Time, Feedback, Sync, Division, Rate, Depth]
            }
            Self::Distortion => &[Mix, Drive],
        }
    }
}

/// Where an effect unit is inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectSlot {
    /// Insert after a channel strip, before the mix bus
    Channel(ChannelId),
    /// Insert on the summed master output
    Master,
}

/// Named effect parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectParam {
    /// Wet/dry balance, 0 = dry
    Mix,
    /// Milliseconds: delay time, reverb pre-delay or LFO period
    Time,
    Feedback,
    /// Beat sync on (>= 0.5) or off
    Sync,
    /// Beat division in beats, snapped to the nearest [`BeatDivision`]
    Division,
    Size,
    Damping,
    /// LFO rate in Hz
    Rate,
    Depth,
    Drive,
}

impl EffectParam {
    pub const ALL: [EffectParam; 10] = [
        Self::Mix,
        Self::Time,
        Self::Feedback,
        Self::Sync,
        Self::Division,
        Self::Size,
        Self::Damping,
        Self::Rate,
        Self::Depth,
        Self::Drive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Mix => "mix",
            Self::Time => "time",
            Self::Feedback => "feedback",
            Self::Sync => "sync",
            Self::Division => "division",
            Self::Size => "size",
            Self::Damping => "damping",
            Self::Rate => "rate",
            Self::Depth => "depth",
            Self::Drive => "drive",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|param| param.name() == name)
    }

    /// Accepted value range; finite values outside it are clamped
    pub fn range(self) -> (f32, f32) {
        match self {
            Self::Time => (0.0, MAX_TIME_MS),
            Self::Feedback => (0.0, 0.95),
            Self::Division => (BeatDivision::SHORTEST.beats(), BeatDivision::LONGEST.beats()),
            Self::Rate => (MIN_RATE_HZ, MAX_RATE_HZ),
            Self::Mix | Self::Sync | Self::Size | Self::Damping | Self::Depth | Self::Drive => {
                (0.0, 1.0)
            }
        }
    }
}

/// Musical length a time parameter can lock to, measured in beats
///
/// Variants name fractions of a beat, not note values: `QuarterBeat` is a
/// sixteenth note at 4/4, `OneBeat` a quarter note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeatDivision {
    SixteenthBeat,
    EighthBeat,
    ThreeSixteenthsBeat,
    #[default]
    QuarterBeat,
    HalfBeat,
    OneBeat,
    TwoBeats,
    FourBeats,
}

impl BeatDivision {
    pub const ALL: [BeatDivision; 8] = [
        Self::SixteenthBeat,
        Self::EighthBeat,
        Self::ThreeSixteenthsBeat,
        Self::QuarterBeat,
        Self::HalfBeat,
        Self::OneBeat,
        Self::TwoBeats,
        Self::FourBeats,
    ];
    pub const SHORTEST: BeatDivision = Self::SixteenthBeat;
    pub const LONGEST: BeatDivision = Self::FourBeats;

    pub fn beats(self) -> f32 {
        match self {
            Self::SixteenthBeat => 1.0 / 16.0,
            Self::EighthBeat => 1.0 / 8.0,
            Self::ThreeSixteenthsBeat => 3.0 / 16.0,
            Self::QuarterBeat => 0.25,
            Self::HalfBeat => 0.5,
            Self::OneBeat => 1.0,
            Self::TwoBeats => 2.0,
            Self::FourBeats => 4.0,
        }
    }

    /// Closest division to a beat count (compared on a log scale)
    pub fn nearest(beats: f32) -> Self {
        let target = beats.max(f32::MIN_POSITIVE).log2();
        Self::ALL
            .into_iter()
            .min_by(|a, b| {
                let da = (a.beats().log2() - target).abs();
                let db = (b.beats().log2() - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or_default()
    }

    /// Length in milliseconds at `bpm`
    pub fn to_ms(self, bpm: f64) -> f32 {
        (self.beats() as f64 * 60_000.0 / bpm) as f32
    }
}

/// Uniform contract every algorithm implements
///
/// `process_frame` returns the wet signal only; the unit does the mixing.
pub(crate) trait Algorithm: Send {
    fn process_frame(&mut self, input: StereoSample) -> StereoSample;
    /// Apply a new time constant; `false` if the kind has none
    fn set_time_ms(&mut self, ms: f32) -> bool;
    /// Kind-specific parameters (already range-checked)
    fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()>;
    /// Current value of a kind-specific parameter
    fn param(&self, param: EffectParam) -> Option<f32>;
    /// Zero all internal state
    fn reset(&mut self);
}

enum Processor {
    Delay(delay::Delay),
    Reverb(reverb::Reverb),
    Chorus(modulation::ModulatedDelay),
    Flanger(modulation::ModulatedDelay),
    Phaser(modulation::Phaser),
    Distortion(distortion::Distortion),
}

impl Processor {
    fn new(kind: EffectKind, sample_rate: u32) -> Self {
        match kind {
            EffectKind::Delay => Self::Delay(delay::Delay::new(sample_rate)),
            EffectKind::Reverb => Self::Reverb(reverb::Reverb::new(sample_rate)),
            EffectKind::Chorus => Self::Chorus(modulation::ModulatedDelay::chorus(sample_rate)),
            EffectKind::Flanger => Self::Flanger(modulation::ModulatedDelay::flanger(sample_rate)),
            EffectKind::Phaser => Self::Phaser(modulation::Phaser::new(sample_rate)),
            EffectKind::Distortion => Self::Distortion(distortion::Distortion::new()),
        }
    }

    fn algorithm(&mut self) -> &mut dyn Algorithm {
        match self {
            Self::Delay(a) => a,
            Self::Reverb(a) => a,
            Self::Chorus(a) | Self::Flanger(a) => a,
            Self::Phaser(a) => a,
            Self::Distortion(a) => a,
        }
    }

    fn algorithm_ref(&self) -> &dyn Algorithm {
        match self {
            Self::Delay(a) => a,
            Self::Reverb(a) => a,
            Self::Chorus(a) | Self::Flanger(a) => a,
            Self::Phaser(a) => a,
            Self::Distortion(a) => a,
        }
    }
}

/// One inserted effect
pub struct EffectUnit {
    kind: EffectKind,
    enabled: bool,
    mix: f32,
    /// Manual time, used whenever sync is off
    time_ms: f32,
    sync: bool,
    division: BeatDivision,
    /// Tempo the current beat-locked time was derived from
    synced_bpm: Option<f64>,
    processor: Processor,
}

impl EffectUnit {
    /// Build a disabled unit with kind defaults
    ///
    /// Allocates; call off the audio thread.
    pub fn new(kind: EffectKind, sample_rate: u32) -> Self {
        let time_ms = match kind {
            EffectKind::Delay => 375.0,
            EffectKind::Reverb => 20.0,
            EffectKind::Chorus => 1250.0,
            EffectKind::Flanger => 4000.0,
            EffectKind::Phaser => 2000.0,
            EffectKind::Distortion => 0.0,
        };
        let mix = match kind {
            EffectKind::Distortion => 1.0,
            EffectKind::Chorus | EffectKind::Flanger | EffectKind::Phaser => 0.5,
            _ => 0.3,
        };
        let mut processor = Processor::new(kind, sample_rate.max(1));
        processor.algorithm().set_time_ms(time_ms);
        processor.algorithm().reset();

        Self {
            kind,
            enabled: false,
            mix,
            time_ms,
            sync: false,
            division: BeatDivision::default(),
            synced_bpm: None,
            processor,
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable; every transition zeroes the internal state
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.reset();
        }
        self.enabled = enabled;
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn time_ms(&self) -> f32 {
        self.time_ms
    }

    pub fn is_synced(&self) -> bool {
        self.sync
    }

    pub fn division(&self) -> BeatDivision {
        self.division
    }

    /// Time constant currently applied to the algorithm
    pub fn effective_time_ms(&self) -> f32 {
        match (self.sync, self.synced_bpm) {
            (true, Some(bpm)) => self.division.to_ms(bpm),
            _ => self.time_ms,
        }
    }

    /// Set a parameter by name (`"mix"`, `"time"`, ...)
    pub fn set_parameter(&mut self, name: &str, value: f32) -> EngineResult<()> {
        let param = EffectParam::from_name(name).ok_or(EngineError::UnknownParameter)?;
        self.set_param(param, value)
    }

    /// Set a parameter; NaN is rejected, other values are clamped to the range
    pub fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<()> {
        if !self.kind.params().contains(&param) {
            return Err(EngineError::UnsupportedParameter { param });
        }
        if value.is_nan() {
            return Err(EngineError::OutOfRange { param, value });
        }
        let (min, max) = param.range();
        let value = value.clamp(min, max);

        match param {
            EffectParam::Mix => self.mix = value,
            EffectParam::Time => {
                self.time_ms = value;
                if !self.sync {
                    self.processor.algorithm().set_time_ms(value);
                }
            }
            EffectParam::Sync => {
                self.sync = value >= 0.5;
                // Force a recompute against the next transport snapshot
                self.synced_bpm = None;
                if !self.sync {
                    self.processor.algorithm().set_time_ms(self.time_ms);
                }
            }
            EffectParam::Division => {
                self.division = BeatDivision::nearest(value);
                self.synced_bpm = None;
            }
            _ => self.processor.algorithm().set_param(param, value)?,
        }
        Ok(())
    }

    /// Current value of a parameter; `None` if the kind does not have it
    pub fn param(&self, param: EffectParam) -> Option<f32> {
        if !self.kind.params().contains(&param) {
            return None;
        }
        match param {
            EffectParam::Mix => Some(self.mix),
            EffectParam::Time => Some(self.time_ms),
            EffectParam::Sync => Some(if self.sync { 1.0 } else { 0.0 }),
            EffectParam::Division => Some(self.division.beats()),
            _ => self.processor.algorithm_ref().param(param),
        }
    }

    pub fn set_division(&mut self, division: BeatDivision) {
        self.division = division;
        self.synced_bpm = None;
    }

    /// Zero delay lines, filters and LFO phase
    pub fn reset(&mut self) {
        self.processor.algorithm().reset();
    }

    /// Process a block in place
    ///
    /// Disabled units leave the block untouched. With sync on, the time
    /// constant follows the snapshot tempo only once it has drifted by more
    /// than [`SYNC_BPM_THRESHOLD`].
    pub fn process(&mut self, buffer: &mut StereoBuffer, transport: &TransportSnapshot) {
        if !self.enabled {
            return;
        }

        if self.sync {
            let stale = self
                .synced_bpm
                .map_or(true, |bpm| (bpm - transport.bpm).abs() > SYNC_BPM_THRESHOLD);
            if stale {
                self.synced_bpm = Some(transport.bpm);
                let ms = self.division.to_ms(transport.bpm);
                self.processor.algorithm().set_time_ms(ms);
            }
        }

        let mix = self.mix;
        let bounded = self.kind == EffectKind::Distortion;
        let algorithm = self.processor.algorithm();
        for frame in buffer.iter_mut() {
            let wet = algorithm.process_frame(*frame);
            let out = frame.blend(wet, mix);
            *frame = if bounded {
                StereoSample::new(soft_clip(out.left), soft_clip(out.right))
            } else {
                out
            };
        }
    }
}

impl std::fmt::Debug for EffectUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectUnit")
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("mix", &self.mix)
            .field("time_ms", &self.effective_time_ms())
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(bpm: f64) -> TransportSnapshot {
        TransportSnapshot {
            bpm,
            ..Default::default()
        }
    }

    fn enabled(kind: EffectKind) -> EffectUnit {
        let mut unit = EffectUnit::new(kind, 48_000);
        unit.set_enabled(true);
        unit
    }

    #[test]
    fn test_disabled_unit_is_bypass() {
        let mut unit = EffectUnit::new(EffectKind::Distortion, 48_000);
        let mut buffer = StereoBuffer::from_samples(vec![StereoSample::mono(2.0); 16]);
        unit.process(&mut buffer, &transport(120.0));
        assert!(buffer.iter().all(|s| s.left == 2.0));
    }

    #[test]
    fn test_zero_mix_is_dry() {
        let mut unit = enabled(EffectKind::Reverb);
        unit.set_parameter("mix", 0.0).unwrap();
        let mut buffer = StereoBuffer::from_samples(vec![StereoSample::mono(0.25); 256]);
        unit.process(&mut buffer, &transport(120.0));
        assert!(buffer.iter().all(|s| (s.left - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_unknown_parameter_name() {
        let mut unit = enabled(EffectKind::Delay);
        assert_eq!(
            unit.set_parameter("wobble", 1.0),
            Err(EngineError::UnknownParameter)
        );
    }

    #[test]
    fn test_parameter_not_used_by_kind() {
        let mut unit = enabled(EffectKind::Distortion);
        assert_eq!(
            unit.set_parameter("time", 100.0),
            Err(EngineError::UnsupportedParameter {
                param: EffectParam::Time
            })
        );
    }

    #[test]
    fn test_nan_rejected_and_range_clamped() {
        let mut unit = enabled(EffectKind::Delay);
        assert!(matches!(
            unit.set_parameter("mix", f32::NAN),
            Err(EngineError::OutOfRange { .. })
        ));
        unit.set_parameter("mix", 3.0).unwrap();
        assert_eq!(unit.mix(), 1.0);
    }

    #[test]
    fn test_sync_follows_bpm_beyond_threshold() {
        let mut unit = enabled(EffectKind::Delay);
        unit.set_division(BeatDivision::OneBeat);
        unit.set_parameter("sync", 1.0).unwrap();

        let mut buffer = StereoBuffer::silence(64);
        unit.process(&mut buffer, &transport(120.0));
        assert!((unit.effective_time_ms() - 500.0).abs() < 1e-3);

        // Within threshold: held
        unit.process(&mut buffer, &transport(120.4));
        assert!((unit.effective_time_ms() - 500.0).abs() < 1e-3);

        // Beyond threshold: recomputed
        unit.process(&mut buffer, &transport(150.0));
        assert!((unit.effective_time_ms() - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_sync_off_restores_manual_time() {
        let mut unit = enabled(EffectKind::Delay);
        unit.set_parameter("time", 200.0).unwrap();
        unit.set_parameter("sync", 1.0).unwrap();
        unit.process(&mut StereoBuffer::silence(8), &transport(120.0));
        unit.set_parameter("sync", 0.0).unwrap();
        assert_eq!(unit.effective_time_ms(), 200.0);
    }

    #[test]
    fn test_division_snaps_to_nearest() {
        assert_eq!(BeatDivision::nearest(0.24), BeatDivision::QuarterBeat);
        assert_eq!(BeatDivision::nearest(0.19), BeatDivision::ThreeSixteenthsBeat);
        assert_eq!(BeatDivision::nearest(100.0), BeatDivision::FourBeats);
        assert_eq!(BeatDivision::nearest(0.0), BeatDivision::SixteenthBeat);
    }

    #[test]
    fn test_reenable_clears_delay_tail() {
        let mut unit = enabled(EffectKind::Delay);
        unit.set_parameter("mix", 1.0).unwrap();
        unit.set_parameter("time", 10.0).unwrap();

        let mut loud = StereoBuffer::from_samples(vec![StereoSample::mono(0.8); 1024]);
        unit.process(&mut loud, &transport(120.0));

        unit.set_enabled(false);
        unit.set_enabled(true);

        let mut silent = StereoBuffer::silence(1024);
        unit.process(&mut silent, &transport(120.0));
        assert!(silent.is_silent());
    }

    #[test]
    fn test_distortion_output_within_unity() {
        let mut unit = enabled(EffectKind::Distortion);
        unit.set_parameter("drive", 1.0).unwrap();
        unit.set_parameter("mix", 0.5).unwrap();
        let mut buffer = StereoBuffer::from_samples(vec![StereoSample::new(4.0, -4.0); 64]);
        unit.process(&mut buffer, &transport(120.0));
        assert!(buffer.iter().all(|s| s.peak() <= 1.0));
    }

    #[test]
    fn test_every_kind_processes_finite_audio() {
        for kind in EffectKind::ALL {
            let mut unit = enabled(kind);
            let mut buffer = StereoBuffer::from_samples(
                (0..2048)
                    .map(|i| StereoSample::mono(((i as f32) * 0.05).sin() * 0.5))
                    .collect(),
            );
            unit.process(&mut buffer, &transport(128.0));
            assert!(
                buffer.iter().all(|s| s.left.is_finite() && s.right.is_finite()),
                "{:?} produced non-finite output",
                kind
            );
        }
    }
}
