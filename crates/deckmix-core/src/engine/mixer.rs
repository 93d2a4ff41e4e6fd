//! Mix bus - sums channel strips through the crossfader into master and cue
//!
//! Order of operations per block:
//! 1. Each channel's pre-fader block is scaled by its fader (ramped) and
//!    crossfader gain and summed into master, in channel index order
//! 2. Solo: when any channel is soloed only soloed channels reach master
//! 3. Cue-enabled channels are summed pre-fader into the cue bus
//! 4. Master fader, booth gain and balance are applied to master only
//! 5. The headphone output blends cue with the pre-master-fader mix

use serde::{Deserialize, Serialize};

use super::channel::{fader_gain, ChannelStrip};
use crate::config::EngineConfig;
use crate::types::{ChannelId, CrossfaderAssign, StereoBuffer, MAX_BLOCK_SIZE};

/// Crossfader response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossfaderCurve {
    /// Equal-power cosine taper
    #[default]
    Smooth,
    /// Near step: full level until the last few percent of travel
    Sharp,
    /// Linear fade across the whole travel
    Scratch,
}

impl CrossfaderCurve {
    pub fn from_normalized(value: f32) -> Self {
        if value < 1.0 / 3.0 {
            Self::Smooth
        } else if value < 2.0 / 3.0 {
            Self::Sharp
        } else {
            Self::Scratch
        }
    }

    pub fn to_normalized(self) -> f32 {
        match self {
            Self::Smooth => 0.0,
            Self::Sharp => 0.5,
            Self::Scratch => 1.0,
        }
    }
}

/// Portion of the travel over which the sharp curve cuts
const SHARP_CUT: f32 = 0.05;

/// Gains of the A and B sides at `position` (-1 = full A, +1 = full B)
pub fn crossfader_gains(curve: CrossfaderCurve, position: f32) -> (f32, f32) {
    let position = if position.is_nan() { 0.0 } else { position.clamp(-1.0, 1.0) };
    // Travel toward B, 0..1
    let t = (position + 1.0) * 0.5;
    match curve {
        CrossfaderCurve::Smooth => {
            if t <= 0.0 {
                (1.0, 0.0)
            } else if t >= 1.0 {
                (0.0, 1.0)
            } else {
                let angle = t * std::f32::consts::FRAC_PI_2;
                (angle.cos(), angle.sin())
            }
        }
        CrossfaderCurve::Sharp => {
            let a = ((1.0 - t) / SHARP_CUT).min(1.0);
            let b = (t / SHARP_CUT).min(1.0);
            (a, b)
        }
        CrossfaderCurve::Scratch => (1.0 - t, t),
    }
}

/// Gain a channel gets from the crossfader
pub fn crossfader_gain(curve: CrossfaderCurve, position: f32, assign: CrossfaderAssign) -> f32 {
    match assign {
        CrossfaderAssign::Thru => 1.0,
        CrossfaderAssign::A => crossfader_gains(curve, position).0,
        CrossfaderAssign::B => crossfader_gains(curve, position).1,
    }
}

/// Left/right gains for a balance position (-1 = left only, +1 = right only)
///
/// Centre leaves both sides at unity.
pub fn balance_gains(balance: f32) -> (f32, f32) {
    let balance = if balance.is_nan() { 0.0 } else { balance.clamp(-1.0, 1.0) };
    ((1.0 - balance).min(1.0), (1.0 + balance).min(1.0))
}

pub const BOOTH_MAX_GAIN: f32 = 2.0;

/// Master and cue summing
#[derive(Debug, Clone)]
pub struct MixBus {
    channels: Vec<ChannelStrip>,
    crossfader: f32,
    curve: CrossfaderCurve,
    master: f32,
    applied_master_gain: f32,
    booth: f32,
    balance: f32,
    /// 0 = cue only in headphones, 1 = master only
    cue_mix: f32,
    cue_volume: f32,
    /// Pre-master-fader sum, kept for the headphone blend
    scratch: StereoBuffer,
    master_peak: f32,
    cue_peak: f32,
}

impl MixBus {
    /// Create the bus and its fixed set of channel strips
    pub fn new(config: &EngineConfig) -> Self {
        let channels = (0..config.channels)
            .filter_map(|index| {
                ChannelId::from_index(index)
                    .map(|id| ChannelStrip::new(id, config.sample_rate, config.channel(index)))
            })
            .collect();
        Self {
            channels,
            crossfader: 0.0,
            curve: config.crossfader_curve,
            master: 1.0,
            applied_master_gain: 1.0,
            booth: 1.0,
            balance: 0.0,
            cue_mix: 0.0,
            cue_volume: 0.8,
            scratch: StereoBuffer::with_capacity(MAX_BLOCK_SIZE),
            master_peak: 0.0,
            cue_peak: 0.0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, id: ChannelId) -> Option<&ChannelStrip> {
        self.channels.get(id.index()?)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelStrip> {
        self.channels.get_mut(id.index()?)
    }

    pub fn channels(&self) -> &[ChannelStrip] {
        &self.channels
    }

    pub(crate) fn channels_mut(&mut self) -> &mut [ChannelStrip] {
        &mut self.channels
    }

    pub fn set_crossfader(&mut self, position: f32) {
        if !position.is_nan() {
            self.crossfader = position.clamp(-1.0, 1.0);
        }
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    pub fn set_curve(&mut self, curve: CrossfaderCurve) {
        self.curve = curve;
    }

    pub fn curve(&self) -> CrossfaderCurve {
        self.curve
    }

    /// Master fader position, same taper as the channel faders
    pub fn set_master(&mut self, position: f32) {
        if !position.is_nan() {
            self.master = position.clamp(0.0, 1.0);
        }
    }

    pub fn master(&self) -> f32 {
        self.master
    }

    /// Booth gain, linear 0..2
    pub fn set_booth(&mut self, gain: f32) {
        if !gain.is_nan() {
            self.booth = gain.clamp(0.0, BOOTH_MAX_GAIN);
        }
    }

    pub fn booth(&self) -> f32 {
        self.booth
    }

    pub fn set_balance(&mut self, balance: f32) {
        if !balance.is_nan() {
            self.balance = balance.clamp(-1.0, 1.0);
        }
    }

    pub fn balance(&self) -> f32 {
        self.balance
    }

    pub fn set_cue_mix(&mut self, mix: f32) {
        if !mix.is_nan() {
            self.cue_mix = mix.clamp(0.0, 1.0);
        }
    }

    pub fn cue_mix(&self) -> f32 {
        self.cue_mix
    }

    pub fn set_cue_volume(&mut self, volume: f32) {
        if !volume.is_nan() {
            self.cue_volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn cue_volume(&self) -> f32 {
        self.cue_volume
    }

    pub fn any_solo(&self) -> bool {
        self.channels.iter().any(ChannelStrip::solo)
    }

    /// Effective crossfader gain for one channel at the current position
    pub fn channel_crossfader_gain(&self, id: ChannelId) -> Option<f32> {
        self.channel(id)
            .map(|ch| crossfader_gain(self.curve, self.crossfader, ch.crossfader_assign()))
    }

    pub fn master_peak(&self) -> f32 {
        self.master_peak
    }

    pub fn cue_peak(&self) -> f32 {
        self.cue_peak
    }

    /// Sum processed channel blocks into `master_out` and `cue_out`
    ///
    /// `channel_outputs[i]` is the pre-fader output of strip `i`; missing
    /// entries count as silence. Both outputs take the length of `master_out`.
    pub fn mix_block(
        &mut self,
        channel_outputs: &[StereoBuffer],
        master_out: &mut StereoBuffer,
        cue_out: &mut StereoBuffer,
    ) {
        let len = master_out.len();
        master_out.fill_silence();
        cue_out.set_len_from_capacity(len);
        cue_out.fill_silence();

        let solo_active = self.any_solo();
        let (curve, position) = (self.curve, self.crossfader);

        // Strict index order keeps the floating-point sum reproducible
        for (channel, block) in self.channels.iter_mut().zip(channel_outputs.iter()) {
            let (start, end) = channel.take_fader_ramp();
            let xfade = crossfader_gain(curve, position, channel.crossfader_assign());

            if !solo_active || channel.solo() {
                master_out.add_ramped(block, start * xfade, end * xfade);
            }
            if channel.cue() {
                cue_out.add_scaled(block, 1.0);
            }
        }

        self.scratch.set_len_from_capacity(len);
        self.scratch.copy_from(master_out);

        let master_start = self.applied_master_gain;
        let master_end = fader_gain(self.master);
        self.applied_master_gain = master_end;
        let (left, right) = balance_gains(self.balance);

        let pre_master = &self.scratch;
        master_out.fill_silence();
        master_out.add_ramped(pre_master, master_start * self.booth, master_end * self.booth);
        master_out.scale_stereo(left, right);

        let cue_mix = self.cue_mix;
        let cue_volume = self.cue_volume;
        for (cue, master) in cue_out.iter_mut().zip(pre_master.iter()) {
            *cue = cue.blend(*master, cue_mix).scaled(cue_volume);
        }

        self.master_peak = master_out.peak();
        self.cue_peak = cue_out.peak();
    }

    /// Clear every strip's filter history
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}
