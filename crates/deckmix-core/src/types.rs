//! Core types shared across the mixing engine

use serde::{Deserialize, Serialize};

/// Default sample rate used when no device rate is known
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of channel strips created when the config does not say otherwise
pub const DEFAULT_CHANNELS: usize = 4;

/// Hard upper bound on channel strips (fixed-size atomics and takeover tables)
pub const MAX_CHANNELS: usize = 8;

/// Default block size for processing
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Maximum block size the engine pre-allocates for.
/// Larger host buffers are rendered in chunks of this size.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// A single audio sample (32-bit float)
pub type Sample = f32;

/// A stereo sample pair
///
/// `#[repr(C)]` guarantees a `[left, right]` layout, so a slice of these is
/// bit-identical to an interleaved `[L, R, L, R, ...]` buffer. bytemuck
/// relies on this for the zero-copy interleaved views below.
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    pub const fn silence() -> Self {
        Self { left: 0.0, right: 0.0 }
    }

    /// Same value on both sides
    pub const fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Larger absolute value of the two sides
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }

    #[inline]
    pub fn scaled(self, gain: Sample) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }

    /// Linear blend between `self` (dry) and `wet`; `mix` 0 = dry only, 1 = wet only
    #[inline]
    pub fn blend(self, wet: Self, mix: Sample) -> Self {
        let dry = 1.0 - mix;
        Self::new(
            self.left * dry + wet.left * mix,
            self.right * dry + wet.right * mix,
        )
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.left + other.left, self.right + other.right)
    }
}

impl std::ops::AddAssign for StereoSample {
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    fn mul(self, gain: Sample) -> Self {
        self.scaled(gain)
    }
}

/// A block of stereo audio
///
/// Capacity is reserved up front; the audio thread only moves the logical
/// length within that capacity via [`set_len_from_capacity`](Self::set_len_from_capacity),
/// so no allocation happens while rendering.
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a silent buffer of the given length
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer with capacity for `capacity` frames but zero length
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buffer = Self::silence(capacity);
        buffer.set_len_from_capacity(0);
        buffer
    }

    pub fn from_samples(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Build from interleaved `[L, R, L, R, ...]` data; a trailing odd sample is ignored
    pub fn from_interleaved(data: &[Sample]) -> Self {
        let samples = data
            .chunks_exact(2)
            .map(|pair| StereoSample::new(pair[0], pair[1]))
            .collect();
        Self { samples }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Resize the logical length within the existing capacity
    ///
    /// Real-time safe: never reallocates. Requests beyond capacity are
    /// clamped. Newly exposed frames are zeroed.
    #[inline]
    pub fn set_len_from_capacity(&mut self, len: usize) {
        let len = len.min(self.samples.capacity());
        if len <= self.samples.len() {
            self.samples.truncate(len);
        } else {
            // Within capacity, so resize() does not reallocate
            self.samples.resize(len, StereoSample::silence());
        }
    }

    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy interleaved view
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [Sample] {
        bytemuck::cast_slice_mut(&mut self.samples)
    }

    /// Copy as many frames as both buffers hold; the rest of `self` is untouched
    pub fn copy_from(&mut self, other: &StereoBuffer) {
        let len = self.len().min(other.len());
        self.samples[..len].copy_from_slice(&other.samples[..len]);
    }

    /// Accumulate `other * gain` into this buffer
    pub fn add_scaled(&mut self, other: &StereoBuffer, gain: Sample) {
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            *dst += src.scaled(gain);
        }
    }

    /// Accumulate `other` with a gain that moves linearly from `start` to `end`
    /// across the block. Used for de-clicking fader jumps.
    pub fn add_ramped(&mut self, other: &StereoBuffer, start: Sample, end: Sample) {
        if (start - end).abs() <= f32::EPSILON {
            self.add_scaled(other, end);
            return;
        }
        let len = self.len().min(other.len());
        if len == 0 {
            return;
        }
        let step = (end - start) / len as Sample;
        for (i, (dst, src)) in self.samples.iter_mut().zip(other.samples.iter()).enumerate() {
            let gain = start + step * (i + 1) as Sample;
            *dst += src.scaled(gain);
        }
    }

    pub fn scale(&mut self, gain: Sample) {
        for sample in &mut self.samples {
            *sample = sample.scaled(gain);
        }
    }

    /// Apply independent left/right gains
    pub fn scale_stereo(&mut self, left: Sample, right: Sample) {
        for sample in &mut self.samples {
            sample.left *= left;
            sample.right *= right;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Peak absolute value across both sides
    pub fn peak(&self) -> Sample {
        self.samples
            .iter()
            .fold(0.0, |acc: Sample, s| acc.max(s.peak()))
    }

    /// Root-mean-square over both sides of the whole block
    pub fn rms(&self) -> Sample {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .samples
            .iter()
            .map(|s| (s.left as f64).powi(2) + (s.right as f64).powi(2))
            .sum();
        (sum / (self.samples.len() * 2) as f64).sqrt() as Sample
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| s.left == 0.0 && s.right == 0.0)
    }
}

impl std::ops::Index<usize> for StereoBuffer {
    type Output = StereoSample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl std::ops::IndexMut<usize> for StereoBuffer {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// Identifier of a channel strip, numbered from 1 like the hardware
///
/// `ChannelId(0)` is never valid; lookups through [`index`](Self::index) yield `None` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// Build from a zero-based strip index
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().map(Self)
    }

    /// Zero-based index into the strip table
    #[inline]
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical input a channel strip listens to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    #[default]
    Line,
    Phono,
    Digital,
}

/// Which side of the crossfader a channel is routed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossfaderAssign {
    A,
    /// Bypasses the crossfader entirely
    #[default]
    Thru,
    B,
}

impl CrossfaderAssign {
    /// Map a normalized control value onto the three-position switch
    pub fn from_normalized(value: f32) -> Self {
        if value < 1.0 / 3.0 {
            Self::A
        } else if value < 2.0 / 3.0 {
            Self::Thru
        } else {
            Self::B
        }
    }

    pub fn to_normalized(self) -> f32 {
        match self {
            Self::A => 0.0,
            Self::Thru => 0.5,
            Self::B => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_buffer_silence() {
        let buf = StereoBuffer::silence(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.is_silent());
    }

    #[test]
    fn test_set_len_never_exceeds_capacity() {
        let mut buf = StereoBuffer::with_capacity(64);
        assert_eq!(buf.len(), 0);
        buf.set_len_from_capacity(32);
        assert_eq!(buf.len(), 32);
        buf.set_len_from_capacity(10_000);
        assert_eq!(buf.len(), buf.capacity());
    }

    #[test]
    fn test_interleaved_view_layout() {
        let mut buf = StereoBuffer::silence(2);
        buf[0] = StereoSample::new(0.1, 0.2);
        buf[1] = StereoSample::new(0.3, 0.4);
        assert_eq!(buf.as_interleaved(), &[0.1, 0.2, 0.3, 0.4]);

        buf.as_interleaved_mut()[3] = 0.9;
        assert_eq!(buf[1].right, 0.9);
    }

    #[test]
    fn test_add_ramped_reaches_end_gain() {
        let src = StereoBuffer::from_samples(vec![StereoSample::mono(1.0); 4]);
        let mut dst = StereoBuffer::silence(4);
        dst.add_ramped(&src, 0.0, 1.0);
        assert!((dst[0].left - 0.25).abs() < 1e-6);
        assert!((dst[3].left - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_peak_and_rms() {
        let buf = StereoBuffer::from_samples(vec![
            StereoSample::new(0.5, -0.5),
            StereoSample::new(-0.5, 0.5),
        ]);
        assert!((buf.peak() - 0.5).abs() < 1e-6);
        assert!((buf.rms() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_channel_id_indexing() {
        assert_eq!(ChannelId(1).index(), Some(0));
        assert_eq!(ChannelId(0).index(), None);
        assert_eq!(ChannelId::from_index(3), Some(ChannelId(4)));
    }

    #[test]
    fn test_crossfader_assign_from_normalized() {
        assert_eq!(CrossfaderAssign::from_normalized(0.0), CrossfaderAssign::A);
        assert_eq!(CrossfaderAssign::from_normalized(0.5), CrossfaderAssign::Thru);
        assert_eq!(CrossfaderAssign::from_normalized(1.0), CrossfaderAssign::B);
    }
}
