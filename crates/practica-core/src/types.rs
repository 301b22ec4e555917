//! Common types for practica
//!
//! This module contains the fundamental audio types used throughout the
//! engine: stereo frames, scratch buffers for block processing, and the
//! immutable decoded track (`SampleBuffer`).

use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Audio sample type (32-bit float)
pub type Sample = f32;

/// Default device sample rate when nothing else is known
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Average of both channels
    #[inline]
    pub fn mid(&self) -> Sample {
        (self.left + self.right) * 0.5
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// Scratch buffer of stereo frames used inside the render path
///
/// Allocated once with a fixed capacity; per-block length changes go through
/// [`StereoBuffer::set_len_from_capacity`] so the audio thread never allocates.
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create an empty buffer with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
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

    /// Set the working length without reallocating
    ///
    /// Growing fills with silence inside the existing capacity, shrinking
    /// truncates. Callers on the audio thread must stay within `capacity()`.
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let new_len = new_len.min(self.samples.capacity());
        if new_len > self.samples.len() {
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
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

    /// Zero-copy view as interleaved f32 [L, R, L, R, ...]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// Errors raised while building a [`SampleBuffer`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Unsupported channel count: {0} (expected 1 or 2)")]
    InvalidChannelCount(u16),

    #[error("Sample rate must be non-zero")]
    InvalidSampleRate,

    #[error("Interleaved data length {len} is not a multiple of {channels} channels")]
    RaggedInterleaved { len: usize, channels: u16 },

    #[error("Planar channels differ in length: left={left}, right={right}")]
    PlanarLengthMismatch { left: usize, right: usize },
}

/// Decoded PCM for one loaded track
///
/// Immutable once constructed. Mono sources are stored duplicated into both
/// channels so the render path only ever deals with stereo frames; the
/// original channel count is kept for reporting.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    frames: Vec<StereoSample>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Build from interleaved samples (`[L, R, L, R, ...]` or plain mono)
    pub fn from_interleaved(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Self, BufferError> {
        Self::check_format(sample_rate, channels)?;
        if samples.len() % channels as usize != 0 {
            return Err(BufferError::RaggedInterleaved {
                len: samples.len(),
                channels,
            });
        }

        let frames = match channels {
            1 => samples.iter().map(|&s| StereoSample::mono(s)).collect(),
            _ => samples
                .chunks_exact(2)
                .map(|c| StereoSample::new(c[0], c[1]))
                .collect(),
        };

        Ok(Self {
            frames,
            sample_rate,
            channels,
        })
    }

    /// Build from planar channel data (one slice per channel)
    pub fn from_planar(channels: &[&[f32]], sample_rate: u32) -> Result<Self, BufferError> {
        let count = u16::try_from(channels.len()).unwrap_or(u16::MAX);
        Self::check_format(sample_rate, count)?;

        let frames = match channels {
            [mono] => mono.iter().map(|&s| StereoSample::mono(s)).collect(),
            [left, right] => {
                if left.len() != right.len() {
                    return Err(BufferError::PlanarLengthMismatch {
                        left: left.len(),
                        right: right.len(),
                    });
                }
                left.iter()
                    .zip(right.iter())
                    .map(|(&l, &r)| StereoSample::new(l, r))
                    .collect()
            }
            _ => return Err(BufferError::InvalidChannelCount(count)),
        };

        Ok(Self {
            frames,
            sample_rate,
            channels: count,
        })
    }

    /// Build directly from stereo frames
    pub fn from_frames(frames: Vec<StereoSample>, sample_rate: u32) -> Result<Self, BufferError> {
        Self::check_format(sample_rate, 2)?;
        Ok(Self {
            frames,
            sample_rate,
            channels: 2,
        })
    }

    fn check_format(sample_rate: u32, channels: u16) -> Result<(), BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::InvalidSampleRate);
        }
        if !(1..=2).contains(&channels) {
            return Err(BufferError::InvalidChannelCount(channels));
        }
        Ok(())
    }

    #[inline]
    pub fn frames(&self) -> &[StereoSample] {
        &self.frames
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source material (1 or 2)
    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Track length in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.frames.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Convert a time offset to a (fractional) frame position
    #[inline]
    pub fn ms_to_frames(&self, ms: f64) -> f64 {
        ms * self.sample_rate as f64 / 1000.0
    }

    /// Convert a (fractional) frame position to milliseconds
    #[inline]
    pub fn frames_to_ms(&self, frames: f64) -> f64 {
        frames * 1000.0 / self.sample_rate as f64
    }

    /// Mono mixdown used by analysis
    pub fn mono_mixdown(&self) -> Vec<f32> {
        self.frames.iter().map(StereoSample::mid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
        assert_eq!(a.mid(), 1.5);
    }

    #[test]
    fn test_set_len_from_capacity_stays_in_place() {
        let mut buffer = StereoBuffer::with_capacity(16);
        buffer.set_len_from_capacity(8);
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.as_interleaved().len(), 16);

        // Requests beyond capacity are clamped instead of reallocating
        buffer.set_len_from_capacity(64);
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.capacity(), 16);
    }

    #[test]
    fn test_sample_buffer_from_interleaved_stereo() {
        let buffer = SampleBuffer::from_interleaved(&[1.0, 2.0, 3.0, 4.0], 44100, 2).unwrap();
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.frames()[1], StereoSample::new(3.0, 4.0));
        assert_eq!(buffer.channels(), 2);
    }

    #[test]
    fn test_sample_buffer_mono_is_duplicated() {
        let buffer = SampleBuffer::from_interleaved(&[0.5, -0.5], 48000, 1).unwrap();
        assert_eq!(buffer.frames()[0], StereoSample::mono(0.5));
        assert_eq!(buffer.frames()[1], StereoSample::mono(-0.5));
        assert_eq!(buffer.channels(), 1);
    }

    #[test]
    fn test_sample_buffer_rejects_bad_format() {
        assert_eq!(
            SampleBuffer::from_interleaved(&[0.0; 4], 48000, 3).unwrap_err(),
            BufferError::InvalidChannelCount(3)
        );
        assert_eq!(
            SampleBuffer::from_interleaved(&[0.0; 4], 0, 2).unwrap_err(),
            BufferError::InvalidSampleRate
        );
        assert!(matches!(
            SampleBuffer::from_interleaved(&[0.0; 3], 48000, 2),
            Err(BufferError::RaggedInterleaved { len: 3, channels: 2 })
        ));
        assert!(matches!(
            SampleBuffer::from_planar(&[&[0.0; 3], &[0.0; 2]], 48000),
            Err(BufferError::PlanarLengthMismatch { left: 3, right: 2 })
        ));
    }

    #[test]
    fn test_duration_and_conversions() {
        let buffer = SampleBuffer::from_frames(vec![StereoSample::silence(); 96000], 48000).unwrap();
        assert_eq!(buffer.duration_ms(), 2000.0);
        assert_eq!(buffer.ms_to_frames(500.0), 24000.0);
        assert_eq!(buffer.frames_to_ms(12000.0), 250.0);
    }
}
