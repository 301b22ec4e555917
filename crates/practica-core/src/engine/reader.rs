//! Loop-aware fractional read cursor
//!
//! Walks the source buffer with an arbitrary (fractional) step, always
//! inside the active A/B loop. When the cursor crosses B it wraps back to A
//! by exactly the amount it overshot, so the loop period is sample exact.
//! An equal-power crossfade blends the audio that would have followed B
//! into the audio starting at A, hiding the waveform discontinuity.
//!
//! Every read is described by a short list of [`ReadSegment`]s (one per
//! contiguous run between wraps) that the metronome uses to map beat times
//! onto output frames. A read stops early once that list is full; callers
//! consume the segments and continue with the rest of the block.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::types::StereoSample;

/// Maximum number of contiguous runs recorded per read
pub const MAX_SEGMENTS: usize = 16;

/// Interpolation used when the cursor sits between two frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// 2-point linear (cheap)
    Linear,
    /// 4-point Catmull-Rom
    #[default]
    Cubic,
}

/// A contiguous run of frames within one block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadSegment {
    /// Index of the first frame of the run within the block
    pub start: usize,
    pub len: usize,
    /// Source position of the first frame
    pub src_start: f64,
    /// Source frames advanced per block frame
    pub step: f64,
    /// Source times in `[src_min, src_max)` belong to this run
    pub src_min: f64,
    pub src_max: f64,
    /// Set when the run begins right after a wrap
    pub wrap_overshoot: Option<f64>,
}

impl ReadSegment {
    /// Fractional block frame at which source position `src` is reached
    #[inline]
    pub fn frame_for_source(&self, src: f64) -> f64 {
        self.start as f64 + (src - self.src_start) / self.step
    }
}

#[derive(Debug, Clone)]
pub struct LoopReader {
    position: f64,
    loop_start: f64,
    loop_end: f64,
    interpolation: InterpolationMethod,
    crossfade_frames: usize,
    fade_remaining: usize,
    fade_total: usize,
    /// Continuation cursor past B while a crossfade is running
    tail_position: f64,
    completions: u64,
    segments: [ReadSegment; MAX_SEGMENTS],
    segment_count: usize,
}

impl LoopReader {
    pub fn new(interpolation: InterpolationMethod, crossfade_frames: usize) -> Self {
        Self {
            position: 0.0,
            loop_start: 0.0,
            loop_end: 0.0,
            interpolation,
            crossfade_frames,
            fade_remaining: 0,
            fade_total: 0,
            tail_position: 0.0,
            completions: 0,
            segments: [ReadSegment::default(); MAX_SEGMENTS],
            segment_count: 0,
        }
    }

    /// Current cursor in source frames
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn loop_bounds(&self) -> (f64, f64) {
        (self.loop_start, self.loop_end)
    }

    /// Total wraps since construction (never reset)
    #[inline]
    pub fn completions(&self) -> u64 {
        self.completions
    }

    /// Runs recorded by the last [`LoopReader::read`]
    #[inline]
    pub fn segments(&self) -> &[ReadSegment] {
        &self.segments[..self.segment_count]
    }

    /// New loop with the cursor at its start
    pub fn reset(&mut self, loop_start: f64, loop_end: f64) {
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self.position = loop_start;
        self.fade_remaining = 0;
        self.segment_count = 0;
    }

    /// Change the loop; a cursor outside the new range jumps to its start
    pub fn set_loop(&mut self, loop_start: f64, loop_end: f64) {
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        if self.position < loop_start || self.position >= loop_end {
            self.position = loop_start;
        }
        self.fade_remaining = 0;
    }

    /// Move the cursor, clamped into `[A, B)`
    pub fn seek(&mut self, position: f64) {
        self.position = if position >= self.loop_end || position < self.loop_start {
            self.loop_start
        } else {
            position
        };
        self.fade_remaining = 0;
    }

    /// Round the cursor to the nearest frame (used when the step becomes 1.0)
    pub fn snap_to_frame(&mut self) {
        self.position = self.position.round();
        if self.position >= self.loop_end {
            self.position = self.loop_start;
        }
    }

    /// Fill `out` from the front, advancing `step` source frames per frame
    ///
    /// Returns how many frames were written. That is all of `out` unless the
    /// cursor wrapped [`MAX_SEGMENTS`] times first, in which case the read
    /// ends right after the last recorded wrap.
    pub fn read(&mut self, data: &[StereoSample], out: &mut [StereoSample], step: f64) -> usize {
        self.segment_count = 0;
        let loop_len = self.loop_end - self.loop_start;
        if out.is_empty() {
            return 0;
        }
        if data.is_empty() || !(loop_len > 0.0) || !(step > 0.0) {
            out.fill(StereoSample::silence());
            return out.len();
        }

        let mut run_start = 0;
        let mut run_src_start = self.position;
        let mut run_src_min = self.position;
        let mut run_overshoot = None;

        for i in 0..out.len() {
            let mut frame = read_interpolated(data, self.position, self.interpolation);
            if self.fade_remaining > 0 {
                let t = (self.fade_total - self.fade_remaining) as f32 / self.fade_total as f32;
                let angle = t * FRAC_PI_2;
                let tail = read_interpolated(data, self.tail_position, self.interpolation);
                frame = frame * angle.sin() + tail * angle.cos();
                self.tail_position += step;
                self.fade_remaining -= 1;
            }
            out[i] = frame;

            self.position += step;
            if self.position >= self.loop_end {
                let overshoot = self.position - self.loop_end;
                self.push_segment(ReadSegment {
                    start: run_start,
                    len: i + 1 - run_start,
                    src_start: run_src_start,
                    step,
                    src_min: run_src_min,
                    src_max: self.loop_end,
                    wrap_overshoot: run_overshoot,
                });

                self.tail_position = self.position;
                self.position = self.loop_start + overshoot % loop_len;
                if self.position >= self.loop_end {
                    self.position = self.loop_start;
                }
                self.completions += 1;

                self.fade_total = self.crossfade_frames.min((loop_len / step) as usize);
                self.fade_remaining = self.fade_total;

                run_start = i + 1;
                run_src_start = self.position;
                run_src_min = self.loop_start;
                run_overshoot = Some(overshoot);

                if self.segment_count == MAX_SEGMENTS {
                    return run_start;
                }
            }
        }

        if run_start < out.len() {
            self.push_segment(ReadSegment {
                start: run_start,
                len: out.len() - run_start,
                src_start: run_src_start,
                step,
                src_min: run_src_min,
                src_max: self.position,
                wrap_overshoot: run_overshoot,
            });
        }
        out.len()
    }

    /// Fill all of `out`, discarding segment information
    pub fn read_all(&mut self, data: &[StereoSample], out: &mut [StereoSample], step: f64) {
        let mut done = 0;
        while done < out.len() {
            done += self.read(data, &mut out[done..], step);
        }
    }

    #[inline]
    fn push_segment(&mut self, segment: ReadSegment) {
        self.segments[self.segment_count] = segment;
        self.segment_count += 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interpolation
// ─────────────────────────────────────────────────────────────────────────────

#[inline]
fn lerp_sample(s0: StereoSample, s1: StereoSample, t: f32) -> StereoSample {
    StereoSample {
        left: s0.left + (s1.left - s0.left) * t,
        right: s0.right + (s1.right - s0.right) * t,
    }
}

/// 4-point Catmull-Rom; returns `s1` exactly at `t == 0`
#[inline]
fn cubic_interpolate(s0: StereoSample, s1: StereoSample, s2: StereoSample, s3: StereoSample, t: f32) -> StereoSample {
    if t == 0.0 {
        return s1;
    }
    let t2 = t * t;
    let t3 = t2 * t;

    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    StereoSample {
        left: s0.left * c0 + s1.left * c1 + s2.left * c2 + s3.left * c3,
        right: s0.right * c0 + s1.right * c1 + s2.right * c2 + s3.right * c3,
    }
}

/// Frame at `index`, silence outside the buffer
#[inline]
fn get_sample(data: &[StereoSample], index: i64) -> StereoSample {
    if index < 0 || index >= data.len() as i64 {
        StereoSample::silence()
    } else {
        data[index as usize]
    }
}

/// Read a frame at a fractional position
pub fn read_interpolated(data: &[StereoSample], position: f64, method: InterpolationMethod) -> StereoSample {
    let floor = position.floor();
    let index = floor as i64;
    let frac = (position - floor) as f32;

    match method {
        InterpolationMethod::Linear => {
            if frac == 0.0 {
                return get_sample(data, index);
            }
            lerp_sample(get_sample(data, index), get_sample(data, index + 1), frac)
        }
        InterpolationMethod::Cubic => cubic_interpolate(
            get_sample(data, index - 1),
            get_sample(data, index),
            get_sample(data, index + 1),
            get_sample(data, index + 2),
            frac,
        ),
    }
}
