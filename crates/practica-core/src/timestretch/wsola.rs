//! WSOLA (waveform-similarity overlap-add) time-stretching
//!
//! Output is built from Hann-windowed grains placed every `hop` output
//! frames (50% overlap, so the windows sum to exactly one). Grain `k` is
//! taken from the input near its nominal position `k * hop * ratio`; within
//! `±tolerance` frames the start is chosen whose waveform best matches the
//! natural continuation of the previous grain. Duration scales by `1/ratio`
//! while the local waveform (and therefore pitch) is preserved.
//!
//! The implementation streams: input accumulates in a FIFO, finished output
//! frames in another, and both are allocated once up front. At ratio 1.0 the
//! natural continuation always lies on the nominal position, so the output is
//! the input delayed by [`TimeStretch::output_latency`] frames, bit for bit up
//! to float rounding in the window sum.

use super::TimeStretch;
use crate::types::StereoSample;

/// Accepted range for input frames per output frame
pub const MIN_RATIO: f64 = 0.1;
pub const MAX_RATIO: f64 = 4.0;

/// Extra primed frames absorbing rounding of the nominal grain position
const PRIME_SLACK: usize = 4;

pub struct Wsola {
    window_len: usize,
    hop: usize,
    tolerance: usize,
    window: Vec<f32>,
    input: Vec<StereoSample>,
    ola: Vec<StereoSample>,
    output: Vec<StereoSample>,
    /// Nominal start of the next grain, relative to `input[0]`
    next_nominal: f64,
    /// Natural continuation of the previous grain, relative to `input[0]`
    natural: Option<usize>,
    ratio: f64,
}

impl Wsola {
    /// `window_ms` sets the grain length; `max_block` the largest output block
    pub fn new(sample_rate: u32, window_ms: f64, max_block: usize) -> Self {
        let window_len = ((sample_rate as f64 * window_ms / 1000.0) as usize).max(64) & !1;
        let hop = window_len / 2;
        let tolerance = window_len / 4;

        // Periodic Hann: w[n] + w[n + hop] == 1
        let window = (0..window_len)
            .map(|n| {
                let phase = 2.0 * std::f64::consts::PI * n as f64 / window_len as f64;
                (0.5 - 0.5 * phase.cos()) as f32
            })
            .collect();

        let input_capacity = 4 * (window_len + tolerance) + max_block * MAX_RATIO.ceil() as usize + 64;
        let output_capacity = max_block + 2 * window_len;

        let mut wsola = Self {
            window_len,
            hop,
            tolerance,
            window,
            input: Vec::with_capacity(input_capacity),
            ola: vec![StereoSample::silence(); window_len],
            output: Vec::with_capacity(output_capacity),
            next_nominal: 0.0,
            natural: None,
            ratio: 1.0,
        };
        wsola.reset();
        wsola
    }

    #[inline]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Zero frames queued ahead of real input so grains never starve
    #[inline]
    fn priming(&self) -> usize {
        self.window_len + self.tolerance + PRIME_SLACK
    }

    /// Overlap-add one grain; false when more input is needed
    fn synthesize_grain(&mut self) -> bool {
        let w = self.window_len;
        let h = self.hop;
        let tol = self.tolerance;
        let len = self.input.len();
        let nominal = self.next_nominal.round() as usize;

        let start = match self.natural {
            None => {
                if nominal + w > len {
                    return false;
                }
                nominal
            }
            Some(natural) => {
                if nominal + tol + w > len || natural + h > len {
                    return false;
                }
                let lo = nominal.saturating_sub(tol);
                let hi = nominal + tol;
                if (lo..=hi).contains(&natural) {
                    // The continuation is its own best match
                    natural
                } else {
                    best_match(&self.input, natural, h, lo, hi, nominal)
                }
            }
        };

        if self.output.len() + h > self.output.capacity() {
            return false;
        }

        for i in 0..w {
            self.ola[i] += self.input[start + i] * self.window[i];
        }
        self.output.extend_from_slice(&self.ola[..h]);
        self.ola.copy_within(h.., 0);
        self.ola[w - h..].fill(StereoSample::silence());

        self.next_nominal += h as f64 * self.ratio;
        let natural = start + h;

        // Drop input no future grain can reach
        let lowest_candidate = (self.next_nominal.round() as usize).saturating_sub(tol);
        let keep_from = natural.min(lowest_candidate);
        if keep_from > 0 {
            self.input.drain(..keep_from);
            self.next_nominal -= keep_from as f64;
        }
        self.natural = Some(natural - keep_from);
        true
    }
}

/// Candidate start in `lo..=hi` whose waveform best matches `input[natural..]`
///
/// Uses normalized cross-correlation of the mid signal over `overlap` frames.
/// The nominal position wins ties.
fn best_match(input: &[StereoSample], natural: usize, overlap: usize, lo: usize, hi: usize, nominal: usize) -> usize {
    let target = &input[natural..natural + overlap];

    let score = |candidate: usize| -> f32 {
        let segment = &input[candidate..candidate + overlap];
        let mut dot = 0.0f32;
        let mut energy = 0.0f32;
        for (t, s) in target.iter().zip(segment) {
            let m = s.mid();
            dot += t.mid() * m;
            energy += m * m;
        }
        dot / (energy + 1e-9).sqrt()
    };

    let mut best = nominal;
    let mut best_score = score(nominal);
    for candidate in lo..=hi {
        if candidate == nominal {
            continue;
        }
        let s = score(candidate);
        if s > best_score {
            best = candidate;
            best_score = s;
        }
    }
    best
}

impl TimeStretch for Wsola {
    fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(MIN_RATIO, MAX_RATIO);
    }

    fn ratio(&self) -> f64 {
        self.ratio
    }

    fn process(&mut self, input: &[StereoSample], output: &mut [StereoSample]) {
        let room = self.input.capacity() - self.input.len();
        let take = input.len().min(room);
        self.input.extend_from_slice(&input[..take]);

        while self.output.len() < output.len() {
            if !self.synthesize_grain() {
                break;
            }
        }

        let ready = self.output.len().min(output.len());
        output[..ready].copy_from_slice(&self.output[..ready]);
        output[ready..].fill(StereoSample::silence());
        self.output.drain(..ready);
    }

    fn output_latency(&self) -> usize {
        (self.priming() as f64 / self.ratio).round() as usize
    }

    fn reset(&mut self) {
        self.input.clear();
        let priming = self.priming();
        self.input.resize(priming, StereoSample::silence());
        self.ola.fill(StereoSample::silence());
        self.output.clear();
        self.next_nominal = 0.0;
        self.natural = None;
    }

    fn name(&self) -> &'static str {
        "wsola"
    }
}
