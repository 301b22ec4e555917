//! Offline tempo and beat-phase estimation
//!
//! 1. Onset envelope: log-compressed spectral flux of the mono mixdown
//!    (Hann-windowed frames, positive magnitude increments summed over bins),
//!    high-passed by subtracting a short moving average
//! 2. Tempo: the lag with the strongest normalized autocorrelation of the
//!    envelope inside the configured BPM range, refined by parabolic
//!    interpolation. The normalized peak height is the confidence
//! 3. Phase: comb sum of the envelope at multiples of the period over the
//!    first seconds of the track; the best offset is the first beat
//!
//! Frames are analysed in parallel with rayon.

use std::sync::Arc;

use rayon::prelude::*;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config::AnalysisConfig;
use crate::types::SampleBuffer;

/// Log compression strength for spectral magnitudes
const LOG_GAMMA: f32 = 100.0;

/// Frames per parallel work unit
const FRAMES_PER_CHUNK: usize = 256;

/// Half-width of the moving average removed from the envelope
const ENVELOPE_AVERAGE_RADIUS: usize = 8;

/// Seconds of envelope used to locate the first beat
const PHASE_SEARCH_SECS: f64 = 16.0;

/// Result of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempoEstimate {
    /// 0 when no tempo was found
    pub bpm: f64,
    pub beat_phase_ms: f64,
    /// Normalized autocorrelation strength of the chosen period (0..1)
    pub confidence: f64,
}

impl TempoEstimate {
    /// Inconclusive analysis
    pub fn undetected() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_detected(&self) -> bool {
        self.bpm > 0.0
    }
}

pub struct TempoAnalyzer {
    config: AnalysisConfig,
}

impl TempoAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse a whole buffer
    pub fn analyze(&self, buffer: &SampleBuffer) -> TempoEstimate {
        self.analyze_cancellable(buffer, &|| false)
            .unwrap_or_else(TempoEstimate::undetected)
    }

    /// Analyse, polling `cancelled` between stages; `None` when cancelled
    pub fn analyze_cancellable(&self, buffer: &SampleBuffer, cancelled: &(dyn Fn() -> bool + Sync)) -> Option<TempoEstimate> {
        let sample_rate = buffer.sample_rate() as f64;
        let frame = self.config.frame_size.max(64);
        let hop = self.config.hop_size.clamp(1, frame);

        let mut mono = buffer.mono_mixdown();
        let limit = (self.config.max_analysis_secs.max(0.0) * sample_rate) as usize;
        mono.truncate(limit);

        let flux = spectral_flux(&mono, frame, hop, cancelled)?;
        if cancelled() {
            return None;
        }
        let envelope = onset_envelope(&flux);

        let frames_per_sec = sample_rate / hop as f64;
        let lag_min = ((frames_per_sec * 60.0 / self.config.max_bpm).floor() as usize).max(2);
        let lag_max = ((frames_per_sec * 60.0 / self.config.min_bpm).ceil() as usize).min(envelope.len() / 2);
        if lag_max <= lag_min + 1 {
            log::debug!("TempoAnalyzer: {} envelope frames are too few", envelope.len());
            return Some(TempoEstimate::undetected());
        }

        let Some((lag, confidence)) = strongest_period(&envelope, lag_min, lag_max) else {
            return Some(TempoEstimate::undetected());
        };
        if confidence < self.config.confidence_threshold {
            log::debug!(
                "TempoAnalyzer: best period has confidence {:.3} (< {:.3})",
                confidence,
                self.config.confidence_threshold
            );
            return Some(TempoEstimate::undetected());
        }
        if cancelled() {
            return None;
        }

        let bpm = 60.0 * frames_per_sec / lag;
        let search_frames = ((PHASE_SEARCH_SECS * frames_per_sec) as usize).min(envelope.len());
        let offset = beat_offset(&envelope[..search_frames], lag);

        // A frame's flux peaks when an onset reaches the rising half of its window
        let onset_sample = offset * hop as f64 + 0.75 * frame as f64;
        let period_ms = 60000.0 / bpm;
        let beat_phase_ms = (onset_sample * 1000.0 / sample_rate).rem_euclid(period_ms);

        Some(TempoEstimate {
            bpm,
            beat_phase_ms,
            confidence,
        })
    }
}

/// Positive log-magnitude increments per frame
fn spectral_flux(mono: &[f32], frame: usize, hop: usize, cancelled: &(dyn Fn() -> bool + Sync)) -> Option<Vec<f32>> {
    if mono.len() < frame {
        return Some(Vec::new());
    }
    let frame_count = (mono.len() - frame) / hop + 1;

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame);
    let window: Vec<f32> = (0..frame)
        .map(|n| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / frame as f32).cos())
        .collect();

    let chunks: Vec<Option<Vec<f32>>> = (0..frame_count.div_ceil(FRAMES_PER_CHUNK))
        .into_par_iter()
        .map(|chunk| {
            if cancelled() {
                return None;
            }
            let start = chunk * FRAMES_PER_CHUNK;
            let end = (start + FRAMES_PER_CHUNK).min(frame_count);
            Some(flux_chunk(mono, &fft, &window, hop, start, end))
        })
        .collect();

    let mut flux = Vec::with_capacity(frame_count);
    for chunk in chunks {
        flux.extend(chunk?);
    }
    Some(flux)
}

/// Flux of frames `start..end`; frame 0 compares against silence
fn flux_chunk(
    mono: &[f32],
    fft: &Arc<dyn RealToComplex<f32>>,
    window: &[f32],
    hop: usize,
    start: usize,
    end: usize,
) -> Vec<f32> {
    let frame = window.len();
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();
    let mut previous = vec![0.0f32; spectrum.len()];
    let mut current = vec![0.0f32; spectrum.len()];

    let mut log_magnitudes = |index: usize, out: &mut [f32]| {
        let offset = index * hop;
        for ((slot, sample), w) in input.iter_mut().zip(&mono[offset..offset + frame]).zip(window) {
            *slot = sample * w;
        }
        if fft.process(&mut input, &mut spectrum).is_err() {
            out.fill(0.0);
            return;
        }
        for (m, bin) in out.iter_mut().zip(&spectrum) {
            *m = (1.0 + LOG_GAMMA * bin.norm()).ln();
        }
    };

    if start > 0 {
        log_magnitudes(start - 1, &mut previous);
    }
    let mut flux = Vec::with_capacity(end - start);
    for index in start..end {
        log_magnitudes(index, &mut current);
        let value: f32 = current
            .iter()
            .zip(&previous)
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        flux.push(value);
        std::mem::swap(&mut previous, &mut current);
    }
    flux
}

/// Flux minus its local average, half-wave rectified
fn onset_envelope(flux: &[f32]) -> Vec<f64> {
    let n = flux.len();
    let mut prefix = vec![0.0f64; n + 1];
    for (i, &f) in flux.iter().enumerate() {
        prefix[i + 1] = prefix[i] + f as f64;
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(ENVELOPE_AVERAGE_RADIUS);
            let hi = (i + ENVELOPE_AVERAGE_RADIUS + 1).min(n);
            let average = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
            (flux[i] as f64 - average).max(0.0)
        })
        .collect()
}

/// Fractional lag and confidence of the autocorrelation peak in `lag_min..=lag_max`
fn strongest_period(envelope: &[f64], lag_min: usize, lag_max: usize) -> Option<(f64, f64)> {
    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let centered: Vec<f64> = envelope.iter().map(|e| e - mean).collect();
    let energy: f64 = centered.iter().map(|c| c * c).sum();
    if energy <= f64::EPSILON {
        return None;
    }

    // Biased estimate: longer lags have fewer terms, which favours the
    // fundamental period over its multiples
    let lo = lag_min - 1;
    let hi = (lag_max + 1).min(centered.len() - 1);
    let ac: Vec<f64> = (lo..=hi)
        .into_par_iter()
        .map(|lag| centered.iter().zip(&centered[lag..]).map(|(a, b)| a * b).sum::<f64>() / energy)
        .collect();

    let (best, &peak) = ac
        .iter()
        .enumerate()
        .skip(1)
        .take(lag_max - lag_min + 1)
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak <= 0.0 {
        return None;
    }

    let refined = if best + 1 < ac.len() {
        let (a, b, c) = (ac[best - 1], peak, ac[best + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > 1e-12 {
            (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    } else {
        0.0
    };

    Some(((lo + best) as f64 + refined, peak.min(1.0)))
}

/// Fractional frame offset (in `[0, period)`) of the first beat
fn beat_offset(envelope: &[f64], period: f64) -> f64 {
    let candidates = period.ceil() as usize;
    let score = |offset: usize| -> f64 {
        let mut sum = 0.0;
        let mut position = offset as f64;
        while (position.round() as usize) < envelope.len() {
            sum += envelope[position.round() as usize];
            position += period;
        }
        sum
    };
    let scores: Vec<f64> = (0..candidates).map(score).collect();

    let Some((best, &peak)) = scores.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)) else {
        return 0.0;
    };
    let before = scores[(best + candidates - 1) % candidates];
    let after = scores[(best + 1) % candidates];
    let denom = before - 2.0 * peak + after;
    let refined = if denom.abs() > 1e-12 {
        (0.5 * (before - after) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    (best as f64 + refined).rem_euclid(period)
}
