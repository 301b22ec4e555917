//! Time-stretching: change duration without changing pitch
//!
//! The render engine resamples the source for pitch and then feeds the
//! result through a [`TimeStretch`] implementation that restores the
//! requested tempo. Two backends are available:
//!
//! - [`Wsola`]: waveform-similarity overlap-add, allocation-free and exact at
//!   ratio 1.0 (the default)
//! - [`SignalsmithStretcher`]: phase-vocoder quality via signalsmith-stretch
//!
//! # Ratio semantics
//!
//! `ratio` is input frames consumed per output frame: 2.0 plays twice as
//! fast, 0.5 half as fast.

mod signalsmith;
mod wsola;

pub use signalsmith::SignalsmithStretcher;
pub use wsola::{Wsola, MAX_RATIO, MIN_RATIO};

use serde::{Deserialize, Serialize};

use crate::types::StereoSample;

/// A streaming stereo time-stretcher usable from the render thread
///
/// Implementations must not allocate in [`TimeStretch::process`].
pub trait TimeStretch: Send {
    /// Input frames consumed per output frame
    fn set_ratio(&mut self, ratio: f64);

    fn ratio(&self) -> f64;

    /// Feed `input` and write exactly `output.len()` frames
    ///
    /// Callers supply on average `output.len() * ratio` input frames per
    /// call. If not enough input has accumulated the tail is silence.
    fn process(&mut self, input: &[StereoSample], output: &mut [StereoSample]);

    /// Delay between input and output, in output frames
    fn output_latency(&self) -> usize;

    /// Drop all buffered audio
    fn reset(&mut self);

    fn name(&self) -> &'static str;
}

/// Which time-stretch implementation the engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StretchBackend {
    #[default]
    Wsola,
    Signalsmith,
}

/// Build the configured backend for a device sample rate
pub fn create_stretcher(
    backend: StretchBackend,
    sample_rate: u32,
    max_block: usize,
    wsola_window_ms: f64,
) -> Box<dyn TimeStretch> {
    match backend {
        StretchBackend::Wsola => Box::new(Wsola::new(sample_rate, wsola_window_ms, max_block)),
        StretchBackend::Signalsmith => Box::new(SignalsmithStretcher::new(sample_rate)),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::types::StereoSample;
    use realfft::RealFftPlanner;

    /// Steady sine test tone
    pub fn sine(freq: f64, sample_rate: u32, frames: usize, amplitude: f32) -> Vec<StereoSample> {
        (0..frames)
            .map(|n| {
                let phase = 2.0 * std::f64::consts::PI * freq * n as f64 / sample_rate as f64;
                StereoSample::mono(amplitude * phase.sin() as f32)
            })
            .collect()
    }

    /// Frequency of the strongest spectral peak (Hann window, parabolic refinement)
    pub fn dominant_frequency(frames: &[StereoSample], sample_rate: u32) -> f64 {
        let n = frames.len();
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();
        for (i, (slot, frame)) in input.iter_mut().zip(frames).enumerate() {
            let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos();
            *slot = frame.mid() * w;
        }
        fft.process(&mut input, &mut spectrum).unwrap();

        let mags: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
        let (peak, _) = mags
            .iter()
            .enumerate()
            .skip(1)
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });

        let offset = if peak > 0 && peak + 1 < mags.len() {
            let (a, b, c) = (mags[peak - 1], mags[peak], mags[peak + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > 1e-12 { 0.5 * (a - c) / denom } else { 0.0 }
        } else {
            0.0
        };
        (peak as f64 + offset as f64) * sample_rate as f64 / n as f64
    }

    #[test]
    fn test_dominant_frequency_of_pure_tone() {
        let tone = sine(1000.0, 48000, 16384, 0.5);
        let freq = dominant_frequency(&tone, 48000);
        assert!((freq - 1000.0).abs() < 2.0, "measured {}", freq);
    }
}
