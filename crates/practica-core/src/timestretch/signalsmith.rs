//! signalsmith-stretch backend
//!
//! Wraps the phase-vocoder stretcher. The stretch ratio is implied by the
//! input and output lengths of each call; pitch stays untouched because the
//! engine handles transposition in its own resampling stage.

use signalsmith_stretch::Stretch;

use super::{TimeStretch, MAX_RATIO, MIN_RATIO};
use crate::types::StereoSample;

const CHANNELS: u32 = 2;

pub struct SignalsmithStretcher {
    stretcher: Stretch,
    ratio: f64,
}

impl SignalsmithStretcher {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            ratio: 1.0,
        }
    }

    /// Lower-CPU preset
    pub fn new_cheaper(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_cheaper(CHANNELS, sample_rate),
            ratio: 1.0,
        }
    }

    pub fn input_latency(&self) -> usize {
        self.stretcher.input_latency()
    }
}

impl TimeStretch for SignalsmithStretcher {
    fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(MIN_RATIO, MAX_RATIO);
    }

    fn ratio(&self) -> f64 {
        self.ratio
    }

    fn process(&mut self, input: &[StereoSample], output: &mut [StereoSample]) {
        output.fill(StereoSample::silence());
        if input.is_empty() || output.is_empty() {
            return;
        }
        let input_interleaved: &[f32] = bytemuck::cast_slice(input);
        let output_interleaved: &mut [f32] = bytemuck::cast_slice_mut(output);
        self.stretcher.process(input_interleaved, output_interleaved);
    }

    fn output_latency(&self) -> usize {
        let input_in_output_frames = (self.stretcher.input_latency() as f64 / self.ratio).round() as usize;
        input_in_output_frames + self.stretcher.output_latency()
    }

    fn reset(&mut self) {
        self.stretcher.reset();
    }

    fn name(&self) -> &'static str {
        "signalsmith"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretcher_creation() {
        let stretcher = SignalsmithStretcher::new(48000);
        assert_eq!(stretcher.ratio(), 1.0);
        assert!(stretcher.input_latency() > 0);
        assert!(stretcher.output_latency() > 0);
    }

    #[test]
    fn test_ratio_is_clamped() {
        let mut stretcher = SignalsmithStretcher::new_cheaper(48000);
        stretcher.set_ratio(10.0);
        assert_eq!(stretcher.ratio(), MAX_RATIO);
        stretcher.set_ratio(0.0);
        assert_eq!(stretcher.ratio(), MIN_RATIO);
    }

    #[test]
    fn test_process_fills_requested_length() {
        let mut stretcher = SignalsmithStretcher::new(48000);
        stretcher.set_ratio(0.5);
        let input = vec![StereoSample::mono(0.1); 256];
        let mut output = vec![StereoSample::mono(9.0); 512];
        stretcher.process(&input, &mut output);
        assert!(output.iter().all(|s| s.left.is_finite() && s.left.abs() < 1.0));
    }
}
