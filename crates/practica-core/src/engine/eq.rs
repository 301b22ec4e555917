//! Parametric EQ (RBJ cookbook biquads)
//!
//! Bands run in series in their configured order. Coefficients are
//! recomputed only when the band list changes; the filter memory survives
//! coefficient changes so sweeping a band does not click.

use crate::state::{EqBand, EqBandKind, EqBands, MAX_EQ_BANDS};
use crate::types::StereoSample;

/// Per-band filter memory (both channels)
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: StereoSample, c: &BiquadCoeffs) -> StereoSample {
        let out_l = c.b0 * input.left + c.b1 * self.x1_l + c.b2 * self.x2_l
                  - c.a1 * self.y1_l - c.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input.left;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = c.b0 * input.right + c.b1 * self.x1_r + c.b2 * self.x2_r
                  - c.a1 * self.y1_r - c.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input.right;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        StereoSample::new(out_l, out_r)
    }
}

/// Normalized biquad coefficients (a0 == 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    pub fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    /// Coefficients for one band at `sample_rate`
    ///
    /// The centre frequency is kept below Nyquist so high bands on low-rate
    /// devices stay stable.
    pub fn for_band(band: &EqBand, sample_rate: f32) -> Self {
        let freq = band.frequency.min(sample_rate * 0.49);
        match band.kind {
            EqBandKind::Peaking => Self::peaking(freq, band.gain_db, band.q, sample_rate),
            EqBandKind::LowShelf => Self::low_shelf(freq, band.gain_db, band.q, sample_rate),
            EqBandKind::HighShelf => Self::high_shelf(freq, band.gain_db, band.q, sample_rate),
        }
    }

    pub fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    pub fn low_shelf(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * (w0.sin() / (2.0 * q));

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    pub fn high_shelf(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * (w0.sin() / (2.0 * q));

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }
}

/// Series chain of up to [`MAX_EQ_BANDS`] biquads
pub struct EqChain {
    sample_rate: f32,
    coeffs: [BiquadCoeffs; MAX_EQ_BANDS],
    states: [BiquadState; MAX_EQ_BANDS],
    active: usize,
}

impl EqChain {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            coeffs: [BiquadCoeffs::passthrough(); MAX_EQ_BANDS],
            states: [BiquadState::default(); MAX_EQ_BANDS],
            active: 0,
        }
    }

    /// Load a band list (no allocation)
    pub fn set_bands(&mut self, bands: &EqBands) {
        let list = bands.as_slice();
        for (slot, band) in self.coeffs.iter_mut().zip(list) {
            *slot = BiquadCoeffs::for_band(band, self.sample_rate);
        }
        // Bands that become active start from silence
        for state in &mut self.states[self.active.min(list.len())..list.len()] {
            *state = BiquadState::default();
        }
        self.active = list.len();
    }

    pub fn is_flat(&self) -> bool {
        self.active == 0
    }

    /// Clear filter memory (new track)
    pub fn reset(&mut self) {
        self.states = [BiquadState::default(); MAX_EQ_BANDS];
    }

    pub fn process(&mut self, frames: &mut [StereoSample]) {
        if self.active == 0 {
            return;
        }
        for frame in frames.iter_mut() {
            let mut s = *frame;
            for (state, coeffs) in self.states[..self.active].iter_mut().zip(&self.coeffs[..self.active]) {
                s = state.process(s, coeffs);
            }
            *frame = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48000;

    fn tone(freq: f32, frames: usize) -> Vec<StereoSample> {
        (0..frames)
            .map(|n| StereoSample::mono((2.0 * std::f32::consts::PI * freq * n as f32 / SR as f32).sin() * 0.1))
            .collect()
    }

    fn settled_peak(frames: &[StereoSample]) -> f32 {
        frames[frames.len() / 2..].iter().map(|s| s.peak()).fold(0.0, f32::max)
    }

    #[test]
    fn test_empty_band_list_is_identity() {
        let mut eq = EqChain::new(SR);
        eq.set_bands(&EqBands::flat());
        let input = tone(440.0, 1024);
        let mut frames = input.clone();
        eq.process(&mut frames);
        assert_eq!(frames, input);
        assert!(eq.is_flat());
    }

    #[test]
    fn test_peaking_boost_at_centre() {
        let mut eq = EqChain::new(SR);
        let bands = EqBands::from_slice(&[EqBand::peaking(1000.0, 12.0, 1.0)]).unwrap();
        eq.set_bands(&bands);

        let mut at_centre = tone(1000.0, 9600);
        eq.process(&mut at_centre);
        let gain = settled_peak(&at_centre) / 0.1;
        // +12 dB ~= x3.98
        assert!((gain - 3.98).abs() < 0.2, "gain at centre {}", gain);

        eq.reset();
        let mut far_away = tone(60.0, 48000);
        eq.process(&mut far_away);
        let gain = settled_peak(&far_away) / 0.1;
        assert!((gain - 1.0).abs() < 0.1, "gain far from centre {}", gain);
    }

    #[test]
    fn test_bands_apply_in_series() {
        let mut eq = EqChain::new(SR);
        let bands = EqBands::from_slice(&[
            EqBand::peaking(1000.0, 6.0, 1.0),
            EqBand::peaking(1000.0, -6.0, 1.0),
        ])
        .unwrap();
        eq.set_bands(&bands);

        let mut frames = tone(1000.0, 9600);
        eq.process(&mut frames);
        let gain = settled_peak(&frames) / 0.1;
        assert!((gain - 1.0).abs() < 0.02, "boost then cut should cancel, got {}", gain);
    }

    #[test]
    fn test_shelves() {
        let sr = SR as f32;
        let low = EqBand { kind: EqBandKind::LowShelf, frequency: 200.0, gain_db: -12.0, q: 0.7 };
        let high = EqBand { kind: EqBandKind::HighShelf, frequency: 5000.0, gain_db: 12.0, q: 0.7 };
        for band in [low, high] {
            let c = BiquadCoeffs::for_band(&band, sr);
            assert!(c.b0.is_finite() && c.a1.is_finite() && c.a2.is_finite());
        }

        let mut eq = EqChain::new(SR);
        eq.set_bands(&EqBands::from_slice(&[low]).unwrap());
        let mut bass = tone(50.0, 48000);
        eq.process(&mut bass);
        let gain = settled_peak(&bass) / 0.1;
        assert!(gain < 0.35, "low shelf cut left gain {}", gain);
    }
}
