//! Sample-accurate metronome clicks
//!
//! Beat times live on the source timeline (`beat_phase + k * period`). Each
//! block the engine hands over the source span it read plus a mapping from
//! source position to output frame; every beat inside the span starts a
//! click voice at a fractional output frame. Clicks are evaluated
//! analytically at `i - start`, so a click starting between two frames is
//! rendered with sub-sample accuracy instead of being rounded to the grid.
//!
//! Voices persist across blocks: a click that begins near the end of a block
//! (or later, when the stretcher delays the audio) keeps sounding in the
//! following ones.

use crate::config::MetronomeConfig;
use crate::types::StereoSample;

/// Concurrent clicks (pending plus sounding)
const MAX_VOICES: usize = 64;

/// Envelope decays to about -60 dB over the click length
const DECAY_TIME_CONSTANTS: f32 = 6.9;

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    active: bool,
    /// Output frame of the click onset, relative to the next block start
    start: f64,
}

pub struct Metronome {
    voices: [Voice; MAX_VOICES],
    /// Angular frequency per output frame
    omega: f32,
    length: f64,
    decay: f32,
    gain: f32,
}

impl Metronome {
    pub fn new(config: &MetronomeConfig, sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let length = (config.click_length_ms * sr / 1000.0).max(1.0);
        Self {
            voices: [Voice::default(); MAX_VOICES],
            omega: 2.0 * std::f32::consts::PI * config.click_frequency_hz / sr,
            length: length as f64,
            decay: DECAY_TIME_CONSTANTS / length,
            gain: config.gain,
        }
    }

    /// Click amplitude `t` frames after onset
    #[inline]
    fn click_at(&self, t: f32) -> f32 {
        self.gain * (-t * self.decay).exp() * (self.omega * t).cos()
    }

    /// Start a click at fractional output frame `frame` of the next block
    ///
    /// With every voice busy the one that started earliest is replaced.
    pub fn trigger(&mut self, frame: f64) {
        let slot = match self.voices.iter().position(|v| !v.active) {
            Some(free) => free,
            None => self
                .voices
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.start.total_cmp(&b.start))
                .map_or(0, |(i, _)| i),
        };
        self.voices[slot] = Voice { active: true, start: frame };
    }

    /// Trigger every beat whose source position lies in `[src_min, src_max)`
    ///
    /// Positions are in source frames; `to_output` maps a source position to
    /// a fractional output frame of the block being rendered.
    pub fn schedule<F>(&mut self, src_min: f64, src_max: f64, phase: f64, period: f64, to_output: F)
    where
        F: Fn(f64) -> f64,
    {
        if !(period > 0.0) || !(src_max > src_min) {
            return;
        }
        let mut k = ((src_min - phase) / period).ceil();
        loop {
            let beat = phase + k * period;
            if beat >= src_max {
                break;
            }
            if beat >= src_min {
                self.trigger(to_output(beat));
            }
            k += 1.0;
        }
    }

    /// Mix active clicks into `out` (both channels) and advance one block
    pub fn render(&mut self, out: &mut [StereoSample]) {
        let n = out.len();
        for v in 0..MAX_VOICES {
            let voice = self.voices[v];
            if !voice.active {
                continue;
            }
            let first = voice.start.ceil().max(0.0) as usize;
            let last = ((voice.start + self.length).ceil().max(0.0) as usize).min(n);
            for (i, frame) in out.iter_mut().enumerate().take(last).skip(first) {
                let click = self.click_at((i as f64 - voice.start) as f32);
                *frame += StereoSample::mono(click);
            }

            let start = voice.start - n as f64;
            self.voices[v] = Voice {
                active: start + self.length > 0.0,
                start,
            };
        }
    }

    /// Forget clicks that have not started sounding yet
    pub fn cancel_pending(&mut self) {
        for voice in &mut self.voices {
            if voice.start >= 0.0 {
                voice.active = false;
            }
        }
    }

    /// Silence everything
    pub fn reset(&mut self) {
        self.voices = [Voice::default(); MAX_VOICES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48000;

    fn metronome() -> Metronome {
        Metronome::new(&MetronomeConfig::default(), SR)
    }

    #[test]
    fn test_click_starts_on_integer_frame() {
        let mut m = metronome();
        m.trigger(10.0);
        let mut out = vec![StereoSample::silence(); 64];
        m.render(&mut out);

        assert_eq!(out[9], StereoSample::silence());
        assert!((out[10].left - 0.5).abs() < 1e-6);
        assert!(out[11].left.abs() < 0.5);
    }

    #[test]
    fn test_click_continues_into_next_block() {
        let mut whole = metronome();
        whole.trigger(100.0);
        let mut reference = vec![StereoSample::silence(); 2048];
        whole.render(&mut reference);

        let mut split = metronome();
        split.trigger(100.0);
        let mut pieces = Vec::new();
        for _ in 0..16 {
            let mut block = vec![StereoSample::silence(); 128];
            split.render(&mut block);
            pieces.extend(block);
        }

        for (a, b) in reference.iter().zip(&pieces) {
            assert!((a.left - b.left).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fractional_onset_lands_between_frames() {
        let mut m = metronome();
        m.trigger(20.25);
        let mut out = vec![StereoSample::silence(); 64];
        m.render(&mut out);

        assert_eq!(out[20], StereoSample::silence());
        // First sounding frame is 0.75 frames into the click
        assert!((out[21].left - m.click_at(0.75)).abs() < 1e-6);
    }

    #[test]
    fn test_schedule_picks_beats_in_half_open_span() {
        let mut m = metronome();
        // Beats at 0, 100, 200, ... ; span [100, 300) holds 100 and 200
        m.schedule(100.0, 300.0, 0.0, 100.0, |src| src - 100.0);
        let active: Vec<f64> = m.voices.iter().filter(|v| v.active).map(|v| v.start).collect();
        assert_eq!(active, vec![0.0, 100.0]);
    }

    #[test]
    fn test_full_voice_pool_replaces_oldest_click() {
        let mut m = metronome();
        for i in 0..MAX_VOICES {
            m.trigger(i as f64);
        }
        m.trigger(5000.0);

        assert_eq!(m.voices.iter().filter(|v| v.active).count(), MAX_VOICES);
        assert!(m.voices.iter().all(|v| v.start != 0.0));
        assert!(m.voices.iter().any(|v| v.start == 5000.0));
    }

    #[test]
    fn test_cancel_pending_keeps_sounding_clicks() {
        let mut m = metronome();
        m.trigger(0.0);
        m.trigger(500.0);
        let mut out = vec![StereoSample::silence(); 100];
        m.render(&mut out);

        m.cancel_pending();
        assert_eq!(m.voices.iter().filter(|v| v.active).count(), 1);
    }
}
