//! Manual tempo entry by tapping
//!
//! The tempo is the mean interval over the most recent taps. A gap longer
//! than the configured timeout starts a new sequence.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::TapTempoConfig;

pub struct TapTempo {
    config: TapTempoConfig,
    taps: VecDeque<Instant>,
}

impl TapTempo {
    pub fn new(config: TapTempoConfig) -> Self {
        Self {
            taps: VecDeque::with_capacity(config.max_taps.max(2)),
            config,
        }
    }

    /// Register a tap at `now`
    ///
    /// Returns the tempo once at least two taps belong to the sequence.
    pub fn tap(&mut self, now: Instant) -> Option<f64> {
        if let Some(&last) = self.taps.back() {
            let gap = now.saturating_duration_since(last);
            if gap.as_millis() > self.config.timeout_ms as u128 || now < last {
                self.taps.clear();
            }
        }

        self.taps.push_back(now);
        while self.taps.len() > self.config.max_taps.max(2) {
            self.taps.pop_front();
        }
        self.bpm()
    }

    /// Tempo of the current sequence
    pub fn bpm(&self) -> Option<f64> {
        let (first, last) = (self.taps.front()?, self.taps.back()?);
        let intervals = self.taps.len().checked_sub(1).filter(|&n| n > 0)?;
        let span_ms = last.duration_since(*first).as_secs_f64() * 1000.0;
        if span_ms <= 0.0 {
            return None;
        }
        Some(60000.0 * intervals as f64 / span_ms)
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    pub fn reset(&mut self) {
        self.taps.clear();
    }
}
