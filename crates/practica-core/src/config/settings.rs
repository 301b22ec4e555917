//! Practica settings file
//!
//! Stored as YAML, default location `~/.config/practica/config.yaml`.
//! Every section is `#[serde(default)]`, so a file only needs to name the
//! values it changes.

use serde::{Deserialize, Serialize};

use crate::engine::InterpolationMethod;
use crate::timestretch::StretchBackend;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticaConfig {
    pub engine: EngineConfig,
    pub metronome: MetronomeConfig,
    pub analysis: AnalysisConfig,
    pub trainer: SpeedTrainerConfig,
    pub tap_tempo: TapTempoConfig,
}

/// Render engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Equal-power crossfade across the loop wrap
    /// Default: 5 ms
    pub loop_crossfade_ms: f64,
    /// Fade applied on track load, seek, pause and speed/pitch path switches
    /// Default: 3 ms
    pub declick_ms: f64,
    /// Interpolation for fractional read positions
    pub interpolation: InterpolationMethod,
    /// Time-stretch implementation (`wsola` or `signalsmith`)
    pub stretch_backend: StretchBackend,
    /// WSOLA grain length
    /// Default: 20 ms
    pub wsola_window_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_crossfade_ms: 5.0,
            declick_ms: 3.0,
            interpolation: InterpolationMethod::Cubic,
            stretch_backend: StretchBackend::Wsola,
            wsola_window_ms: 20.0,
        }
    }
}

/// Metronome click sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub click_frequency_hz: f32,
    pub click_length_ms: f32,
    /// Peak amplitude of the click (linear)
    pub gain: f32,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            click_frequency_hz: 1500.0,
            click_length_ms: 25.0,
            gain: 0.5,
        }
    }
}

/// Tempo detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Slowest tempo considered
    pub min_bpm: f64,
    /// Fastest tempo considered
    pub max_bpm: f64,
    /// Normalized autocorrelation strength a period needs to count as a tempo
    pub confidence_threshold: f64,
    /// Only the beginning of long tracks is analysed
    pub max_analysis_secs: f64,
    /// Spectral flux frame length (samples)
    pub frame_size: usize,
    /// Spectral flux hop (samples)
    pub hop_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_bpm: 40.0,
            max_bpm: 240.0,
            confidence_threshold: 0.2,
            max_analysis_secs: 120.0,
            frame_size: 1024,
            hop_size: 256,
        }
    }
}

/// Speed trainer ramp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedTrainerConfig {
    /// Start with the trainer armed
    pub enabled: bool,
    /// Completed loop passes between two speed steps
    pub step_every_n_loops: u32,
    /// Speed increase per step (percent points)
    pub step_percent: u32,
    /// The ramp stops here
    pub max_speed: u32,
}

impl Default for SpeedTrainerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            step_every_n_loops: 4,
            step_percent: 5,
            max_speed: 150,
        }
    }
}

/// Tap tempo behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapTempoConfig {
    /// A longer pause starts a new tap sequence
    pub timeout_ms: u64,
    /// Number of recent taps averaged
    pub max_taps: usize,
}

impl Default for TapTempoConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            max_taps: 8,
        }
    }
}
