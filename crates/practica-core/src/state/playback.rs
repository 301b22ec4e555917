//! Canonical user-facing playback parameters
//!
//! `PlaybackState` is a plain value type. The committed copy lives in
//! [`StateHub`](super::StateHub), the latest accepted copy inside
//! [`ParameterChannel`](super::ParameterChannel), and the render thread keeps
//! its own working copy that it mutates only at block boundaries.

use serde::{Deserialize, Serialize};

pub const MIN_SPEED_PERCENT: u32 = 20;
pub const MAX_SPEED_PERCENT: u32 = 200;
pub const DEFAULT_SPEED_PERCENT: u32 = 100;

pub const MIN_PITCH_SEMITONES: i32 = -12;
pub const MAX_PITCH_SEMITONES: i32 = 12;

pub const MIN_EQ_FREQ: f32 = 20.0;
pub const MAX_EQ_FREQ: f32 = 20000.0;
pub const MIN_EQ_GAIN_DB: f32 = -36.0;
pub const MAX_EQ_GAIN_DB: f32 = 36.0;
pub const MIN_EQ_Q: f32 = 0.1;
pub const MAX_EQ_Q: f32 = 2.0;

/// Maximum number of EQ bands (fixed so updates stay allocation-free)
pub const MAX_EQ_BANDS: usize = 8;

/// Shortest loop accepted unless the loop spans the whole track
pub const MIN_LOOP_MS: f64 = 50.0;

/// Accepted range for a known tempo (0 means undetected)
pub const MIN_TEMPO_BPM: f64 = 20.0;
pub const MAX_TEMPO_BPM: f64 = 400.0;

/// Pitch factor for a semitone offset (`2^(p/12)`)
#[inline]
pub fn pitch_factor(semitones: i32) -> f64 {
    (semitones as f64 / 12.0).exp2()
}

/// How the stereo result is routed to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Stereo,
    /// Average of both channels on every output
    Mono,
    /// Left channel duplicated to both outputs
    LeftOnly,
    /// Right channel duplicated to both outputs
    RightOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportStatus {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            TransportStatus::Stopped => 0,
            TransportStatus::Playing => 1,
            TransportStatus::Paused => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportStatus::Playing,
            2 => TransportStatus::Paused,
            _ => TransportStatus::Stopped,
        }
    }
}

/// Filter shape of one EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqBandKind {
    #[default]
    Peaking,
    LowShelf,
    HighShelf,
}

/// One parametric EQ band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    #[serde(default)]
    pub kind: EqBandKind,
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
}

impl EqBand {
    pub fn peaking(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self {
            kind: EqBandKind::Peaking,
            frequency,
            gain_db,
            q,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.frequency.is_finite() && self.gain_db.is_finite() && self.q.is_finite()
    }

    /// Clamp every field into its allowed range
    pub fn clamped(self) -> Self {
        Self {
            kind: self.kind,
            frequency: self.frequency.clamp(MIN_EQ_FREQ, MAX_EQ_FREQ),
            gain_db: self.gain_db.clamp(MIN_EQ_GAIN_DB, MAX_EQ_GAIN_DB),
            q: self.q.clamp(MIN_EQ_Q, MAX_EQ_Q),
        }
    }
}

impl Default for EqBand {
    fn default() -> Self {
        Self::peaking(1000.0, 0.0, 1.0)
    }
}

/// Ordered EQ band list with inline storage
///
/// `Copy` and fixed-size so a whole band list can travel through the
/// realtime command queue without touching the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EqBands {
    bands: [EqBand; MAX_EQ_BANDS],
    len: usize,
}

impl EqBands {
    /// Flat response (no bands)
    pub fn flat() -> Self {
        Self::default()
    }

    /// Copy bands in order; `None` when there are more than [`MAX_EQ_BANDS`]
    pub fn from_slice(bands: &[EqBand]) -> Option<Self> {
        if bands.len() > MAX_EQ_BANDS {
            return None;
        }
        let mut out = Self::default();
        out.bands[..bands.len()].copy_from_slice(bands);
        out.len = bands.len();
        Some(out)
    }

    #[inline]
    pub fn as_slice(&self) -> &[EqBand] {
        &self.bands[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A/B loop boundaries in milliseconds
///
/// Time is canonical; ratios are derived on demand from the track duration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopRange {
    pub a_ms: f64,
    pub b_ms: f64,
}

impl LoopRange {
    pub fn new(a_ms: f64, b_ms: f64) -> Self {
        Self { a_ms, b_ms }
    }

    /// Loop spanning the whole track
    pub fn full(duration_ms: f64) -> Self {
        Self::new(0.0, duration_ms)
    }

    pub fn length_ms(&self) -> f64 {
        self.b_ms - self.a_ms
    }

    /// Loop points as fractions of the track duration
    pub fn ratios(&self, duration_ms: f64) -> (f64, f64) {
        if duration_ms <= 0.0 {
            return (0.0, 0.0);
        }
        (self.a_ms / duration_ms, self.b_ms / duration_ms)
    }
}

/// Single source of truth for the user-facing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Linear gain in [0, 1]
    pub volume: f32,
    pub pitch_semitones: i32,
    /// Playback tempo in percent of the original
    pub speed_percent: u32,
    pub loop_range: LoopRange,
    /// Duration of the loaded track (0 when nothing is loaded)
    pub duration_ms: f64,
    /// Detected or entered tempo; 0 means undetected
    pub bpm: f64,
    /// Offset of the first beat from track start
    pub beat_phase_ms: f64,
    pub output_mode: OutputMode,
    pub metronome_enabled: bool,
    pub eq_bands: EqBands,
    pub transport: TransportStatus,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch_semitones: 0,
            speed_percent: DEFAULT_SPEED_PERCENT,
            loop_range: LoopRange::default(),
            duration_ms: 0.0,
            bpm: 0.0,
            beat_phase_ms: 0.0,
            output_mode: OutputMode::Stereo,
            metronome_enabled: false,
            eq_bands: EqBands::flat(),
            transport: TransportStatus::Stopped,
        }
    }
}

impl PlaybackState {
    pub fn has_buffer(&self) -> bool {
        self.duration_ms > 0.0
    }

    pub fn loop_a_ratio(&self) -> f64 {
        self.loop_range.ratios(self.duration_ms).0
    }

    pub fn loop_b_ratio(&self) -> f64 {
        self.loop_range.ratios(self.duration_ms).1
    }

    #[inline]
    pub fn pitch_factor(&self) -> f64 {
        pitch_factor(self.pitch_semitones)
    }

    #[inline]
    pub fn speed_factor(&self) -> f64 {
        self.speed_percent as f64 / 100.0
    }

    /// Beat period when a tempo is known
    pub fn beat_period_ms(&self) -> Option<f64> {
        (self.bpm > 0.0).then(|| 60000.0 / self.bpm)
    }

    /// True when speed and pitch leave the signal untouched
    pub fn is_identity_transform(&self) -> bool {
        self.speed_percent == DEFAULT_SPEED_PERCENT && self.pitch_semitones == 0
    }
}
