//! Value normalization for MIDI controls
//!
//! MIDI CC values are 0-127, but playback parameters have their own ranges:
//! - Volume: 0.0 to 1.0
//! - Speed: 20 to 200 percent
//! - Pitch: -12 to +12 semitones, 0 at the center
//!
//! This module handles the conversion based on the mapped action.

use practica_core::state::{MAX_PITCH_SEMITONES, MAX_SPEED_PERCENT, MIN_PITCH_SEMITONES, MIN_SPEED_PERCENT};

use crate::config::EncoderMode;

/// Predefined control value ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRange {
    /// 0.0 to 1.0 (volume)
    Unit,
    /// -1.0 to 1.0
    Bipolar,
    Custom { min: f32, max: f32 },
}

impl ControlRange {
    pub fn min(&self) -> f32 {
        match self {
            Self::Unit => 0.0,
            Self::Bipolar => -1.0,
            Self::Custom { min, .. } => *min,
        }
    }

    pub fn max(&self) -> f32 {
        match self {
            Self::Unit | Self::Bipolar => 1.0,
            Self::Custom { max, .. } => *max,
        }
    }

    pub fn center(&self) -> f32 {
        (self.min() + self.max()) / 2.0
    }
}

/// Normalize a MIDI CC value (0-127) to the target range
///
/// With `center_deadzone`, values within that many steps of 64 snap to the
/// exact center of the range and the two halves are stretched to keep the
/// ends reachable.
pub fn normalize_cc_value(midi_value: u8, range: ControlRange, center_deadzone: Option<u8>) -> f32 {
    let midi = midi_value.min(127) as f32;
    let midi_max = 127.0;
    let midi_center = 64.0;

    let normalized = match center_deadzone {
        Some(deadzone) => {
            let dz = deadzone as f32;
            let low = midi_center - dz;
            let high = midi_center + dz;
            if midi >= low && midi <= high {
                0.5
            } else if midi < low {
                0.5 * midi / low
            } else {
                0.5 + 0.5 * (midi - high) / (midi_max - high)
            }
        }
        None => midi / midi_max,
    };

    range.min() + normalized * (range.max() - range.min())
}

/// Convert an encoder value to a step count
///
/// - Relative: 1-63 = clockwise amount, 65-127 = counter-clockwise amount
/// - RelativeSigned: <64 = counter-clockwise, >64 = clockwise
pub fn encoder_to_delta(midi_value: u8, mode: EncoderMode) -> i32 {
    match mode {
        EncoderMode::Absolute => midi_value as i32 - 64,
        EncoderMode::Relative => match midi_value {
            1..=63 => midi_value as i32,
            65..=127 => -((midi_value as i32) - 64),
            _ => 0,
        },
        EncoderMode::RelativeSigned => (midi_value as i32) - 64,
    }
}

/// Value range of an action driven by an absolute control
pub fn range_for_action(action: &str) -> ControlRange {
    match action {
        "speed.set" => ControlRange::Custom {
            min: MIN_SPEED_PERCENT as f32,
            max: MAX_SPEED_PERCENT as f32,
        },
        "pitch.set" => ControlRange::Custom {
            min: MIN_PITCH_SEMITONES as f32,
            max: MAX_PITCH_SEMITONES as f32,
        },
        _ => ControlRange::Unit,
    }
}
