//! MIDI input events
//!
//! Raw bytes from the driver callback are parsed with midly; drivers that
//! already split messages can hand over `(message type, channel, data1,
//! data2)` directly.

use midly::live::LiveEvent;
use midly::MidiMessage;

use crate::config::MidiControlConfig;

/// Raw MIDI input event (before action mapping)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiInputEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl MidiInputEvent {
    /// Parse one complete MIDI message
    ///
    /// Note On with velocity 0 is reported as Note Off. Message types other
    /// than notes and control changes are ignored.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let LiveEvent::Midi { channel, message } = LiveEvent::parse(data).ok()? else {
            return None;
        };
        let channel = channel.as_int();
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Some(Self::NoteOff {
                channel,
                note: key.as_int(),
                velocity: 0,
            }),
            MidiMessage::NoteOn { key, vel } => Some(Self::NoteOn {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::NoteOff { key, vel } => Some(Self::NoteOff {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::Controller { controller, value } => Some(Self::ControlChange {
                channel,
                cc: controller.as_int(),
                value: value.as_int(),
            }),
            _ => None,
        }
    }

    /// Build from an already split message
    ///
    /// `message_type` may be the bare type nibble (`0x9`) or a status byte
    /// (`0x90`); its low nibble is ignored in the latter case.
    pub fn from_raw(message_type: u8, channel: u8, data1: u8, data2: u8) -> Option<Self> {
        let kind = if message_type >= 0x80 { message_type >> 4 } else { message_type };
        if !(0x8..=0xF).contains(&kind) {
            return None;
        }
        let status = (kind << 4) | (channel & 0x0F);
        Self::parse(&[status, data1 & 0x7F, data2 & 0x7F])
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. } => *channel,
            Self::NoteOff { channel, .. } => *channel,
            Self::ControlChange { channel, .. } => *channel,
        }
    }

    /// Check if this event matches a control config
    pub fn matches(&self, control: &MidiControlConfig) -> bool {
        match (self, control) {
            (
                Self::NoteOn { channel, note, .. } | Self::NoteOff { channel, note, .. },
                MidiControlConfig::Note { channel: cc, note: cn },
            ) => channel == cc && note == cn,
            (
                Self::ControlChange { channel, cc, .. },
                MidiControlConfig::ControlChange {
                    channel: ctrl_ch,
                    cc: ctrl_cc,
                },
            ) => channel == ctrl_ch && cc == ctrl_cc,
            _ => false,
        }
    }

    /// Note On or CC above center
    pub fn is_press(&self) -> bool {
        match self {
            Self::NoteOn { velocity, .. } => *velocity > 0,
            Self::ControlChange { value, .. } => *value > 63,
            Self::NoteOff { .. } => false,
        }
    }

    pub fn is_release(&self) -> bool {
        !self.is_press()
    }

    /// Velocity for notes, value for CC
    pub fn value(&self) -> u8 {
        match self {
            Self::NoteOn { velocity, .. } => *velocity,
            Self::NoteOff { velocity, .. } => *velocity,
            Self::ControlChange { value, .. } => *value,
        }
    }
}
