//! Control-to-action mapping engine
//!
//! Maps MIDI events to player actions based on the mapping table.

use std::collections::HashMap;

use crate::config::{ControlBehavior, ControlMapping, EncoderMode, MidiConfig, MidiControlConfig};
use crate::input::MidiInputEvent;
use crate::normalize::{encoder_to_delta, normalize_cc_value, range_for_action};

/// Speed change per press when a mapping gives no `step`
pub const DEFAULT_SPEED_STEP: i32 = 5;

/// Pitch change per press when a mapping gives no `step`
pub const DEFAULT_PITCH_STEP: i32 = 1;

/// Deadzone (in MIDI steps) around the center of a pitch fader
const PITCH_CENTER_DEADZONE: u8 = 2;

/// Player action produced by a mapped control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiAction {
    PlayPause,
    Stop,
    /// Jump to loop start
    ToHead,
    /// Relative speed change in percent points
    SpeedStep(i32),
    SetSpeed(u32),
    /// Relative pitch change in semitones
    PitchStep(i32),
    SetPitch(i32),
    SetVolume(f32),
    /// Loop start at the current position
    SetLoopA,
    /// Loop end at the current position
    SetLoopB,
    ResetLoop,
    ToggleMetronome,
    TapTempo,
    ToggleTrainer,
}

/// Every action name accepted in `midi.yaml`
pub const ACTIONS: &[&str] = &[
    "transport.play_pause",
    "transport.stop",
    "transport.to_head",
    "speed.up",
    "speed.down",
    "speed.set",
    "pitch.up",
    "pitch.down",
    "pitch.set",
    "volume.set",
    "loop.set_a",
    "loop.set_b",
    "loop.reset",
    "metronome.toggle",
    "tempo.tap",
    "trainer.toggle",
];

/// Mapping engine - converts MIDI events to player actions
pub struct MappingEngine {
    /// Control-to-mapping lookup (key is (channel, note/cc))
    note_mappings: HashMap<(u8, u8), ControlMapping>,
    cc_mappings: HashMap<(u8, u8), ControlMapping>,
}

impl MappingEngine {
    pub fn new(config: &MidiConfig) -> Self {
        let mut note_mappings = HashMap::new();
        let mut cc_mappings = HashMap::new();

        for mapping in &config.mappings {
            if !ACTIONS.contains(&mapping.action.as_str()) {
                log::warn!("MIDI: Ignoring mapping with unknown action '{}'", mapping.action);
                continue;
            }
            let previous = match &mapping.control {
                MidiControlConfig::Note { channel, note } => note_mappings.insert((*channel, *note), mapping.clone()),
                MidiControlConfig::ControlChange { channel, cc } => {
                    cc_mappings.insert((*channel, *cc), mapping.clone())
                }
            };
            if let Some(previous) = previous {
                log::warn!(
                    "MIDI: {:?} mapped twice, '{}' replaces '{}'",
                    mapping.control,
                    mapping.action,
                    previous.action
                );
            }
        }

        Self {
            note_mappings,
            cc_mappings,
        }
    }

    pub fn mapping_count(&self) -> usize {
        self.note_mappings.len() + self.cc_mappings.len()
    }

    /// Map a MIDI event to an action
    pub fn map_event(&self, event: &MidiInputEvent) -> Option<MidiAction> {
        let mapping = self.find_mapping(event)?;
        action_for(mapping, event)
    }

    fn find_mapping(&self, event: &MidiInputEvent) -> Option<&ControlMapping> {
        match event {
            MidiInputEvent::NoteOn { channel, note, .. } | MidiInputEvent::NoteOff { channel, note, .. } => {
                self.note_mappings.get(&(*channel, *note))
            }
            MidiInputEvent::ControlChange { channel, cc, .. } => self.cc_mappings.get(&(*channel, *cc)),
        }
    }
}

/// Whether a discrete action fires for this event
fn triggers(mapping: &ControlMapping, event: &MidiInputEvent) -> bool {
    match mapping.behavior {
        ControlBehavior::Momentary => event.is_press(),
        // Latching switches send a press on one stomp and a release on the next
        ControlBehavior::Toggle => true,
        ControlBehavior::Continuous => event.is_press(),
    }
}

/// Step count for a relative action: signed encoder delta or one press
fn steps(mapping: &ControlMapping, event: &MidiInputEvent) -> Option<i32> {
    match (event, mapping.encoder_mode) {
        (MidiInputEvent::ControlChange { value, .. }, Some(mode)) if mode != EncoderMode::Absolute => {
            Some(encoder_to_delta(*value, mode)).filter(|&d| d != 0)
        }
        _ if triggers(mapping, event) => Some(1),
        _ => None,
    }
}

/// Absolute value for a `*.set` action: CC position or configured `value`
fn absolute_value(mapping: &ControlMapping, event: &MidiInputEvent, deadzone: Option<u8>) -> Option<f64> {
    match event {
        MidiInputEvent::ControlChange { value, .. } if mapping.params.get("value").is_none() => {
            Some(normalize_cc_value(*value, range_for_action(&mapping.action), deadzone) as f64)
        }
        _ if triggers(mapping, event) => mapping.param_f64("value"),
        _ => None,
    }
}

fn action_for(mapping: &ControlMapping, event: &MidiInputEvent) -> Option<MidiAction> {
    let step = |default: i32| mapping.param_i64("step").map_or(default, |s| s as i32);

    match mapping.action.as_str() {
        "speed.up" => steps(mapping, event).map(|n| MidiAction::SpeedStep(n * step(DEFAULT_SPEED_STEP))),
        "speed.down" => steps(mapping, event).map(|n| MidiAction::SpeedStep(-n * step(DEFAULT_SPEED_STEP))),
        "pitch.up" => steps(mapping, event).map(|n| MidiAction::PitchStep(n * step(DEFAULT_PITCH_STEP))),
        "pitch.down" => steps(mapping, event).map(|n| MidiAction::PitchStep(-n * step(DEFAULT_PITCH_STEP))),

        "speed.set" => absolute_value(mapping, event, None).map(|v| MidiAction::SetSpeed(v.round().max(0.0) as u32)),
        "pitch.set" => absolute_value(mapping, event, Some(PITCH_CENTER_DEADZONE))
            .map(|v| MidiAction::SetPitch(v.round() as i32)),
        "volume.set" => absolute_value(mapping, event, None).map(|v| MidiAction::SetVolume(v as f32)),

        action if triggers(mapping, event) => match action {
            "transport.play_pause" => Some(MidiAction::PlayPause),
            "transport.stop" => Some(MidiAction::Stop),
            "transport.to_head" => Some(MidiAction::ToHead),
            "loop.set_a" => Some(MidiAction::SetLoopA),
            "loop.set_b" => Some(MidiAction::SetLoopB),
            "loop.reset" => Some(MidiAction::ResetLoop),
            "metronome.toggle" => Some(MidiAction::ToggleMetronome),
            "tempo.tap" => Some(MidiAction::TapTempo),
            "trainer.toggle" => Some(MidiAction::ToggleTrainer),
            _ => {
                log::debug!("MIDI: Unknown action '{}'", action);
                None
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(mappings: Vec<ControlMapping>) -> MappingEngine {
        MappingEngine::new(&MidiConfig { mappings })
    }

    fn note_on(note: u8) -> MidiInputEvent {
        MidiInputEvent::NoteOn {
            channel: 0,
            note,
            velocity: 100,
        }
    }

    fn note_off(note: u8) -> MidiInputEvent {
        MidiInputEvent::NoteOff {
            channel: 0,
            note,
            velocity: 0,
        }
    }

    fn cc(cc: u8, value: u8) -> MidiInputEvent {
        MidiInputEvent::ControlChange { channel: 0, cc, value }
    }

    #[test]
    fn test_buttons_fire_on_press_only() {
        let engine = engine(vec![
            ControlMapping::new(MidiControlConfig::note(0, 60), "transport.play_pause"),
            ControlMapping::new(MidiControlConfig::note(0, 61), "loop.set_a"),
        ]);
        assert_eq!(engine.map_event(&note_on(60)), Some(MidiAction::PlayPause));
        assert_eq!(engine.map_event(&note_off(60)), None);
        assert_eq!(engine.map_event(&note_on(61)), Some(MidiAction::SetLoopA));
        assert_eq!(engine.map_event(&note_on(62)), None);
    }

    #[test]
    fn test_toggle_behavior_fires_on_release_too() {
        let engine = engine(vec![ControlMapping::new(MidiControlConfig::note(0, 60), "metronome.toggle")
            .with_behavior(ControlBehavior::Toggle)]);
        assert_eq!(engine.map_event(&note_on(60)), Some(MidiAction::ToggleMetronome));
        assert_eq!(engine.map_event(&note_off(60)), Some(MidiAction::ToggleMetronome));
    }

    #[test]
    fn test_speed_steps() {
        let engine = engine(vec![
            ControlMapping::new(MidiControlConfig::note(0, 1), "speed.up"),
            ControlMapping::new(MidiControlConfig::note(0, 2), "speed.down").with_param("step", 10),
            ControlMapping::new(MidiControlConfig::cc(0, 3), "speed.up").with_encoder(EncoderMode::Relative),
        ]);
        assert_eq!(engine.map_event(&note_on(1)), Some(MidiAction::SpeedStep(5)));
        assert_eq!(engine.map_event(&note_on(2)), Some(MidiAction::SpeedStep(-10)));
        assert_eq!(engine.map_event(&cc(3, 2)), Some(MidiAction::SpeedStep(10)));
        assert_eq!(engine.map_event(&cc(3, 65)), Some(MidiAction::SpeedStep(-5)));
        assert_eq!(engine.map_event(&cc(3, 64)), None);
    }

    #[test]
    fn test_absolute_controls() {
        let engine = engine(vec![
            ControlMapping::new(MidiControlConfig::cc(0, 7), "volume.set").with_behavior(ControlBehavior::Continuous),
            ControlMapping::new(MidiControlConfig::cc(0, 8), "speed.set").with_behavior(ControlBehavior::Continuous),
            ControlMapping::new(MidiControlConfig::cc(0, 9), "pitch.set").with_behavior(ControlBehavior::Continuous),
            ControlMapping::new(MidiControlConfig::note(0, 10), "speed.set").with_param("value", 75),
        ]);
        assert_eq!(engine.map_event(&cc(7, 127)), Some(MidiAction::SetVolume(1.0)));
        assert_eq!(engine.map_event(&cc(7, 0)), Some(MidiAction::SetVolume(0.0)));
        assert_eq!(engine.map_event(&cc(8, 0)), Some(MidiAction::SetSpeed(20)));
        assert_eq!(engine.map_event(&cc(8, 127)), Some(MidiAction::SetSpeed(200)));
        assert_eq!(engine.map_event(&cc(9, 65)), Some(MidiAction::SetPitch(0)));
        assert_eq!(engine.map_event(&cc(9, 0)), Some(MidiAction::SetPitch(-12)));
        assert_eq!(engine.map_event(&note_on(10)), Some(MidiAction::SetSpeed(75)));
        assert_eq!(engine.map_event(&note_off(10)), None);
    }

    #[test]
    fn test_unknown_actions_are_dropped() {
        let engine = engine(vec![
            ControlMapping::new(MidiControlConfig::note(0, 1), "deck.sync"),
            ControlMapping::new(MidiControlConfig::note(0, 2), "tempo.tap"),
        ]);
        assert_eq!(engine.mapping_count(), 1);
        assert_eq!(engine.map_event(&note_on(1)), None);
        assert_eq!(engine.map_event(&note_on(2)), Some(MidiAction::TapTempo));
    }
}
