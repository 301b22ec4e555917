//! MIDI control for the practica practice player
//!
//! This crate provides:
//! - MIDI message parsing via midly
//! - A YAML control-to-action mapping table
//! - Dispatch of mapped actions into the session's parameter channel
//!
//! # Architecture
//!
//! ```text
//! MIDI driver callback → MidiControlManager::handle_bytes → MappingEngine
//!                      → MidiAction → ParameterChannel request
//! ```
//!
//! The manager never writes playback state itself: every action becomes a
//! validated request, exactly as if the UI had issued it.

mod config;
mod input;
mod mapping;
mod normalize;

pub use config::{
    default_midi_config_path, load_midi_config, save_midi_config, ControlBehavior, ControlMapping, EncoderMode,
    MidiConfig, MidiControlConfig,
};
pub use input::MidiInputEvent;
pub use mapping::{MappingEngine, MidiAction, ACTIONS, DEFAULT_PITCH_STEP, DEFAULT_SPEED_STEP};
pub use normalize::{encoder_to_delta, normalize_cc_value, range_for_action, ControlRange};

use std::path::Path;
use std::sync::Arc;

use practica_core::{ParamError, Session};

/// Error type for MIDI control operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI config error: {0}")]
    ConfigError(#[from] anyhow::Error),

    #[error("MIDI action {action:?} rejected: {source}")]
    Rejected {
        action: MidiAction,
        #[source]
        source: ParamError,
    },
}

/// Routes incoming MIDI messages to a playback session
pub struct MidiControlManager {
    config: MidiConfig,
    mapping: MappingEngine,
    session: Arc<Session>,
}

impl MidiControlManager {
    pub fn new(config: MidiConfig, session: Arc<Session>) -> Self {
        let mapping = MappingEngine::new(&config);
        log::info!("MIDI: {} control mapping(s) active", mapping.mapping_count());
        Self {
            config,
            mapping,
            session,
        }
    }

    /// Create from a mapping file (default: `~/.config/practica/midi.yaml`)
    ///
    /// A missing or invalid file yields a manager with no mappings.
    pub fn from_config_file(path: Option<&Path>, session: Arc<Session>) -> Self {
        let path = path.map(|p| p.to_path_buf()).unwrap_or_else(default_midi_config_path);
        Self::new(load_midi_config(&path), session)
    }

    pub fn config(&self) -> &MidiConfig {
        &self.config
    }

    /// Replace the mapping table
    pub fn set_config(&mut self, config: MidiConfig) {
        self.mapping = MappingEngine::new(&config);
        self.config = config;
    }

    pub fn save_config(&self, path: &Path) -> Result<(), MidiError> {
        save_midi_config(&self.config, path)?;
        Ok(())
    }

    /// Handle one raw message from the driver callback
    ///
    /// Returns the action that was applied, `None` for unmapped or
    /// unsupported messages.
    pub fn handle_bytes(&self, data: &[u8]) -> Result<Option<MidiAction>, MidiError> {
        match MidiInputEvent::parse(data) {
            Some(event) => self.handle_event(&event),
            None => Ok(None),
        }
    }

    /// Handle a message delivered as `(message type, channel, data1, data2)`
    pub fn handle_message(
        &self,
        message_type: u8,
        channel: u8,
        data1: u8,
        data2: u8,
    ) -> Result<Option<MidiAction>, MidiError> {
        match MidiInputEvent::from_raw(message_type, channel, data1, data2) {
            Some(event) => self.handle_event(&event),
            None => Ok(None),
        }
    }

    pub fn handle_event(&self, event: &MidiInputEvent) -> Result<Option<MidiAction>, MidiError> {
        let Some(action) = self.mapping.map_event(event) else {
            return Ok(None);
        };
        log::debug!("MIDI: {:?} -> {:?}", event, action);
        self.execute(action)?;
        Ok(Some(action))
    }

    /// Apply one action through the session
    pub fn execute(&self, action: MidiAction) -> Result<(), MidiError> {
        let channel = self.session.channel();
        let result = match action {
            MidiAction::PlayPause => channel.toggle_play(),
            MidiAction::Stop => channel.stop(),
            MidiAction::ToHead => channel.to_head(),
            MidiAction::SpeedStep(delta) => channel.adjust_speed(delta),
            MidiAction::SetSpeed(percent) => channel.set_speed(percent),
            MidiAction::PitchStep(delta) => channel.adjust_pitch(delta),
            MidiAction::SetPitch(semitones) => channel.set_pitch(semitones),
            MidiAction::SetVolume(volume) => channel.set_volume(volume),
            MidiAction::SetLoopA => channel.set_loop_a_at(self.session.atomics().position_ms()),
            MidiAction::SetLoopB => channel.set_loop_b_at(self.session.atomics().position_ms()),
            MidiAction::ResetLoop => channel.reset_loop(),
            MidiAction::ToggleMetronome => channel.toggle_metronome(),
            MidiAction::TapTempo => {
                self.session.tap();
                Ok(())
            }
            MidiAction::ToggleTrainer => {
                let enabled = self.session.toggle_trainer();
                log::info!("MIDI: Speed trainer {}", if enabled { "on" } else { "off" });
                Ok(())
            }
        };

        result.map_err(|source| {
            log::warn!("MIDI: {:?} rejected: {}", action, source);
            MidiError::Rejected { action, source }
        })
    }
}
