//! MIDI mapping configuration (YAML)

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use practica_core::config::default_midi_config_path;

/// Root of `midi.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MidiConfig {
    pub mappings: Vec<ControlMapping>,
}

/// MIDI control identifier (Note or CC)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiControlConfig {
    /// Note On/Off message
    Note {
        /// MIDI channel (0-15)
        channel: u8,
        /// Note number (0-127)
        note: u8,
    },
    /// Control Change message
    ControlChange {
        /// MIDI channel (0-15)
        channel: u8,
        /// CC number (0-127)
        cc: u8,
    },
}

impl MidiControlConfig {
    pub fn note(channel: u8, note: u8) -> Self {
        Self::Note { channel, note }
    }

    pub fn cc(channel: u8, cc: u8) -> Self {
        Self::ControlChange { channel, cc }
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::Note { channel, .. } => *channel,
            Self::ControlChange { channel, .. } => *channel,
        }
    }
}

/// Single control-to-action mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMapping {
    pub control: MidiControlConfig,

    /// Action to trigger (e.g., "transport.play_pause", "speed.up")
    pub action: String,

    /// Control behavior (momentary, toggle, etc.)
    #[serde(default)]
    pub behavior: ControlBehavior,

    /// Additional parameters for the action (e.g., `step`, `value`)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, serde_yaml::Value>,

    /// Encoder mode for CC controls driving stepped actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder_mode: Option<EncoderMode>,
}

impl ControlMapping {
    pub fn new(control: MidiControlConfig, action: &str) -> Self {
        Self {
            control,
            action: action.to_string(),
            behavior: ControlBehavior::default(),
            params: HashMap::new(),
            encoder_mode: None,
        }
    }

    pub fn with_behavior(mut self, behavior: ControlBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_encoder(mut self, mode: EncoderMode) -> Self {
        self.encoder_mode = Some(mode);
        self
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| v.as_f64())
    }
}

/// Control behavior type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlBehavior {
    /// Press triggers the action, release is ignored
    #[default]
    Momentary,
    /// Press and release both trigger (latching footswitches)
    Toggle,
    /// Every value change triggers the action with that value
    Continuous,
}

/// Encoder interpretation mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncoderMode {
    /// Absolute value (0-127), 64 as center
    Absolute,
    /// Relative: 1-63 = clockwise, 65-127 = counter-clockwise
    Relative,
    /// Relative with 64 as center: <64 = CCW, >64 = CW
    RelativeSigned,
}

/// Load MIDI configuration from a YAML file
///
/// If the file doesn't exist, returns an empty config (no mappings).
/// If the file exists but is invalid, logs a warning and returns empty config.
pub fn load_midi_config(path: &Path) -> MidiConfig {
    log::info!("load_midi_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_midi_config: Config file doesn't exist, no MIDI mappings");
        return MidiConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<MidiConfig>(&contents) {
            Ok(config) => {
                log::info!("load_midi_config: Loaded {} mapping(s)", config.mappings.len());
                config
            }
            Err(e) => {
                log::warn!("load_midi_config: Failed to parse config: {}", e);
                MidiConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_midi_config: Failed to read config file: {}", e);
            MidiConfig::default()
        }
    }
}

/// Save MIDI configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_midi_config(config: &MidiConfig, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    log::info!("save_midi_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize MIDI config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write MIDI config file: {:?}", path))?;

    log::info!("save_midi_config: Config saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MidiConfig::default();
        assert!(config.mappings.is_empty());
    }

    #[test]
    fn test_yaml_parsing() {
        // Keys the player does not use are skipped
        let yaml = r#"
device: "FS-6"
mappings:
  - control:
      type: note
      channel: 0
      note: 60
    action: "transport.play_pause"
  - control:
      type: control_change
      channel: 0
      cc: 20
    action: "speed.up"
    params:
      step: 10
    encoder_mode: relative
  - control:
      type: control_change
      channel: 1
      cc: 7
    action: "volume.set"
    behavior: continuous
"#;

        let config: MidiConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mappings.len(), 3);
        assert_eq!(config.mappings[0].control, MidiControlConfig::note(0, 60));
        assert_eq!(config.mappings[0].behavior, ControlBehavior::Momentary);
        assert_eq!(config.mappings[1].param_i64("step"), Some(10));
        assert_eq!(config.mappings[1].encoder_mode, Some(EncoderMode::Relative));
        assert_eq!(config.mappings[2].control.channel(), 1);
        assert_eq!(config.mappings[2].behavior, ControlBehavior::Continuous);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("midi.yaml");
        let config = MidiConfig {
            mappings: vec![
                ControlMapping::new(MidiControlConfig::note(0, 36), "tempo.tap"),
                ControlMapping::new(MidiControlConfig::cc(0, 1), "speed.set").with_behavior(ControlBehavior::Continuous),
                ControlMapping::new(MidiControlConfig::note(0, 37), "speed.down").with_param("step", 2),
            ],
        };

        save_midi_config(&config, &path).unwrap();
        assert_eq!(load_midi_config(&path), config);
    }

    #[test]
    fn test_missing_or_invalid_file_gives_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_midi_config(&dir.path().join("absent.yaml")), MidiConfig::default());

        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "mappings: [ {control: 5").unwrap();
        assert_eq!(load_midi_config(&path), MidiConfig::default());
    }
}
