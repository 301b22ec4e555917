//! Standard locations of the configuration files

use std::path::PathBuf;

/// Directory holding every practica configuration file
///
/// Returns: `~/.config/practica`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"))
        .join("practica")
}

/// Engine settings file
///
/// Returns: `~/.config/practica/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// MIDI mapping file
///
/// Returns: `~/.config/practica/midi.yaml`
pub fn default_midi_config_path() -> PathBuf {
    config_dir().join("midi.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_in_practica_dir() {
        assert!(default_config_path().ends_with("practica/config.yaml"));
        assert!(default_midi_config_path().ends_with("practica/midi.yaml"));
    }
}
