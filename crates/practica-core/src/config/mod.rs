//! Configuration shared by the engine and the control surfaces
//!
//! - Generic YAML config loading/saving
//! - Standard config paths
//! - [`PracticaConfig`] with one section per component
//!
//! ```ignore
//! use practica_core::config::{default_config_path, load_config, PracticaConfig};
//!
//! let config: PracticaConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path, default_midi_config_path};
pub use settings::{
    AnalysisConfig, EngineConfig, MetronomeConfig, PracticaConfig, SpeedTrainerConfig, TapTempoConfig,
};
