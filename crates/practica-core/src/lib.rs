//! Practica Core - playback engine for the practica practice player
//!
//! Loop a passage, slow it down or transpose it, and play along with a
//! metronome locked to the detected beat.

pub mod analysis;
#[cfg(feature = "cpal-backend")]
pub mod audio;
pub mod config;
pub mod engine;
pub mod session;
pub mod state;
pub mod tap_tempo;
pub mod timestretch;
pub mod trainer;
pub mod types;

pub use analysis::{TempoAnalyzer, TempoEstimate};
pub use session::{Session, SessionError};
pub use state::{EventFilter, EventKind, ParamError, ParameterChannel, PlaybackState, StateEvent};
pub use types::*;
