//! Real-time render path
//!
//! - [`RenderEngine`]: per-block pipeline driven by the audio callback
//! - [`LoopReader`]: loop-aware fractional cursor with wrap crossfade
//! - [`EqChain`], [`Metronome`]: DSP stages
//! - Command/event queues and [`EngineAtomics`] connecting it to control threads
//! - [`gc_handle`]: deferred deallocation of replaced track buffers

mod atomics;
mod command;
mod engine;
mod eq;
mod gc;
mod metronome;
mod reader;
mod routing;

pub use atomics::EngineAtomics;
pub use command::*;
pub use engine::{RenderEngine, MAX_BLOCK};
pub use eq::{BiquadCoeffs, EqChain};
pub use gc::gc_handle;
pub use metronome::Metronome;
pub use reader::{read_interpolated, InterpolationMethod, LoopReader, ReadSegment, MAX_SEGMENTS};
pub use routing::write_interleaved;
