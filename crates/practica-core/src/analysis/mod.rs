//! Tempo detection
//!
//! [`TempoAnalyzer`] estimates BPM, beat phase and a confidence score from a
//! decoded track. [`AnalysisWorker`] runs it off the control thread and drops
//! results for tracks that have since been replaced.

mod tempo;
mod worker;

pub use tempo::{TempoAnalyzer, TempoEstimate};
pub use worker::{AnalysisCallback, AnalysisWorker};
