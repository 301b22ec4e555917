//! Device output through CPAL (feature `cpal-backend`)
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ UI / MIDI thread │──ParameterChannel──►│   Command Queue     │
//! │    (Session)     │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ Relaxed atomics + event queue             ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  EngineAtomics   │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │     block writes    │ (owns RenderEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```

mod cpal_backend;
mod error;

pub use cpal_backend::{list_output_devices, start_output, AudioHandle, OutputSettings};
pub use error::{AudioError, AudioResult};
