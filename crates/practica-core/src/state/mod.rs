//! Playback state and the request path into the render thread
//!
//! - [`PlaybackState`]: canonical user-facing parameters
//! - [`ParameterChannel`]: validated, clamped requests queued for the next block
//! - [`StateHub`]: committed state plus typed change notifications

mod channel;
mod events;
mod playback;

pub use channel::{ParamError, ParamResult, ParameterChannel};
pub(crate) use channel::{apply_update, validate};
pub use events::{EventFilter, EventKind, LoopPosition, StateEvent, StateHub};
pub use playback::*;
