//! Lock-free queues between the control threads and the render thread
//!
//! Two single-producer single-consumer `rtrb` ringbuffers connect the
//! domains:
//!
//! - **Commands** (control → render): validated parameter updates, seeks and
//!   buffer swaps, pushed by [`ParameterChannel`](crate::state::ParameterChannel)
//!   and drained by the engine once at the start of every render call.
//! - **Events** (render → control): applied changes, loop completions and
//!   load acknowledgements, pushed by the engine and drained by the
//!   dispatcher that updates the committed state and notifies observers.
//!
//! Both queues are allocated once at startup. Push and pop are wait-free, so
//! neither side ever blocks the other.

use basedrop::Shared;

use crate::state::{EqBands, LoopRange, OutputMode, TransportStatus};
use crate::types::SampleBuffer;

/// Capacity of the control → render queue
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Capacity of the render → control queue
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// One validated change to a `PlaybackState` field
///
/// `Copy` and allocation-free so it can cross the realtime queue in both
/// directions (as a request, and back as an "applied" acknowledgement).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterUpdate {
    Volume(f32),
    Pitch(i32),
    Speed(u32),
    Loop(LoopRange),
    /// Tempo and beat phase always travel together so clicks never use a
    /// period from one request and a phase from another
    Tempo { bpm: f64, beat_phase_ms: f64 },
    OutputMode(OutputMode),
    Metronome(bool),
    Eq(EqBands),
    Transport(TransportStatus),
}

/// Commands sent from control threads to the render thread
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────
    /// Apply a validated parameter update
    Set(ParameterUpdate),

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    /// Move the read cursor (clamped into the loop)
    Seek { position_ms: f64 },

    // ─────────────────────────────────────────────────────────────
    // Buffer management
    // ─────────────────────────────────────────────────────────────
    /// Swap in a newly decoded track
    ///
    /// The previous buffer is released through the basedrop collector, never
    /// freed on the render thread.
    LoadBuffer {
        buffer: Shared<SampleBuffer>,
        generation: u64,
    },
    /// Drop the current track
    UnloadBuffer,
}

/// Emitted each time the read cursor wraps from loop B back to loop A
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopCompletionEvent {
    /// Monotonic count of completed passes since the engine started
    pub count: u64,
    /// Source frames past B carried into the next pass
    pub overshoot_frames: f64,
    /// Loop boundaries in effect when the pass completed
    pub loop_range: LoopRange,
}

/// Notifications sent from the render thread back to control threads
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A parameter took effect with a value different from the previous one
    Applied(ParameterUpdate),
    LoopCompleted(LoopCompletionEvent),
    /// A `LoadBuffer` command was applied
    BufferLoaded { generation: u64, duration_ms: f64 },
    BufferUnloaded,
}

/// Create the control → render command queue
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Create the render → control event queue
pub fn event_channel() -> (rtrb::Producer<EngineEvent>, rtrb::Consumer<EngineEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}
