//! Committed state and typed change notifications
//!
//! The render thread reports what it actually applied; [`StateHub`] folds
//! those reports into the committed [`PlaybackState`] and fans out one
//! [`StateEvent`] per field whose value really changed. Observers subscribe
//! with an [`EventFilter`] and receive events on their own crossbeam
//! channel, so a slow UI never stalls the dispatcher.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::channel::apply_update;
use super::playback::{EqBands, LoopRange, OutputMode, PlaybackState, TransportStatus};
use crate::analysis::TempoEstimate;
use crate::engine::{EngineEvent, LoopCompletionEvent, ParameterUpdate};

/// Loop boundaries as reported to observers (time canonical, ratios derived)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPosition {
    pub a_ms: f64,
    pub a_ratio: f64,
    pub b_ms: f64,
    pub b_ratio: f64,
}

impl LoopPosition {
    pub fn new(range: LoopRange, duration_ms: f64) -> Self {
        let (a_ratio, b_ratio) = range.ratios(duration_ms);
        Self {
            a_ms: range.a_ms,
            a_ratio,
            b_ms: range.b_ms,
            b_ratio,
        }
    }
}

/// One observable change
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    VolumeChanged(f32),
    PitchChanged(i32),
    SpeedChanged(u32),
    LoopChanged(LoopPosition),
    TempoChanged(f64),
    BeatPhaseChanged(f64),
    OutputModeChanged(OutputMode),
    MetronomeChanged(bool),
    EqChanged(EqBands),
    TransportChanged(TransportStatus),
    LoopCompleted(LoopCompletionEvent),
    BufferLoaded { generation: u64, duration_ms: f64 },
    BufferUnloaded,
    /// Analysis found a tempo above the confidence threshold
    TempoDetected(TempoEstimate),
    /// Analysis finished without a usable tempo; bpm stays undetected
    TempoUndetected(TempoEstimate),
}

/// Category of a [`StateEvent`], used for subscription filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Volume,
    Pitch,
    Speed,
    Loop,
    Tempo,
    BeatPhase,
    OutputMode,
    Metronome,
    Eq,
    Transport,
    LoopCompleted,
    Buffer,
    Analysis,
}

impl StateEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StateEvent::VolumeChanged(_) => EventKind::Volume,
            StateEvent::PitchChanged(_) => EventKind::Pitch,
            StateEvent::SpeedChanged(_) => EventKind::Speed,
            StateEvent::LoopChanged(_) => EventKind::Loop,
            StateEvent::TempoChanged(_) => EventKind::Tempo,
            StateEvent::BeatPhaseChanged(_) => EventKind::BeatPhase,
            StateEvent::OutputModeChanged(_) => EventKind::OutputMode,
            StateEvent::MetronomeChanged(_) => EventKind::Metronome,
            StateEvent::EqChanged(_) => EventKind::Eq,
            StateEvent::TransportChanged(_) => EventKind::Transport,
            StateEvent::LoopCompleted(_) => EventKind::LoopCompleted,
            StateEvent::BufferLoaded { .. } | StateEvent::BufferUnloaded => EventKind::Buffer,
            StateEvent::TempoDetected(_) | StateEvent::TempoUndetected(_) => EventKind::Analysis,
        }
    }
}

/// Set of event kinds an observer wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter(u32);

impl EventFilter {
    pub fn all() -> Self {
        Self(u32::MAX)
    }

    pub fn only(kinds: &[EventKind]) -> Self {
        Self(kinds.iter().fold(0, |mask, k| mask | Self::bit(*k)))
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    fn bit(kind: EventKind) -> u32 {
        1 << kind as u32
    }
}

struct Subscriber {
    filter: EventFilter,
    tx: Sender<StateEvent>,
}

/// Committed playback state plus observer registry
pub struct StateHub {
    committed: Mutex<PlaybackState>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl StateHub {
    pub fn new(initial: PlaybackState) -> Self {
        Self {
            committed: Mutex::new(initial),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn committed(&self) -> MutexGuard<'_, PlaybackState> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the state the render thread has applied
    pub fn snapshot(&self) -> PlaybackState {
        self.committed().clone()
    }

    /// Register an observer; dropped receivers are pruned on the next publish
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<StateEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, tx });
        rx
    }

    /// Send one event to every interested observer
    pub fn publish(&self, event: StateEvent) {
        let kind = event.kind();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|s| !s.filter.contains(kind) || s.tx.send(event.clone()).is_ok());
    }

    /// Fold one render-thread report into the committed state
    ///
    /// Returns the observer events it produced (already published), in order.
    pub fn commit(&self, event: &EngineEvent) -> Vec<StateEvent> {
        let events = {
            let mut state = self.committed();
            changes_for(&mut state, event)
        };
        for e in &events {
            self.publish(e.clone());
        }
        events
    }
}

/// Apply `event` to `state` and describe what changed
fn changes_for(state: &mut PlaybackState, event: &EngineEvent) -> Vec<StateEvent> {
    let mut out = Vec::new();
    match event {
        EngineEvent::Applied(update) => {
            let before = state.clone();
            apply_update(state, update);
            match *update {
                ParameterUpdate::Volume(v) if v != before.volume => out.push(StateEvent::VolumeChanged(v)),
                ParameterUpdate::Pitch(p) if p != before.pitch_semitones => {
                    out.push(StateEvent::PitchChanged(p))
                }
                ParameterUpdate::Speed(s) if s != before.speed_percent => {
                    out.push(StateEvent::SpeedChanged(s))
                }
                ParameterUpdate::Loop(range) if range != before.loop_range => {
                    out.push(StateEvent::LoopChanged(LoopPosition::new(range, state.duration_ms)))
                }
                ParameterUpdate::Tempo { bpm, beat_phase_ms } => {
                    if bpm != before.bpm {
                        out.push(StateEvent::TempoChanged(bpm));
                    }
                    if beat_phase_ms != before.beat_phase_ms {
                        out.push(StateEvent::BeatPhaseChanged(beat_phase_ms));
                    }
                }
                ParameterUpdate::OutputMode(m) if m != before.output_mode => {
                    out.push(StateEvent::OutputModeChanged(m))
                }
                ParameterUpdate::Metronome(e) if e != before.metronome_enabled => {
                    out.push(StateEvent::MetronomeChanged(e))
                }
                ParameterUpdate::Eq(bands) if bands != before.eq_bands => out.push(StateEvent::EqChanged(bands)),
                ParameterUpdate::Transport(t) if t != before.transport => {
                    out.push(StateEvent::TransportChanged(t))
                }
                _ => {}
            }
        }
        EngineEvent::LoopCompleted(completion) => out.push(StateEvent::LoopCompleted(*completion)),
        EngineEvent::BufferLoaded { generation, duration_ms } => {
            state.duration_ms = *duration_ms;
            out.push(StateEvent::BufferLoaded {
                generation: *generation,
                duration_ms: *duration_ms,
            });
        }
        EngineEvent::BufferUnloaded => {
            state.duration_ms = 0.0;
            out.push(StateEvent::BufferUnloaded);
        }
    }
    out
}
