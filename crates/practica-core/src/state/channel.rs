//! Validated parameter requests from non-realtime threads
//!
//! Every writer (UI, MIDI, speed trainer, tempo analysis) goes through a
//! [`ParameterChannel`]. A request is checked against the latest *accepted*
//! state on the caller's thread, clamped where a range applies, and then
//! queued for the render thread, which applies it at the next block
//! boundary. Rejections are returned synchronously with a reason and leave
//! every copy of the state untouched.
//!
//! The channel's mutex is only ever taken by control threads; the render
//! thread sees nothing but the lock-free command queue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use basedrop::Shared;
use thiserror::Error;

use super::playback::{
    EqBand, EqBands, LoopRange, OutputMode, PlaybackState, TransportStatus, MAX_EQ_BANDS,
    MAX_PITCH_SEMITONES, MAX_SPEED_PERCENT, MAX_TEMPO_BPM, MIN_LOOP_MS, MIN_PITCH_SEMITONES,
    MIN_SPEED_PERCENT, MIN_TEMPO_BPM,
};
use crate::engine::{EngineCommand, ParameterUpdate};
use crate::types::SampleBuffer;

/// Why a request was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Loop start {a_ms:.1}ms must be before loop end {b_ms:.1}ms")]
    LoopOrder { a_ms: f64, b_ms: f64 },

    #[error("Loop {a_ms:.1}..{b_ms:.1}ms is outside the track (0..{duration_ms:.1}ms)")]
    LoopOutOfRange { a_ms: f64, b_ms: f64, duration_ms: f64 },

    #[error("Loop of {length_ms:.1}ms is shorter than the {min_ms:.0}ms minimum")]
    LoopTooShort { length_ms: f64, min_ms: f64 },

    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("Tempo must not be negative (got {0})")]
    NegativeTempo(f64),

    #[error("At most {max} EQ bands are supported (got {got})")]
    TooManyEqBands { got: usize, max: usize },

    #[error("No track is loaded")]
    NoBufferLoaded,

    #[error("Engine command queue is full")]
    QueueFull,

    #[error("Request for track generation {generation} arrived after generation {current} was loaded")]
    Superseded { generation: u64, current: u64 },
}

pub type ParamResult<T> = Result<T, ParamError>;

struct ChannelInner {
    producer: rtrb::Producer<EngineCommand>,
    /// State as it will be once every queued command has been applied
    pending: PlaybackState,
    /// Track generation of the last queued load or unload
    generation: u64,
}

/// Cloneable handle for submitting parameter requests
///
/// All clones share one queue producer; requests from different threads are
/// serialized by a short control-side lock.
#[derive(Clone)]
pub struct ParameterChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

impl ParameterChannel {
    /// Wrap the producer side of the engine command queue
    pub fn new(producer: rtrb::Producer<EngineCommand>, initial: PlaybackState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner {
                producer,
                pending: initial,
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        // Fields are only written after validation succeeds, so a poisoned
        // lock still guards a consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest accepted state (may be ahead of what is audible)
    pub fn pending_state(&self) -> PlaybackState {
        self.lock().pending.clone()
    }

    /// Volume, clamped to [0, 1]
    pub fn set_volume(&self, volume: f32) -> ParamResult<()> {
        if !volume.is_finite() {
            return Err(ParamError::NonFinite { field: "volume" });
        }
        self.submit(ParameterUpdate::Volume(volume.clamp(0.0, 1.0)))
    }

    /// Pitch offset in semitones, clamped to [-12, 12]
    pub fn set_pitch(&self, semitones: i32) -> ParamResult<()> {
        self.submit(ParameterUpdate::Pitch(
            semitones.clamp(MIN_PITCH_SEMITONES, MAX_PITCH_SEMITONES),
        ))
    }

    /// Relative pitch change
    pub fn adjust_pitch(&self, delta: i32) -> ParamResult<()> {
        let current = self.lock().pending.pitch_semitones;
        self.set_pitch(current.saturating_add(delta))
    }

    /// Speed in percent, clamped to [20, 200]
    pub fn set_speed(&self, percent: u32) -> ParamResult<()> {
        self.submit(ParameterUpdate::Speed(
            percent.clamp(MIN_SPEED_PERCENT, MAX_SPEED_PERCENT),
        ))
    }

    /// Relative speed change in percent points
    pub fn adjust_speed(&self, delta: i32) -> ParamResult<()> {
        let current = self.lock().pending.speed_percent as i64;
        let target = (current + delta as i64).clamp(0, u32::MAX as i64) as u32;
        self.set_speed(target)
    }

    /// Set both loop points; rejected unless `0 <= a < b <= duration`
    pub fn set_loop(&self, a_ms: f64, b_ms: f64) -> ParamResult<()> {
        self.submit(ParameterUpdate::Loop(LoopRange::new(a_ms, b_ms)))
    }

    /// Set loop points as fractions of the track duration
    pub fn set_loop_ratio(&self, a_ratio: f64, b_ratio: f64) -> ParamResult<()> {
        let duration = self.lock().pending.duration_ms;
        self.set_loop(a_ratio * duration, b_ratio * duration)
    }

    /// Restore the loop to the full track
    pub fn reset_loop(&self) -> ParamResult<()> {
        let duration = self.lock().pending.duration_ms;
        self.set_loop(0.0, duration)
    }

    /// Move loop A to `position_ms`
    ///
    /// If A would not be before the current B, B moves to the track end.
    pub fn set_loop_a_at(&self, position_ms: f64) -> ParamResult<()> {
        let (b_ms, duration) = {
            let inner = self.lock();
            (inner.pending.loop_range.b_ms, inner.pending.duration_ms)
        };
        let b_ms = if position_ms < b_ms { b_ms } else { duration };
        self.set_loop(position_ms, b_ms)
    }

    /// Move loop B to `position_ms`
    ///
    /// If B would not be after the current A, A moves to the track start.
    pub fn set_loop_b_at(&self, position_ms: f64) -> ParamResult<()> {
        let a_ms = self.lock().pending.loop_range.a_ms;
        let a_ms = if position_ms > a_ms { a_ms } else { 0.0 };
        self.set_loop(a_ms, position_ms)
    }

    /// Tempo and beat phase together; `bpm == 0` marks the tempo as undetected
    pub fn set_tempo(&self, bpm: f64, beat_phase_ms: f64) -> ParamResult<()> {
        self.submit(ParameterUpdate::Tempo { bpm, beat_phase_ms })
    }

    /// Tempo computed for one particular track
    ///
    /// Rejected with [`ParamError::Superseded`] once another track has been
    /// queued, so a late analysis result can't land on its successor.
    pub fn set_tempo_for(&self, generation: u64, bpm: f64, beat_phase_ms: f64) -> ParamResult<()> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(ParamError::Superseded {
                generation,
                current: inner.generation,
            });
        }
        Self::submit_locked(&mut inner, ParameterUpdate::Tempo { bpm, beat_phase_ms })
    }

    /// Generation of the most recently queued load or unload
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Tempo only, keeping the current beat phase
    pub fn set_bpm(&self, bpm: f64) -> ParamResult<()> {
        let phase = self.lock().pending.beat_phase_ms;
        self.set_tempo(bpm, phase)
    }

    /// Beat phase only, keeping the current tempo
    pub fn set_beat_phase(&self, beat_phase_ms: f64) -> ParamResult<()> {
        let bpm = self.lock().pending.bpm;
        self.set_tempo(bpm, beat_phase_ms)
    }

    pub fn set_output_mode(&self, mode: OutputMode) -> ParamResult<()> {
        self.submit(ParameterUpdate::OutputMode(mode))
    }

    pub fn set_metronome(&self, enabled: bool) -> ParamResult<()> {
        self.submit(ParameterUpdate::Metronome(enabled))
    }

    pub fn toggle_metronome(&self) -> ParamResult<()> {
        let enabled = self.lock().pending.metronome_enabled;
        self.set_metronome(!enabled)
    }

    /// Replace the EQ band list (applied in order; empty = flat)
    pub fn set_eq_bands(&self, bands: &[EqBand]) -> ParamResult<()> {
        if bands.len() > MAX_EQ_BANDS {
            return Err(ParamError::TooManyEqBands {
                got: bands.len(),
                max: MAX_EQ_BANDS,
            });
        }
        if bands.iter().any(|b| !b.is_finite()) {
            return Err(ParamError::NonFinite { field: "eq band" });
        }
        let mut clamped = [EqBand::default(); MAX_EQ_BANDS];
        for (slot, band) in clamped.iter_mut().zip(bands) {
            *slot = band.clamped();
        }
        let bands = EqBands::from_slice(&clamped[..bands.len()]).ok_or(ParamError::TooManyEqBands {
            got: bands.len(),
            max: MAX_EQ_BANDS,
        })?;
        self.submit(ParameterUpdate::Eq(bands))
    }

    pub fn set_transport(&self, status: TransportStatus) -> ParamResult<()> {
        self.submit(ParameterUpdate::Transport(status))
    }

    pub fn play(&self) -> ParamResult<()> {
        self.set_transport(TransportStatus::Playing)
    }

    pub fn pause(&self) -> ParamResult<()> {
        self.set_transport(TransportStatus::Paused)
    }

    pub fn stop(&self) -> ParamResult<()> {
        self.set_transport(TransportStatus::Stopped)
    }

    /// Playing ↔ Paused (Stopped starts playing)
    pub fn toggle_play(&self) -> ParamResult<()> {
        let status = self.lock().pending.transport;
        match status {
            TransportStatus::Playing => self.pause(),
            TransportStatus::Paused | TransportStatus::Stopped => self.play(),
        }
    }

    /// Jump to `position_ms` (clamped into the loop by the engine)
    pub fn seek(&self, position_ms: f64) -> ParamResult<()> {
        if !position_ms.is_finite() {
            return Err(ParamError::NonFinite { field: "position" });
        }
        let mut inner = self.lock();
        if !inner.pending.has_buffer() {
            return Err(ParamError::NoBufferLoaded);
        }
        inner
            .producer
            .push(EngineCommand::Seek { position_ms })
            .map_err(|_| ParamError::QueueFull)
    }

    /// Jump to loop A
    pub fn to_head(&self) -> ParamResult<()> {
        let a_ms = self.lock().pending.loop_range.a_ms;
        self.seek(a_ms)
    }

    /// Queue a buffer swap
    ///
    /// The pending state moves to the new track right away so that requests
    /// submitted after the load validate against the new duration.
    pub(crate) fn submit_load(&self, buffer: Shared<SampleBuffer>, generation: u64) -> ParamResult<()> {
        let duration_ms = buffer.duration_ms();
        let mut inner = self.lock();
        inner
            .producer
            .push(EngineCommand::LoadBuffer { buffer, generation })
            .map_err(|_| ParamError::QueueFull)?;
        inner.generation = generation;
        inner.pending.duration_ms = duration_ms;
        inner.pending.loop_range = LoopRange::full(duration_ms);
        inner.pending.bpm = 0.0;
        inner.pending.beat_phase_ms = 0.0;
        Ok(())
    }

    pub(crate) fn submit_unload(&self, generation: u64) -> ParamResult<()> {
        let mut inner = self.lock();
        inner
            .producer
            .push(EngineCommand::UnloadBuffer)
            .map_err(|_| ParamError::QueueFull)?;
        inner.generation = generation;
        inner.pending.duration_ms = 0.0;
        inner.pending.loop_range = LoopRange::default();
        inner.pending.bpm = 0.0;
        inner.pending.beat_phase_ms = 0.0;
        Ok(())
    }

    /// Validate, queue and record one update
    fn submit(&self, update: ParameterUpdate) -> ParamResult<()> {
        Self::submit_locked(&mut self.lock(), update)
    }

    fn submit_locked(inner: &mut ChannelInner, update: ParameterUpdate) -> ParamResult<()> {
        let update = validate(&inner.pending, update)?;
        inner
            .producer
            .push(EngineCommand::Set(update))
            .map_err(|_| ParamError::QueueFull)?;
        apply_update(&mut inner.pending, &update);
        log::debug!("ParameterChannel: queued {:?}", update);
        Ok(())
    }
}

/// Check a request against `state`, returning the (possibly clamped) update
///
/// Also used by the render thread to re-check loop requests against the
/// buffer that is actually loaded when the command is applied.
pub(crate) fn validate(state: &PlaybackState, update: ParameterUpdate) -> ParamResult<ParameterUpdate> {
    match update {
        ParameterUpdate::Loop(range) => {
            if !range.a_ms.is_finite() || !range.b_ms.is_finite() {
                return Err(ParamError::NonFinite { field: "loop point" });
            }
            if !state.has_buffer() {
                return Err(ParamError::NoBufferLoaded);
            }
            if range.a_ms >= range.b_ms {
                return Err(ParamError::LoopOrder {
                    a_ms: range.a_ms,
                    b_ms: range.b_ms,
                });
            }
            if range.a_ms < 0.0 || range.b_ms > state.duration_ms {
                return Err(ParamError::LoopOutOfRange {
                    a_ms: range.a_ms,
                    b_ms: range.b_ms,
                    duration_ms: state.duration_ms,
                });
            }
            let min_ms = MIN_LOOP_MS.min(state.duration_ms);
            if range.length_ms() < min_ms {
                return Err(ParamError::LoopTooShort {
                    length_ms: range.length_ms(),
                    min_ms,
                });
            }
            Ok(update)
        }
        ParameterUpdate::Tempo { bpm, beat_phase_ms } => {
            if !bpm.is_finite() || !beat_phase_ms.is_finite() {
                return Err(ParamError::NonFinite { field: "tempo" });
            }
            if bpm < 0.0 {
                return Err(ParamError::NegativeTempo(bpm));
            }
            if bpm == 0.0 {
                return Ok(ParameterUpdate::Tempo {
                    bpm: 0.0,
                    beat_phase_ms: beat_phase_ms.max(0.0),
                });
            }
            let bpm = bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM);
            let period = 60000.0 / bpm;
            Ok(ParameterUpdate::Tempo {
                bpm,
                beat_phase_ms: beat_phase_ms.rem_euclid(period),
            })
        }
        ParameterUpdate::Volume(v) if !v.is_finite() => Err(ParamError::NonFinite { field: "volume" }),
        ParameterUpdate::Volume(v) => Ok(ParameterUpdate::Volume(v.clamp(0.0, 1.0))),
        ParameterUpdate::Pitch(p) => Ok(ParameterUpdate::Pitch(
            p.clamp(MIN_PITCH_SEMITONES, MAX_PITCH_SEMITONES),
        )),
        ParameterUpdate::Speed(s) => Ok(ParameterUpdate::Speed(
            s.clamp(MIN_SPEED_PERCENT, MAX_SPEED_PERCENT),
        )),
        ParameterUpdate::OutputMode(_)
        | ParameterUpdate::Metronome(_)
        | ParameterUpdate::Eq(_)
        | ParameterUpdate::Transport(_) => Ok(update),
    }
}

/// Write a validated update into a state copy
pub(crate) fn apply_update(state: &mut PlaybackState, update: &ParameterUpdate) {
    match *update {
        ParameterUpdate::Volume(v) => state.volume = v,
        ParameterUpdate::Pitch(p) => state.pitch_semitones = p,
        ParameterUpdate::Speed(s) => state.speed_percent = s,
        ParameterUpdate::Loop(range) => state.loop_range = range,
        ParameterUpdate::Tempo { bpm, beat_phase_ms } => {
            state.bpm = bpm;
            state.beat_phase_ms = beat_phase_ms;
        }
        ParameterUpdate::OutputMode(mode) => state.output_mode = mode,
        ParameterUpdate::Metronome(enabled) => state.metronome_enabled = enabled,
        ParameterUpdate::Eq(bands) => state.eq_bands = bands,
        ParameterUpdate::Transport(status) => state.transport = status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command_channel;

    fn loaded_state(duration_ms: f64) -> PlaybackState {
        PlaybackState {
            duration_ms,
            loop_range: LoopRange::full(duration_ms),
            ..Default::default()
        }
    }

    fn drain(rx: &mut rtrb::Consumer<EngineCommand>) -> Vec<ParameterUpdate> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.pop() {
            if let EngineCommand::Set(update) = cmd {
                out.push(update);
            }
        }
        out
    }

    #[test]
    fn test_numeric_requests_are_clamped() {
        let (tx, mut rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(10_000.0));

        channel.set_speed(500).unwrap();
        channel.set_speed(5).unwrap();
        channel.set_pitch(-40).unwrap();
        channel.set_volume(1.5).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ParameterUpdate::Speed(200),
                ParameterUpdate::Speed(20),
                ParameterUpdate::Pitch(-12),
                ParameterUpdate::Volume(1.0),
            ]
        );
        let pending = channel.pending_state();
        assert_eq!(pending.speed_percent, 20);
        assert_eq!(pending.pitch_semitones, -12);
    }

    #[test]
    fn test_invalid_loops_are_rejected_without_side_effects() {
        let (tx, mut rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(10_000.0));
        channel.set_loop(1000.0, 2000.0).unwrap();
        let before = channel.pending_state();

        assert!(matches!(
            channel.set_loop(3000.0, 3000.0),
            Err(ParamError::LoopOrder { .. })
        ));
        assert!(matches!(
            channel.set_loop(4000.0, 3000.0),
            Err(ParamError::LoopOrder { .. })
        ));
        assert!(matches!(
            channel.set_loop(-5.0, 3000.0),
            Err(ParamError::LoopOutOfRange { .. })
        ));
        assert!(matches!(
            channel.set_loop(0.0, 10_001.0),
            Err(ParamError::LoopOutOfRange { .. })
        ));
        assert_eq!(
            channel.set_loop(f64::NAN, 1.0),
            Err(ParamError::NonFinite { field: "loop point" })
        );
        assert_eq!(
            channel.set_loop(3000.0, 3020.0),
            Err(ParamError::LoopTooShort {
                length_ms: 20.0,
                min_ms: MIN_LOOP_MS
            })
        );

        assert_eq!(channel.pending_state(), before);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_tempo_for_replaced_track_is_rejected() {
        use crate::engine::gc_handle;
        use crate::types::StereoSample;

        let (tx, mut rx) = command_channel();
        let channel = ParameterChannel::new(tx, PlaybackState::default());
        let track = || {
            let buffer = SampleBuffer::from_frames(vec![StereoSample::silence(); 48000], 48000).unwrap();
            Shared::new(&gc_handle(), buffer)
        };

        channel.submit_load(track(), 1).unwrap();
        channel.set_tempo_for(1, 100.0, 0.0).unwrap();
        channel.submit_load(track(), 2).unwrap();
        assert_eq!(
            channel.set_tempo_for(1, 137.0, 0.0),
            Err(ParamError::Superseded { generation: 1, current: 2 })
        );
        assert_eq!(channel.pending_state().bpm, 0.0);

        channel.submit_unload(3).unwrap();
        assert_eq!(channel.generation(), 3);
        assert!(matches!(channel.set_tempo_for(2, 90.0, 0.0), Err(ParamError::Superseded { .. })));
        assert_eq!(
            drain(&mut rx),
            vec![ParameterUpdate::Tempo {
                bpm: 100.0,
                beat_phase_ms: 0.0
            }]
        );
    }

    #[test]
    fn test_tracks_shorter_than_the_minimum_loop_still_loop_whole() {
        let (tx, _rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(40.0));
        channel.reset_loop().unwrap();
        assert!(matches!(channel.set_loop(0.0, 20.0), Err(ParamError::LoopTooShort { .. })));
        assert_eq!(channel.pending_state().loop_range, LoopRange::full(40.0));
    }

    #[test]
    fn test_loop_requires_buffer() {
        let (tx, _rx) = command_channel();
        let channel = ParameterChannel::new(tx, PlaybackState::default());
        assert_eq!(channel.set_loop(0.0, 100.0), Err(ParamError::NoBufferLoaded));
        assert_eq!(channel.seek(10.0), Err(ParamError::NoBufferLoaded));
    }

    #[test]
    fn test_loop_points_from_position() {
        let (tx, _rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(10_000.0));
        channel.set_loop(2000.0, 4000.0).unwrap();

        // A past B pushes B to the track end
        channel.set_loop_a_at(5000.0).unwrap();
        assert_eq!(channel.pending_state().loop_range, LoopRange::new(5000.0, 10_000.0));

        // B before A pulls A back to the start
        channel.set_loop_b_at(3000.0).unwrap();
        assert_eq!(channel.pending_state().loop_range, LoopRange::new(0.0, 3000.0));

        channel.reset_loop().unwrap();
        assert_eq!(channel.pending_state().loop_range, LoopRange::full(10_000.0));
    }

    #[test]
    fn test_tempo_phase_is_wrapped_into_one_period() {
        let (tx, _rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(10_000.0));

        channel.set_tempo(120.0, 1250.0).unwrap();
        let pending = channel.pending_state();
        assert_eq!(pending.bpm, 120.0);
        assert!((pending.beat_phase_ms - 250.0).abs() < 1e-9);

        channel.set_beat_phase(-100.0).unwrap();
        assert!((channel.pending_state().beat_phase_ms - 400.0).abs() < 1e-9);

        assert_eq!(channel.set_bpm(-1.0), Err(ParamError::NegativeTempo(-1.0)));
        channel.set_bpm(0.0).unwrap();
        assert_eq!(channel.pending_state().bpm, 0.0);
    }

    #[test]
    fn test_loop_from_ratio_uses_time_as_canonical() {
        let (tx, _rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(8000.0));
        channel.set_loop_ratio(0.25, 0.5).unwrap();
        let pending = channel.pending_state();
        assert_eq!(pending.loop_range, LoopRange::new(2000.0, 4000.0));
        assert_eq!((pending.loop_a_ratio(), pending.loop_b_ratio()), (0.25, 0.5));

        assert!(matches!(channel.set_loop_ratio(0.5, 1.5), Err(ParamError::LoopOutOfRange { .. })));
    }

    #[test]
    fn test_eq_band_validation() {
        let (tx, _rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(10_000.0));

        let too_many = vec![EqBand::default(); MAX_EQ_BANDS + 1];
        assert_eq!(
            channel.set_eq_bands(&too_many),
            Err(ParamError::TooManyEqBands { got: MAX_EQ_BANDS + 1, max: MAX_EQ_BANDS })
        );

        channel.set_eq_bands(&[EqBand::peaking(40_000.0, -80.0, 0.01)]).unwrap();
        let bands = channel.pending_state().eq_bands;
        assert_eq!(bands.as_slice()[0], EqBand::peaking(20_000.0, -36.0, 0.1));
    }

    #[test]
    fn test_full_queue_is_reported() {
        let (tx, _rx) = rtrb::RingBuffer::new(1);
        let channel = ParameterChannel::new(tx, loaded_state(1000.0));
        channel.set_volume(0.5).unwrap();
        assert_eq!(channel.set_volume(0.25), Err(ParamError::QueueFull));
        assert_eq!(channel.pending_state().volume, 0.5);
    }

    #[test]
    fn test_toggle_play() {
        let (tx, mut rx) = command_channel();
        let channel = ParameterChannel::new(tx, loaded_state(1000.0));
        channel.toggle_play().unwrap();
        channel.toggle_play().unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                ParameterUpdate::Transport(TransportStatus::Playing),
                ParameterUpdate::Transport(TransportStatus::Paused),
            ]
        );
    }
}
