//! Playback session - one track, one engine, and everything that controls it
//!
//! A [`Session`] owns the control side of the engine: the
//! [`ParameterChannel`], the [`StateHub`] that observers subscribe to, the
//! speed trainer, tap tempo and the tempo analysis worker. The matching
//! [`RenderEngine`] is returned from [`Session::new`] and moved to the audio
//! callback.
//!
//! Render-thread reports reach the hub either through the dispatcher thread
//! ([`Session::start_dispatcher`]) or by calling [`Session::pump`] from a
//! UI tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use basedrop::Shared;
use crossbeam::channel::Receiver;
use thiserror::Error;

use crate::analysis::{AnalysisWorker, TempoEstimate};
use crate::config::{PracticaConfig, SpeedTrainerConfig};
use crate::engine::{command_channel, event_channel, gc_handle, EngineAtomics, EngineEvent, RenderEngine};
use crate::state::{EventFilter, ParamError, ParameterChannel, PlaybackState, StateEvent, StateHub};
use crate::tap_tempo::TapTempo;
use crate::trainer::SpeedTrainer;
use crate::types::{BufferError, SampleBuffer};

/// Idle wait of the dispatcher thread between queue polls
const DISPATCH_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid sample data: {0}")]
    Buffer(#[from] BufferError),

    #[error("Request rejected: {0}")]
    Param(#[from] ParamError),

    #[error("Tempo analysis unavailable: {0}")]
    Analysis(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes committed engine reports to observers and the trainer
struct Dispatch {
    hub: Arc<StateHub>,
    channel: ParameterChannel,
    trainer: Arc<Mutex<SpeedTrainer>>,
}

impl Dispatch {
    fn handle(&self, event: &EngineEvent) {
        for change in self.hub.commit(event) {
            lock(&self.trainer).on_event(&change, &self.channel);
        }
    }
}

pub struct Session {
    config: PracticaConfig,
    channel: ParameterChannel,
    atomics: Arc<EngineAtomics>,
    dispatch: Arc<Dispatch>,
    /// Render → control reports; taken by the dispatcher thread once started
    events: Mutex<Option<rtrb::Consumer<EngineEvent>>>,
    tap: Mutex<TapTempo>,
    analysis: AnalysisWorker,
    generation: AtomicU64,
    /// Currently loaded track, kept for re-analysis
    current: Mutex<Option<Shared<SampleBuffer>>>,
    dispatcher_running: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create a session and the engine it controls
    pub fn new(config: PracticaConfig, device_sample_rate: u32) -> (Self, RenderEngine) {
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let atomics = Arc::new(EngineAtomics::new());

        let engine = RenderEngine::new(&config, device_sample_rate, command_rx, event_tx, atomics.clone());

        let initial = PlaybackState::default();
        let channel = ParameterChannel::new(command_tx, initial.clone());
        let hub = Arc::new(StateHub::new(initial));
        let trainer = Arc::new(Mutex::new(SpeedTrainer::new(config.trainer.clone())));

        let analysis = {
            let channel = channel.clone();
            let hub = hub.clone();
            AnalysisWorker::spawn(
                config.analysis.clone(),
                Box::new(move |generation, estimate| apply_analysis(&channel, &hub, generation, estimate)),
            )
        };

        log::info!("Session started at {} Hz", device_sample_rate);

        let session = Self {
            tap: Mutex::new(TapTempo::new(config.tap_tempo.clone())),
            config,
            channel: channel.clone(),
            atomics,
            dispatch: Arc::new(Dispatch { hub, channel, trainer }),
            events: Mutex::new(Some(event_rx)),
            analysis,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
            dispatcher_running: Arc::new(AtomicBool::new(false)),
            dispatcher: Mutex::new(None),
        };
        (session, engine)
    }

    pub fn config(&self) -> &PracticaConfig {
        &self.config
    }

    /// Request path for every playback parameter
    pub fn channel(&self) -> &ParameterChannel {
        &self.channel
    }

    /// Playhead, loop count and transport as published by the engine
    pub fn atomics(&self) -> &Arc<EngineAtomics> {
        &self.atomics
    }

    /// State the engine has applied
    pub fn snapshot(&self) -> PlaybackState {
        self.dispatch.hub.snapshot()
    }

    pub fn subscribe(&self, filter: EventFilter) -> Receiver<StateEvent> {
        self.dispatch.hub.subscribe(filter)
    }

    /// Replace the track with decoded interleaved samples
    ///
    /// Resets the loop to the whole track and restarts the speed trainer's
    /// count; tempo analysis runs in the background. Returns the generation
    /// assigned to the new track.
    pub fn load_buffer(&self, samples: &[f32], sample_rate: u32, channels: u16) -> Result<u64, SessionError> {
        let buffer = SampleBuffer::from_interleaved(samples, sample_rate, channels)?;
        self.load_sample_buffer(buffer)
    }

    pub fn load_sample_buffer(&self, buffer: SampleBuffer) -> Result<u64, SessionError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Results for the previous track must not land on this one
        self.analysis.invalidate(generation);

        let frames = buffer.frame_count();
        let duration_ms = buffer.duration_ms();
        let buffer = Shared::new(&gc_handle(), buffer);
        self.channel.submit_load(buffer.clone(), generation)?;

        lock(&self.dispatch.trainer).reset();
        lock(&self.tap).reset();
        *lock(&self.current) = Some(buffer.clone());

        log::info!(
            "Session: loaded track generation {} ({} frames, {:.1} s)",
            generation,
            frames,
            duration_ms / 1000.0
        );

        if let Err(e) = self.analysis.submit(generation, buffer) {
            log::warn!("Session: tempo analysis not started: {}", e);
        }
        Ok(generation)
    }

    /// Drop the current track; output becomes silence
    pub fn unload(&self) -> Result<(), SessionError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.analysis.invalidate(generation);
        self.channel.submit_unload(generation)?;
        *lock(&self.current) = None;
        lock(&self.dispatch.trainer).reset();
        log::info!("Session: track unloaded");
        Ok(())
    }

    /// Run tempo analysis again on the loaded track
    pub fn reanalyze(&self) -> Result<(), SessionError> {
        let buffer = lock(&self.current).clone().ok_or(ParamError::NoBufferLoaded)?;
        let generation = self.generation.load(Ordering::SeqCst);
        self.analysis
            .submit(generation, buffer)
            .map_err(SessionError::Analysis)
    }

    /// Tap tempo at the current instant
    pub fn tap(&self) -> Option<f64> {
        self.tap_at(Instant::now())
    }

    /// Register a tap; once a tempo is known it is committed with the beat
    /// phase placed at the current playback position
    pub fn tap_at(&self, now: Instant) -> Option<f64> {
        let bpm = lock(&self.tap).tap(now)?;
        let phase_ms = self.atomics.position_ms();
        match self.channel.set_tempo(bpm, phase_ms) {
            Ok(()) => {
                log::debug!("Session: tapped tempo {:.2} BPM", bpm);
                Some(bpm)
            }
            Err(e) => {
                log::warn!("Session: tapped tempo rejected: {}", e);
                None
            }
        }
    }

    pub fn trainer_enabled(&self) -> bool {
        lock(&self.dispatch.trainer).is_enabled()
    }

    pub fn set_trainer_enabled(&self, enabled: bool) {
        lock(&self.dispatch.trainer).set_enabled(enabled);
    }

    /// Flip the speed trainer, returning whether it is now enabled
    pub fn toggle_trainer(&self) -> bool {
        lock(&self.dispatch.trainer).toggle()
    }

    pub fn configure_trainer(&self, config: SpeedTrainerConfig) {
        lock(&self.dispatch.trainer).configure(config);
    }

    /// Fold pending engine reports into the committed state
    ///
    /// Returns the number of reports handled; always 0 once the dispatcher
    /// thread owns the queue.
    pub fn pump(&self) -> usize {
        let mut events = lock(&self.events);
        let Some(consumer) = events.as_mut() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(event) = consumer.pop() {
            self.dispatch.handle(&event);
            handled += 1;
        }
        handled
    }

    /// Move report handling to a background thread
    ///
    /// Returns false if it was already started.
    pub fn start_dispatcher(&self) -> bool {
        let Some(mut consumer) = lock(&self.events).take() else {
            return false;
        };
        let dispatch = self.dispatch.clone();
        let running = self.dispatcher_running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("state-dispatch".to_string())
            .spawn(move || {
                log::info!("State dispatcher thread started");
                while running.load(Ordering::SeqCst) {
                    let mut handled = false;
                    while let Ok(event) = consumer.pop() {
                        dispatch.handle(&event);
                        handled = true;
                    }
                    if !handled {
                        thread::sleep(DISPATCH_INTERVAL);
                    }
                }
                log::info!("State dispatcher thread shutting down");
            })
            .expect("Failed to spawn state dispatcher thread");

        *lock(&self.dispatcher) = Some(handle);
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispatcher_running.store(false, Ordering::SeqCst);
        if let Some(handle) = lock(&self.dispatcher).take() {
            let _ = handle.join();
        }
    }
}

/// Commit an analysis result for the track it was computed on
fn apply_analysis(channel: &ParameterChannel, hub: &StateHub, generation: u64, estimate: TempoEstimate) {
    if !estimate.is_detected() {
        if channel.generation() != generation {
            log::debug!("Session: dropping undetected result of superseded generation {}", generation);
            return;
        }
        log::info!("Session: no tempo detected for generation {}", generation);
        hub.publish(StateEvent::TempoUndetected(estimate));
        return;
    }
    match channel.set_tempo_for(generation, estimate.bpm, estimate.beat_phase_ms) {
        Ok(()) => hub.publish(StateEvent::TempoDetected(estimate)),
        Err(e @ ParamError::Superseded { .. }) => log::debug!("Session: {}", e),
        Err(e) => log::warn!("Session: detected tempo rejected: {}", e),
    }
}
