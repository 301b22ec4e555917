//! Render engine - turns the loaded track plus the current parameters into
//! device audio, one block at a time
//!
//! Per block:
//!
//! 1. Drain every queued command and apply them as one snapshot
//! 2. Read the loop with a fractional cursor (pitch resampling happens here)
//! 3. Time-stretch back to the requested speed (skipped at speed 100 / pitch 0)
//! 4. Parametric EQ
//! 5. Volume
//! 6. Metronome clicks
//! 7. Output routing into the interleaved device buffer
//!
//! With no track loaded or the transport not playing the block is silence.
//! Nothing here allocates, locks or logs.

use std::sync::Arc;

use basedrop::Shared;

use crate::config::PracticaConfig;
use crate::state::{apply_update, validate, LoopRange, PlaybackState, TransportStatus};
use crate::timestretch::{create_stretcher, TimeStretch, MAX_RATIO};
use crate::types::{SampleBuffer, StereoBuffer, StereoSample};

use super::command::{EngineCommand, EngineEvent, LoopCompletionEvent, ParameterUpdate};
use super::eq::EqChain;
use super::metronome::Metronome;
use super::reader::LoopReader;
use super::routing::write_interleaved;
use super::EngineAtomics;

/// Largest block rendered in one pass; longer device buffers are split
pub const MAX_BLOCK: usize = 8192;

/// Reader output needed for one block at the fastest stretch ratio
const MAX_INTERMEDIATE: usize = MAX_BLOCK * MAX_RATIO as usize + 8;

/// Short fades hiding discontinuities that the loop crossfade doesn't cover
///
/// `tail` holds a few milliseconds rendered from the old cursor/path; it is
/// faded out on top of the new audio, which fades in over the same span.
struct Declick {
    frames: usize,
    tail: Vec<StereoSample>,
    tail_len: usize,
    tail_pos: usize,
    fade_in_pos: usize,
}

impl Declick {
    fn new(frames: usize) -> Self {
        Self {
            frames,
            tail: vec![StereoSample::silence(); frames],
            tail_len: 0,
            tail_pos: 0,
            fade_in_pos: frames,
        }
    }

    fn start_fade_in(&mut self) {
        self.fade_in_pos = 0;
    }

    fn arm_tail(&mut self, len: usize) {
        self.tail_len = len;
        self.tail_pos = 0;
    }

    fn clear_tail(&mut self) {
        self.tail_len = 0;
        self.tail_pos = 0;
    }

    fn has_tail(&self) -> bool {
        self.tail_pos < self.tail_len
    }

    fn apply(&mut self, block: &mut [StereoSample]) {
        for frame in block.iter_mut() {
            if self.fade_in_pos < self.frames {
                *frame *= self.fade_in_pos as f32 / self.frames as f32;
                self.fade_in_pos += 1;
            }
            if self.tail_pos < self.tail_len {
                let gain = 1.0 - self.tail_pos as f32 / self.tail_len as f32;
                *frame += self.tail[self.tail_pos] * gain;
                self.tail_pos += 1;
            }
        }
    }
}

/// The real-time core
///
/// Owned by the audio callback. Control threads talk to it only through the
/// command queue and read its progress from [`EngineAtomics`].
pub struct RenderEngine {
    device_sample_rate: u32,
    commands: rtrb::Consumer<EngineCommand>,
    events: rtrb::Producer<EngineEvent>,
    atomics: Arc<EngineAtomics>,
    /// Loaded track; the old one is released through basedrop on swap
    buffer: Option<Shared<SampleBuffer>>,
    generation: u64,
    /// Working copy of the parameters, changed only between blocks
    state: PlaybackState,
    reader: LoopReader,
    stretcher: Box<dyn TimeStretch>,
    eq: EqChain,
    metronome: Metronome,
    declick: Declick,
    block: StereoBuffer,
    intermediate: StereoBuffer,
    /// Fraction of a reader frame carried between stretch blocks
    stretch_acc: f64,
    /// Speed 100 and pitch 0: the stretcher is skipped
    bypass: bool,
    applied_volume: f32,
    completions_reported: u64,
}

impl RenderEngine {
    pub fn new(
        config: &PracticaConfig,
        device_sample_rate: u32,
        commands: rtrb::Consumer<EngineCommand>,
        events: rtrb::Producer<EngineEvent>,
        atomics: Arc<EngineAtomics>,
    ) -> Self {
        let ms_to_frames = |ms: f64| (ms * device_sample_rate as f64 / 1000.0).round().max(0.0) as usize;
        let engine = &config.engine;
        let state = PlaybackState::default();

        Self {
            device_sample_rate,
            commands,
            events,
            atomics,
            buffer: None,
            generation: 0,
            reader: LoopReader::new(engine.interpolation, ms_to_frames(engine.loop_crossfade_ms)),
            stretcher: create_stretcher(engine.stretch_backend, device_sample_rate, MAX_BLOCK, engine.wsola_window_ms),
            eq: EqChain::new(device_sample_rate),
            metronome: Metronome::new(&config.metronome, device_sample_rate),
            declick: Declick::new(ms_to_frames(engine.declick_ms).min(MAX_BLOCK)),
            block: StereoBuffer::with_capacity(MAX_BLOCK),
            intermediate: StereoBuffer::with_capacity(MAX_INTERMEDIATE),
            stretch_acc: 0.0,
            bypass: state.is_identity_transform(),
            applied_volume: state.volume,
            completions_reported: 0,
            state,
        }
    }

    #[inline]
    pub fn device_sample_rate(&self) -> u32 {
        self.device_sample_rate
    }

    /// Parameters as of the last block
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Render one device buffer
    ///
    /// `output` is interleaved with `channels` samples per frame. Commands
    /// queued before the call take effect from its first frame.
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        self.drain_commands();
        if channels == 0 {
            return;
        }

        let frames = output.len() / channels;
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(MAX_BLOCK);
            self.render_block(n);
            write_interleaved(
                self.block.as_slice(),
                self.state.output_mode,
                &mut output[done * channels..(done + n) * channels],
                channels,
            );
            done += n;
        }
        output[frames * channels..].fill(0.0);

        self.publish_atomics();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                EngineCommand::Set(update) => self.apply(update),
                EngineCommand::Seek { position_ms } => self.seek(position_ms),
                EngineCommand::LoadBuffer { buffer, generation } => self.load(buffer, generation),
                EngineCommand::UnloadBuffer => self.unload(),
            }
        }
    }

    fn apply(&mut self, update: ParameterUpdate) {
        // Loops are checked again against the buffer that is actually loaded
        let Ok(update) = validate(&self.state, update) else {
            return;
        };
        let mut next = self.state.clone();
        apply_update(&mut next, &update);
        if next == self.state {
            return;
        }

        if self.is_audible() && self.breaks_continuity(&next) {
            self.capture_tail();
        }
        let previous = std::mem::replace(&mut self.state, next);

        match update {
            ParameterUpdate::Pitch(_) | ParameterUpdate::Speed(_) => self.configure_path(),
            ParameterUpdate::Loop(range) => {
                let (start, end) = self.loop_frames(range);
                let position = self.reader.position();
                self.reader.set_loop(start, end);
                if position < start || position >= end {
                    self.restart_path();
                }
            }
            ParameterUpdate::Eq(bands) => self.eq.set_bands(&bands),
            ParameterUpdate::Tempo { .. } | ParameterUpdate::Metronome(_) => self.metronome.cancel_pending(),
            ParameterUpdate::Transport(status) => {
                if status == TransportStatus::Stopped {
                    let (start, _) = self.reader.loop_bounds();
                    self.reader.seek(start);
                }
                if status == TransportStatus::Playing && previous.transport != TransportStatus::Playing {
                    self.metronome.reset();
                    self.restart_path();
                }
            }
            ParameterUpdate::Volume(_) | ParameterUpdate::OutputMode(_) => {}
        }

        self.emit(EngineEvent::Applied(update));
    }

    fn seek(&mut self, position_ms: f64) {
        let Some(sample_rate) = self.buffer.as_ref().map(|b| b.sample_rate()) else {
            return;
        };
        if self.is_audible() {
            self.capture_tail();
        }
        self.reader.seek(position_ms * sample_rate as f64 / 1000.0);
        self.restart_path();
    }

    fn load(&mut self, buffer: Shared<SampleBuffer>, generation: u64) {
        let frames = buffer.frame_count() as f64;
        let duration_ms = buffer.duration_ms();
        self.buffer = Some(buffer);
        self.generation = generation;

        let loop_range = LoopRange::full(duration_ms);
        self.state.duration_ms = duration_ms;
        self.state.loop_range = loop_range;
        self.state.bpm = 0.0;
        self.state.beat_phase_ms = 0.0;

        // Nothing of the previous track may be heard again
        self.reader.reset(0.0, frames);
        self.declick.clear_tail();
        self.eq.reset();
        self.metronome.reset();
        self.restart_path();

        self.emit(EngineEvent::BufferLoaded { generation, duration_ms });
        self.emit(EngineEvent::Applied(ParameterUpdate::Loop(loop_range)));
        self.emit(EngineEvent::Applied(ParameterUpdate::Tempo {
            bpm: 0.0,
            beat_phase_ms: 0.0,
        }));
    }

    fn unload(&mut self) {
        if self.buffer.take().is_none() {
            return;
        }
        self.state.duration_ms = 0.0;
        self.state.loop_range = LoopRange::default();
        self.state.bpm = 0.0;
        self.state.beat_phase_ms = 0.0;
        self.reader.reset(0.0, 0.0);
        self.declick.clear_tail();
        self.metronome.reset();
        self.restart_path();
        self.emit(EngineEvent::BufferUnloaded);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Path management
    // ─────────────────────────────────────────────────────────────────────

    fn is_audible(&self) -> bool {
        self.buffer.is_some() && self.state.transport == TransportStatus::Playing
    }

    /// Whether moving to `next` would cut the waveform
    fn breaks_continuity(&self, next: &PlaybackState) -> bool {
        if next.transport != TransportStatus::Playing {
            return true;
        }
        if next.is_identity_transform() != self.bypass {
            return true;
        }
        if next.loop_range != self.state.loop_range {
            let (start, end) = self.loop_frames(next.loop_range);
            let position = self.reader.position();
            return position < start || position >= end;
        }
        false
    }

    fn loop_frames(&self, range: LoopRange) -> (f64, f64) {
        match &self.buffer {
            Some(buffer) => (buffer.ms_to_frames(range.a_ms), buffer.ms_to_frames(range.b_ms)),
            None => (0.0, 0.0),
        }
    }

    /// Source frames per reader output frame (sample-rate conversion and pitch)
    fn reader_step(&self) -> f64 {
        match &self.buffer {
            Some(buffer) => buffer.sample_rate() as f64 / self.device_sample_rate as f64 * self.state.pitch_factor(),
            None => 1.0,
        }
    }

    fn configure_path(&mut self) {
        let bypass = self.state.is_identity_transform();
        if bypass != self.bypass {
            self.bypass = bypass;
            if bypass {
                self.reader.snap_to_frame();
            }
            self.restart_path();
        }
        self.stretcher
            .set_ratio(self.state.speed_factor() / self.state.pitch_factor());
    }

    /// Discard stretcher history and fade the next audio in
    fn restart_path(&mut self) {
        self.stretcher.reset();
        self.stretch_acc = 0.0;
        self.declick.start_fade_in();
        self.metronome.cancel_pending();
    }

    /// Render a few milliseconds of the current path without moving the cursor
    fn capture_tail(&mut self) {
        let step = self.reader_step();
        let Some(buffer) = &self.buffer else {
            return;
        };
        let n = self.declick.frames;
        if n == 0 {
            return;
        }
        let data = buffer.frames();
        let mut reader = self.reader.clone();
        let tail = &mut self.declick.tail[..n];

        if self.bypass {
            reader.read_all(data, tail, step);
        } else {
            let want = self.stretch_acc + n as f64 * self.stretcher.ratio();
            self.intermediate
                .set_len_from_capacity((want.floor() as usize).min(MAX_INTERMEDIATE));
            reader.read_all(data, self.intermediate.as_mut_slice(), step);
            self.stretcher.process(self.intermediate.as_slice(), tail);
        }
        self.declick.arm_tail(n);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────

    fn render_block(&mut self, n: usize) {
        self.block.set_len_from_capacity(n);
        self.block.fill_silence();

        let audible = self.is_audible();
        if !audible && !self.declick.has_tail() {
            return;
        }
        if audible {
            self.render_source(n);
        }

        self.declick.apply(self.block.as_mut_slice());
        self.eq.process(self.block.as_mut_slice());
        self.apply_volume();
        self.metronome.render(self.block.as_mut_slice());
    }

    /// Loop read, pitch and stretch into `self.block`; schedules clicks
    fn render_source(&mut self, n: usize) {
        let step = self.reader_step();
        let Some(buffer) = &self.buffer else {
            return;
        };
        let data = buffer.frames();

        let frames_per_ms = buffer.sample_rate() as f64 / 1000.0;
        let clicks = self.state.metronome_enabled && self.state.bpm > 0.0;
        let period = self.state.beat_period_ms().unwrap_or(0.0) * frames_per_ms;
        let phase = self.state.beat_phase_ms * frames_per_ms;

        if self.bypass {
            // The reader stops whenever its segment list fills; consume and go on
            let out = self.block.as_mut_slice();
            let mut done = 0;
            while done < n {
                let read = self.reader.read(data, &mut out[done..], step);
                let offset = done as f64;
                if clicks {
                    for segment in self.reader.segments() {
                        self.metronome.schedule(segment.src_min, segment.src_max, phase, period, |src| {
                            offset + segment.frame_for_source(src)
                        });
                    }
                }
                report_completions(
                    &self.reader,
                    &mut self.events,
                    &mut self.completions_reported,
                    self.state.loop_range,
                );
                done += read;
            }
            return;
        }

        let want = self.stretch_acc + n as f64 * self.stretcher.ratio();
        let in_len = (want.floor() as usize).min(MAX_INTERMEDIATE);
        self.stretch_acc = want - want.floor();

        // Reader frame j of this block comes out at j * n / in_len, delayed
        let scale = if in_len > 0 { n as f64 / in_len as f64 } else { 0.0 };
        let latency = self.stretcher.output_latency() as f64;

        self.intermediate.set_len_from_capacity(in_len);
        let intermediate = self.intermediate.as_mut_slice();
        let mut done = 0;
        while done < in_len {
            let read = self.reader.read(data, &mut intermediate[done..], step);
            let offset = done as f64;
            if clicks {
                for segment in self.reader.segments() {
                    self.metronome.schedule(segment.src_min, segment.src_max, phase, period, |src| {
                        (offset + segment.frame_for_source(src)) * scale + latency
                    });
                }
            }
            report_completions(
                &self.reader,
                &mut self.events,
                &mut self.completions_reported,
                self.state.loop_range,
            );
            done += read;
        }
        self.stretcher
            .process(self.intermediate.as_slice(), self.block.as_mut_slice());
    }

    /// Gain with a per-block ramp when the volume changed
    fn apply_volume(&mut self) {
        let target = self.state.volume;
        let start = self.applied_volume;
        let block = self.block.as_mut_slice();
        if start == target {
            if target != 1.0 {
                for frame in block.iter_mut() {
                    *frame *= target;
                }
            }
            return;
        }
        let len = block.len() as f32;
        for (i, frame) in block.iter_mut().enumerate() {
            *frame *= start + (target - start) * (i + 1) as f32 / len;
        }
        self.applied_volume = target;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reporting
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    fn emit(&mut self, event: EngineEvent) {
        // A full queue means the dispatcher stalled; the event is dropped
        let _ = self.events.push(event);
    }

    fn publish_atomics(&self) {
        let position_ms = match &self.buffer {
            Some(buffer) => buffer.frames_to_ms(self.reader.position()),
            None => 0.0,
        };
        self.atomics.set_position_ms(position_ms);
        self.atomics.set_loop_count(self.completions_reported);
        self.atomics.set_transport(self.state.transport);
        self.atomics.set_loaded(self.buffer.is_some(), self.generation);
    }
}

/// One [`EngineEvent::LoopCompleted`] per wrap of the last reader pass
fn report_completions(
    reader: &LoopReader,
    events: &mut rtrb::Producer<EngineEvent>,
    reported: &mut u64,
    loop_range: LoopRange,
) {
    let total = reader.completions();
    let mut overshoots = reader.segments().iter().filter_map(|s| s.wrap_overshoot);
    while *reported < total {
        *reported += 1;
        let _ = events.push(EngineEvent::LoopCompleted(LoopCompletionEvent {
            count: *reported,
            overshoot_frames: overshoots.next().unwrap_or(0.0),
            loop_range,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, event_channel, gc_handle};
    use crate::state::{OutputMode, DEFAULT_SPEED_PERCENT};
    use crate::timestretch::test_util::{dominant_frequency, sine};

    const SR: u32 = 48000;

    struct Harness {
        engine: RenderEngine,
        commands: rtrb::Producer<EngineCommand>,
        events: rtrb::Consumer<EngineEvent>,
        atomics: Arc<EngineAtomics>,
        seen: Vec<EngineEvent>,
        generation: u64,
        sample_rate: u32,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_rate(SR)
        }

        /// Device and track both at `sample_rate`
        fn with_rate(sample_rate: u32) -> Self {
            let (commands, command_rx) = command_channel();
            let (event_tx, events) = event_channel();
            let atomics = Arc::new(EngineAtomics::new());
            let engine = RenderEngine::new(
                &PracticaConfig::default(),
                sample_rate,
                command_rx,
                event_tx,
                atomics.clone(),
            );
            Self {
                engine,
                commands,
                events,
                atomics,
                seen: Vec::new(),
                generation: 0,
                sample_rate,
            }
        }

        fn set(&mut self, update: ParameterUpdate) {
            self.commands.push(EngineCommand::Set(update)).unwrap();
        }

        fn load(&mut self, frames: Vec<StereoSample>) {
            self.generation += 1;
            let buffer = SampleBuffer::from_frames(frames, self.sample_rate).unwrap();
            self.commands
                .push(EngineCommand::LoadBuffer {
                    buffer: Shared::new(&gc_handle(), buffer),
                    generation: self.generation,
                })
                .unwrap();
        }

        fn play(&mut self) {
            self.set(ParameterUpdate::Transport(TransportStatus::Playing));
        }

        /// Render `frames` frames in device buffers of `block` frames
        fn render(&mut self, frames: usize, block: usize) -> Vec<StereoSample> {
            let mut out = Vec::with_capacity(frames);
            let mut device = vec![0.0f32; block * 2];
            while out.len() < frames {
                let n = block.min(frames - out.len());
                self.engine.process(&mut device[..n * 2], 2);
                out.extend(device[..n * 2].chunks_exact(2).map(|c| StereoSample::new(c[0], c[1])));
                while let Ok(event) = self.events.pop() {
                    self.seen.push(event);
                }
            }
            out
        }

        fn completions(&self) -> Vec<LoopCompletionEvent> {
            self.seen
                .iter()
                .filter_map(|e| match e {
                    EngineEvent::LoopCompleted(c) => Some(*c),
                    _ => None,
                })
                .collect()
        }
    }

    fn ramp(len: usize) -> Vec<StereoSample> {
        (0..len).map(|i| StereoSample::mono(i as f32 / len as f32)).collect()
    }

    fn declick_frames() -> usize {
        (PracticaConfig::default().engine.declick_ms * SR as f64 / 1000.0).round() as usize
    }

    #[test]
    fn test_silence_without_buffer_or_when_not_playing() {
        let mut h = Harness::new();
        h.play();
        assert!(h.render(1024, 256).iter().all(|s| *s == StereoSample::silence()));

        let mut h = Harness::new();
        h.load(vec![StereoSample::mono(0.5); 48000]);
        assert!(h.render(1024, 256).iter().all(|s| *s == StereoSample::silence()));

        h.play();
        h.render(1024, 256);
        h.set(ParameterUpdate::Transport(TransportStatus::Paused));
        let out = h.render(2048, 256);
        // Fade-out tail, then nothing
        assert!(out[declick_frames()..].iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_identity_transform_reproduces_source() {
        let data = sine(440.0, SR, 48000, 0.5);
        let mut h = Harness::new();
        h.load(data.clone());
        h.play();

        let out = h.render(4800, 256);
        for k in declick_frames()..4800 {
            assert_eq!(out[k], data[k], "frame {}", k);
        }
    }

    #[test]
    fn test_identity_restored_after_speed_and_pitch_history() {
        let data = ramp(48000);
        let mut h = Harness::new();
        h.load(data.clone());
        h.play();
        h.render(2048, 256);

        h.set(ParameterUpdate::Speed(150));
        h.set(ParameterUpdate::Pitch(3));
        h.render(9600, 256);

        h.set(ParameterUpdate::Speed(DEFAULT_SPEED_PERCENT));
        h.set(ParameterUpdate::Pitch(0));
        let out = h.render(4096, 256);

        let first = declick_frames();
        let p = data
            .iter()
            .position(|d| *d == out[first])
            .expect("output is a source frame after the path switch");
        for j in 0..2048 {
            assert_eq!(out[first + j], data[p + j], "offset {}", j);
        }
    }

    #[test]
    fn test_cursor_stays_inside_loop() {
        let mut h = Harness::new();
        h.load(ramp(48000));
        h.set(ParameterUpdate::Loop(LoopRange::new(250.0, 750.0)));
        h.play();

        for _ in 0..200 {
            h.render(512, 512);
            let position = h.atomics.position_ms();
            assert!((250.0..750.0).contains(&position), "position {}", position);
        }

        // 102400 frames over a 24000-frame loop
        let completions = h.completions();
        assert_eq!(completions.len(), 4);
        assert_eq!(completions.iter().map(|c| c.count).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(h.atomics.loop_count(), 4);
        assert_eq!(completions[0].loop_range, LoopRange::new(250.0, 750.0));
    }

    #[test]
    fn test_half_speed_doubles_loop_period() {
        let mut h = Harness::new();
        h.load(sine(220.0, SR, 48000, 0.5));
        h.set(ParameterUpdate::Loop(LoopRange::new(0.0, 500.0)));
        h.set(ParameterUpdate::Speed(50));
        h.play();

        let mut wraps_at = Vec::new();
        let mut rendered = 0;
        while rendered < 150_000 {
            let before = h.completions().len();
            h.render(512, 512);
            rendered += 512;
            if h.completions().len() > before {
                wraps_at.push(rendered);
            }
        }

        assert_eq!(wraps_at.len(), 3);
        for pair in wraps_at.windows(2) {
            let period = (pair[1] - pair[0]) as i64;
            assert!((period - 48000).abs() <= 512, "loop period {} frames", period);
        }

        let mut normal = Harness::new();
        normal.load(sine(220.0, SR, 48000, 0.5));
        normal.set(ParameterUpdate::Loop(LoopRange::new(0.0, 500.0)));
        normal.play();
        normal.render(150_000, 512);
        assert_eq!(normal.completions().len(), 6);
    }

    #[test]
    fn test_pitch_scales_frequency_independent_of_speed() {
        for (pitch, speed) in [(12, 100), (7, 150), (-5, 80)] {
            let mut h = Harness::new();
            h.load(sine(440.0, SR, 96000, 0.5));
            h.set(ParameterUpdate::Pitch(pitch));
            h.set(ParameterUpdate::Speed(speed));
            h.play();

            let out = h.render(32768, 512);
            let measured = dominant_frequency(&out[16384..], SR);
            let expected = 440.0 * (pitch as f64 / 12.0).exp2();
            assert!(
                (measured - expected).abs() < expected * 0.02,
                "pitch {} speed {}: expected {:.1}Hz, measured {:.1}Hz",
                pitch,
                speed,
                expected,
                measured
            );
        }
    }

    #[test]
    fn test_speed_preserves_frequency() {
        for speed in [60, 140] {
            let mut h = Harness::new();
            h.load(sine(440.0, SR, 96000, 0.5));
            h.set(ParameterUpdate::Speed(speed));
            h.play();

            let out = h.render(32768, 512);
            let measured = dominant_frequency(&out[16384..], SR);
            assert!((measured - 440.0).abs() < 8.8, "speed {} moved 440Hz to {:.1}", speed, measured);
        }
    }

    #[test]
    fn test_buffer_swap_leaves_no_old_audio() {
        for speed in [DEFAULT_SPEED_PERCENT, 130] {
            let mut h = Harness::new();
            h.load(sine(440.0, SR, 96000, 0.8));
            h.set(ParameterUpdate::Loop(LoopRange::new(100.0, 200.0)));
            h.set(ParameterUpdate::Speed(speed));
            h.play();
            let before = h.render(4800, 256);
            assert!(before.iter().any(|s| s.peak() > 0.5));

            h.load(vec![StereoSample::silence(); 48000]);
            let after = h.render(9600, 256);
            assert!(after.iter().all(|s| s.peak() == 0.0), "speed {}: old audio leaked", speed);

            let loaded = h.seen.iter().position(|e| matches!(e, EngineEvent::BufferLoaded { generation: 2, .. }));
            let loaded = loaded.expect("second load acknowledged");
            assert_eq!(
                h.seen[loaded + 1],
                EngineEvent::Applied(ParameterUpdate::Loop(LoopRange::new(0.0, 1000.0)))
            );
            assert_eq!(h.engine.state().loop_range, LoopRange::full(1000.0));
            assert_eq!(h.engine.state().transport, TransportStatus::Playing);
            assert_eq!(h.atomics.generation(), 2);
        }
    }

    #[test]
    fn test_engine_rejects_loop_outside_loaded_track() {
        let mut h = Harness::new();
        h.load(ramp(48000));
        h.render(256, 256);
        h.seen.clear();

        h.set(ParameterUpdate::Loop(LoopRange::new(0.0, 5000.0)));
        h.set(ParameterUpdate::Loop(LoopRange::new(600.0, 300.0)));
        h.render(256, 256);

        assert!(h.seen.is_empty());
        assert_eq!(h.engine.state().loop_range, LoopRange::full(1000.0));
    }

    #[test]
    fn test_unchanged_values_are_not_acknowledged() {
        let mut h = Harness::new();
        h.set(ParameterUpdate::Speed(DEFAULT_SPEED_PERCENT));
        h.set(ParameterUpdate::Volume(0.5));
        h.set(ParameterUpdate::OutputMode(OutputMode::Stereo));
        h.render(256, 256);
        assert_eq!(h.seen, vec![EngineEvent::Applied(ParameterUpdate::Volume(0.5))]);
    }

    #[test]
    fn test_metronome_clicks_are_sample_accurate_for_any_block_size() {
        for block in [64, 100, 480, 512, 1000] {
            let mut h = Harness::new();
            h.load(vec![StereoSample::silence(); 192_000]);
            h.set(ParameterUpdate::Tempo {
                bpm: 120.0,
                beat_phase_ms: 0.0,
            });
            h.set(ParameterUpdate::Metronome(true));
            h.play();

            let out = h.render(96_000, block);
            for idx in [0, 24_000, 48_000, 72_000] {
                assert!((out[idx].left - 0.5).abs() < 1e-6, "block {}: no click at {}", block, idx);
                if idx > 0 {
                    assert_eq!(out[idx - 1], StereoSample::silence(), "block {}: early click at {}", block, idx);
                }
            }
        }
    }

    #[test]
    fn test_short_loop_keeps_every_click_with_large_device_buffers() {
        // 50 ms loop at 8 kHz: an 8192-frame buffer wraps 20 times
        const RATE: u32 = 8000;
        let render = |block: usize| {
            let mut h = Harness::with_rate(RATE);
            h.load(vec![StereoSample::silence(); RATE as usize]);
            h.set(ParameterUpdate::Loop(LoopRange::new(0.0, 50.0)));
            h.set(ParameterUpdate::Tempo {
                bpm: 400.0,
                beat_phase_ms: 0.0,
            });
            h.set(ParameterUpdate::Metronome(true));
            h.play();
            let out = h.render(16_384, block);
            (out, h.completions())
        };

        let (small, small_completions) = render(256);
        let (large, large_completions) = render(8192);

        assert_eq!(large_completions.len(), 40);
        assert_eq!(large_completions, small_completions);
        // One click at the start of every pass
        for pass in 0..40 {
            let idx = pass * 400;
            assert!((large[idx].left - 0.5).abs() < 1e-6, "no click at {}", idx);
        }
        for (i, (a, b)) in small.iter().zip(&large).enumerate() {
            assert!((a.left - b.left).abs() < 1e-5, "frame {}: {} vs {}", i, a.left, b.left);
        }
    }

    #[test]
    fn test_metronome_follows_stretched_timeline() {
        let mut h = Harness::new();
        h.load(vec![StereoSample::silence(); 192_000]);
        h.set(ParameterUpdate::Tempo {
            bpm: 120.0,
            beat_phase_ms: 0.0,
        });
        h.set(ParameterUpdate::Metronome(true));
        h.set(ParameterUpdate::Speed(50));
        h.play();

        let out = h.render(200_000, 512);
        let onsets: Vec<usize> = (16..out.len())
            .filter(|&i| out[i].left != 0.0 && out[i - 16..i].iter().all(|s| s.left == 0.0))
            .collect();
        assert!(onsets.len() >= 3, "onsets {:?}", onsets);
        for pair in onsets.windows(2) {
            let spacing = (pair[1] - pair[0]) as i64;
            assert!((spacing - 48_000).abs() <= 2, "click spacing {}", spacing);
        }
    }

    #[test]
    fn test_stop_rewinds_to_loop_start_and_pause_keeps_position() {
        let mut h = Harness::new();
        h.load(ramp(96_000));
        h.set(ParameterUpdate::Loop(LoopRange::new(500.0, 1500.0)));
        h.play();
        h.render(4800, 480);

        h.set(ParameterUpdate::Transport(TransportStatus::Paused));
        h.render(480, 480);
        let paused_at = h.atomics.position_ms();
        assert!((paused_at - 600.0).abs() < 1e-6, "paused at {}", paused_at);

        h.set(ParameterUpdate::Transport(TransportStatus::Stopped));
        h.render(480, 480);
        assert_eq!(h.atomics.position_ms(), 500.0);
        assert_eq!(h.atomics.transport(), TransportStatus::Stopped);
    }

    #[test]
    fn test_seek_is_clamped_into_loop() {
        let mut h = Harness::new();
        h.load(ramp(96_000));
        h.set(ParameterUpdate::Loop(LoopRange::new(500.0, 1500.0)));
        h.commands.push(EngineCommand::Seek { position_ms: 1000.0 }).unwrap();
        h.render(64, 64);
        assert_eq!(h.atomics.position_ms(), 1000.0);

        h.commands.push(EngineCommand::Seek { position_ms: 1800.0 }).unwrap();
        h.render(64, 64);
        assert_eq!(h.atomics.position_ms(), 500.0);
    }

    #[test]
    fn test_large_device_buffers_are_split() {
        let data = sine(440.0, SR, 48000, 0.5);
        let mut h = Harness::new();
        h.load(data.clone());
        h.play();

        let out = h.render(20_000, 20_000);
        for k in declick_frames()..20_000 {
            assert_eq!(out[k], data[k]);
        }
    }
}
