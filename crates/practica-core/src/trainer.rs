//! Speed trainer: stepped speed increase tied to loop repetitions
//!
//! Counts completed loop passes and, every `step_every_n_loops` of them,
//! requests `min(speed + step_percent, max_speed)` through the
//! [`ParameterChannel`]. Reaching the ceiling switches the trainer off; a new
//! loop range or a new track starts the count over. The ceiling never exceeds
//! [`MAX_SPEED_PERCENT`].

use crate::config::SpeedTrainerConfig;
use crate::state::{ParameterChannel, StateEvent, MAX_SPEED_PERCENT};

pub struct SpeedTrainer {
    config: SpeedTrainerConfig,
    /// Completions since the last step (or reset)
    completions: u32,
}

impl SpeedTrainer {
    pub fn new(config: SpeedTrainerConfig) -> Self {
        Self {
            config: Self::clamped(config),
            completions: 0,
        }
    }

    /// Caps `max_speed` at the playable range
    fn clamped(mut config: SpeedTrainerConfig) -> SpeedTrainerConfig {
        if config.max_speed > MAX_SPEED_PERCENT {
            log::warn!(
                "SpeedTrainer: max speed {}% above {}%, clamping",
                config.max_speed,
                MAX_SPEED_PERCENT
            );
            config.max_speed = MAX_SPEED_PERCENT;
        }
        config
    }

    pub fn config(&self) -> &SpeedTrainerConfig {
        &self.config
    }

    /// Replace the ramp settings; the completion count starts over
    pub fn configure(&mut self, config: SpeedTrainerConfig) {
        self.config = Self::clamped(config);
        self.completions = 0;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.config.enabled {
            log::info!("SpeedTrainer {}", if enabled { "enabled" } else { "disabled" });
        }
        self.config.enabled = enabled;
        self.completions = 0;
    }

    /// Flip enabled state, returning the new one
    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.config.enabled);
        self.config.enabled
    }

    pub fn completions(&self) -> u32 {
        self.completions
    }

    pub fn reset(&mut self) {
        self.completions = 0;
    }

    /// React to one committed state event
    ///
    /// Returns the speed requested when this event triggered a step.
    pub fn on_event(&mut self, event: &StateEvent, channel: &ParameterChannel) -> Option<u32> {
        match event {
            StateEvent::LoopChanged(_) | StateEvent::BufferLoaded { .. } | StateEvent::BufferUnloaded => {
                self.reset();
                None
            }
            StateEvent::LoopCompleted(_) => self.on_loop_completed(channel),
            _ => None,
        }
    }

    fn on_loop_completed(&mut self, channel: &ParameterChannel) -> Option<u32> {
        if !self.config.enabled {
            return None;
        }
        self.completions += 1;
        if self.completions < self.config.step_every_n_loops.max(1) {
            return None;
        }
        self.completions = 0;

        let current = channel.pending_state().speed_percent;
        if current >= self.config.max_speed {
            self.set_enabled(false);
            return None;
        }
        let target = current.saturating_add(self.config.step_percent).min(self.config.max_speed);
        if let Err(e) = channel.set_speed(target) {
            log::warn!("SpeedTrainer: speed request {}% rejected: {}", target, e);
            return None;
        }
        log::debug!("SpeedTrainer: speed {}% -> {}%", current, target);

        if target >= self.config.max_speed {
            log::info!("SpeedTrainer reached {}%", self.config.max_speed);
            self.set_enabled(false);
        }
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, LoopCompletionEvent};
    use crate::state::{LoopPosition, LoopRange, PlaybackState};

    fn channel() -> ParameterChannel {
        let (tx, _rx) = command_channel();
        ParameterChannel::new(
            tx,
            PlaybackState {
                duration_ms: 10_000.0,
                loop_range: LoopRange::full(10_000.0),
                ..Default::default()
            },
        )
    }

    fn completed(count: u64) -> StateEvent {
        StateEvent::LoopCompleted(LoopCompletionEvent {
            count,
            overshoot_frames: 0.0,
            loop_range: LoopRange::full(10_000.0),
        })
    }

    fn trainer(every: u32, step: u32, max: u32) -> SpeedTrainer {
        SpeedTrainer::new(SpeedTrainerConfig {
            enabled: true,
            step_every_n_loops: every,
            step_percent: step,
            max_speed: max,
        })
    }

    #[test]
    fn test_steps_every_n_loops_until_max() {
        let channel = channel();
        let mut trainer = trainer(3, 5, 150);

        let mut speeds = Vec::new();
        for n in 1..=9 {
            trainer.on_event(&completed(n), &channel);
            if n % 3 == 0 {
                speeds.push(channel.pending_state().speed_percent);
            }
        }
        assert_eq!(speeds, vec![105, 110, 115]);

        for n in 10..=100 {
            trainer.on_event(&completed(n), &channel);
        }
        assert_eq!(channel.pending_state().speed_percent, 150);
        assert!(!trainer.is_enabled());
    }

    #[test]
    fn test_last_step_is_capped() {
        let channel = channel();
        channel.set_speed(148).unwrap();
        let mut trainer = trainer(1, 5, 150);

        assert_eq!(trainer.on_event(&completed(1), &channel), Some(150));
        assert!(!trainer.is_enabled());
        assert_eq!(trainer.on_event(&completed(2), &channel), None);
    }

    #[test]
    fn test_ceiling_above_playable_range_still_finishes() {
        let channel = channel();
        channel.set_speed(190).unwrap();
        let mut trainer = trainer(1, 5, 250);
        assert_eq!(trainer.config().max_speed, MAX_SPEED_PERCENT);

        assert_eq!(trainer.on_event(&completed(1), &channel), Some(195));
        assert_eq!(trainer.on_event(&completed(2), &channel), Some(200));
        assert!(!trainer.is_enabled());
        assert_eq!(trainer.on_event(&completed(3), &channel), None);
        assert_eq!(channel.pending_state().speed_percent, 200);

        trainer.configure(SpeedTrainerConfig {
            enabled: true,
            step_every_n_loops: 1,
            step_percent: 5,
            max_speed: 400,
        });
        assert_eq!(trainer.config().max_speed, MAX_SPEED_PERCENT);
        assert_eq!(trainer.on_event(&completed(4), &channel), None);
        assert!(!trainer.is_enabled());
    }

    #[test]
    fn test_loop_change_restarts_count() {
        let channel = channel();
        let mut trainer = trainer(3, 5, 150);

        trainer.on_event(&completed(1), &channel);
        trainer.on_event(&completed(2), &channel);
        trainer.on_event(
            &StateEvent::LoopChanged(LoopPosition::new(LoopRange::new(0.0, 5000.0), 10_000.0)),
            &channel,
        );
        trainer.on_event(&completed(3), &channel);
        assert_eq!(channel.pending_state().speed_percent, 100);
        assert_eq!(trainer.completions(), 1);
    }

    #[test]
    fn test_disabled_trainer_ignores_completions() {
        let channel = channel();
        let mut trainer = SpeedTrainer::new(SpeedTrainerConfig::default());
        assert!(!trainer.is_enabled());
        for n in 1..=20 {
            assert_eq!(trainer.on_event(&completed(n), &channel), None);
        }
        assert_eq!(channel.pending_state().speed_percent, 100);

        assert!(trainer.toggle());
        assert!(trainer.is_enabled());
    }
}
