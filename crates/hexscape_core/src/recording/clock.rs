//! Render clock control.
//!
//! While recording, every tick advances time by exactly `1 / fps` so the
//! video's nominal duration matches its frame count however slowly frames
//! are actually rendered.

use std::time::Duration;

use bevy::time::TimeUpdateStrategy;

/// A clock the recording pipeline can switch between real time and a fixed
/// per-tick delta.
pub trait SessionClock {
    fn set_fixed_step(&mut self, step: Duration);

    fn set_realtime(&mut self);

    /// Current fixed delta, `None` in real-time mode.
    fn fixed_step(&self) -> Option<Duration>;
}

/// Per-tick delta for `fps` frames per second.
pub fn frame_step(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}

impl SessionClock for TimeUpdateStrategy {
    fn set_fixed_step(&mut self, step: Duration) {
        *self = TimeUpdateStrategy::ManualDuration(step);
    }

    fn set_realtime(&mut self) {
        *self = TimeUpdateStrategy::Automatic;
    }

    fn fixed_step(&self) -> Option<Duration> {
        match self {
            TimeUpdateStrategy::ManualDuration(step) => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_step_at_sixty() {
        let step = frame_step(60);
        assert!((step.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(frame_step(0), Duration::from_secs(1));
    }

    #[test]
    fn test_time_update_strategy_switches_modes() {
        let mut clock = TimeUpdateStrategy::default();
        assert_eq!(clock.fixed_step(), None);

        clock.set_fixed_step(frame_step(60));
        assert_eq!(clock.fixed_step(), Some(frame_step(60)));

        clock.set_realtime();
        assert_eq!(clock.fixed_step(), None);
    }
}
