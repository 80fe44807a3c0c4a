//! Frame timing.

use std::time::{Duration, Instant};

/// Tracks time between frames; `delta_secs` drives animation and the
/// renderer's accumulated time push constant.
#[derive(Debug)]
pub struct Timer {
    last_tick: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
        }
    }

    /// Time since the previous `tick`, advancing the tick point.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_positive_and_restarts() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(1));
        let first = timer.delta_secs();
        assert!(first > 0.0);
        // Tick point advanced, so the next delta is its own interval.
        assert!(timer.delta_secs() >= 0.0);
    }
}
