// SPDX-License-Identifier: GPL-3.0-only

use std::time::{Duration, Instant};

/// Frame rate measured over fixed windows
///
/// The value only changes once a window of at least `window` has passed, so
/// the overlay does not flicker every frame.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: Duration,
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, start: Instant) -> Self {
        Self {
            window,
            window_start: start,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame now
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Count one frame at `now`, returning the current rate
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window {
            self.fps = self.frames as f64 / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_value_before_first_window() {
        let start = Instant::now();
        let mut counter = FpsCounter::starting_at(Duration::from_secs(1), start);
        for i in 0..10 {
            counter.tick_at(start + Duration::from_millis(i * 50));
        }
        assert_eq!(counter.fps(), 0.0);
    }

    #[test]
    fn test_rate_over_window() {
        let start = Instant::now();
        let mut counter = FpsCounter::starting_at(Duration::from_secs(1), start);
        for i in 1..=30 {
            counter.tick_at(start + Duration::from_millis(i * 1000 / 30));
        }
        assert!((counter.fps() - 30.0).abs() < 0.5, "fps was {}", counter.fps());
    }
}
