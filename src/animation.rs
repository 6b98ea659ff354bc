//! Frame-driven animation primitives
//!
//! Every animation is a small state machine that the frame loop ticks once
//! per frame until it reports [`Status::Finished`].

use std::time::{Duration, Instant};

/// Frames a frame-stepped animation aims to take
pub const TARGET_FRAMES: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Finished,
}

impl Status {
    pub fn is_finished(self) -> bool {
        self == Status::Finished
    }
}

/// Visible sub-range of a sampled geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DrawRange {
    pub start: usize,
    pub count: usize,
}

impl DrawRange {
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    pub const fn full(total: usize) -> Self {
        Self { start: 0, count: total }
    }

    /// Index range clamped to `total` elements.
    pub fn indices(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.start.min(total);
        let end = self.start.saturating_add(self.count).min(total);
        start..end
    }
}

/// Progress in [0, 1] of a fixed-duration animation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timeline {
    start: Instant,
    duration: Duration,
}

impl Timeline {
    pub fn new(start: Instant, duration: Duration) -> Self {
        Self { start, duration }
    }

    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Per-frame increment that covers `total` in roughly [`TARGET_FRAMES`] frames.
pub fn frame_step(total: usize) -> usize {
    ((total as f32 / TARGET_FRAMES as f32).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_progress_is_clamped() {
        let start = Instant::now();
        let line = Timeline::new(start, Duration::from_millis(500));
        assert_eq!(line.progress(start), 0.0);
        assert!((line.progress(start + Duration::from_millis(250)) - 0.5).abs() < 1e-3);
        assert_eq!(line.progress(start + Duration::from_secs(3)), 1.0);
        assert!(line.is_complete(start + Duration::from_millis(500)));
    }

    #[test]
    fn timeline_before_start_is_zero() {
        let now = Instant::now();
        let line = Timeline::new(now + Duration::from_secs(1), Duration::from_millis(100));
        assert_eq!(line.progress(now), 0.0);
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let now = Instant::now();
        assert_eq!(Timeline::new(now, Duration::ZERO).progress(now), 1.0);
    }

    #[test]
    fn frame_step_never_stalls() {
        assert_eq!(frame_step(0), 1);
        assert_eq!(frame_step(10), 1);
        assert_eq!(frame_step(120), 2);
        assert_eq!(frame_step(3072), 51);
    }

    #[test]
    fn draw_range_clamps() {
        assert_eq!(DrawRange::new(2, 5).indices(10), 2..7);
        assert_eq!(DrawRange::new(8, 5).indices(10), 8..10);
        assert_eq!(DrawRange::new(12, 5).indices(10), 10..10);
        assert_eq!(DrawRange::full(4).indices(4), 0..4);
    }
}
