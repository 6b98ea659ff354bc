//! Packet trace: an elevated cubic Bézier arc between two surface points

use crate::animation::{DrawRange, Status, Timeline};
use crate::geo::midpoint;
use glam::Vec3;
use std::time::{Duration, Instant};

pub const TRACE_DIVISIONS: usize = 256;
pub const DEFAULT_TRACE_DURATION: Duration = Duration::from_millis(500);
/// Control point lift above the sphere
const ARC_LIFT: f32 = 1.4;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Fade {
    None,
    In(Timeline),
    Out(Timeline),
}

pub struct Trace {
    points: Vec<Vec3>,
    draw_range: DrawRange,
    fade: Fade,
}

fn cubic_bezier(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

impl Trace {
    pub fn new(from: Vec3, to: Vec3) -> Self {
        Self::with_divisions(from, to, TRACE_DIVISIONS)
    }

    pub fn with_divisions(from: Vec3, to: Vec3, divisions: usize) -> Self {
        let divisions = divisions.max(1);
        let mid = midpoint(from, to);
        let c1 = midpoint(from, mid) * ARC_LIFT;
        let c2 = midpoint(mid, to) * ARC_LIFT;

        let points: Vec<Vec3> = (0..=divisions)
            .map(|i| cubic_bezier(from, c1, c2, to, i as f32 / divisions as f32))
            .collect();
        let draw_range = DrawRange::full(points.len());

        Self {
            points,
            draw_range,
            fade: Fade::None,
        }
    }

    pub fn fade_in(&mut self, now: Instant, duration: Duration) {
        self.fade = Fade::In(Timeline::new(now, duration));
    }

    pub fn fade_out(&mut self, now: Instant, duration: Duration) {
        self.fade = Fade::Out(Timeline::new(now, duration));
    }

    /// Update the draw range for `now`.
    pub fn tick(&mut self, now: Instant) -> Status {
        let total = self.points.len();
        let timeline = match self.fade {
            Fade::None => return Status::Finished,
            Fade::In(timeline) => {
                let progress = timeline.progress(now);
                let count = ((total as f32 * progress).floor() as usize).clamp(1, total);
                self.draw_range = DrawRange::new(0, count);
                timeline
            }
            Fade::Out(timeline) => {
                let progress = timeline.progress(now);
                let visible = ((total as f32 * (1.0 - progress)).floor() as usize).min(total);
                if visible > 0 {
                    self.draw_range = DrawRange::new(0, visible);
                }
                timeline
            }
        };

        if timeline.is_complete(now) {
            self.fade = Fade::None;
            Status::Finished
        } else {
            Status::Running
        }
    }

    pub fn visible_points(&self) -> &[Vec3] {
        &self.points[self.draw_range.indices(self.points.len())]
    }

    /// Leading point of the visible part, used for the head glyph
    pub fn head(&self) -> Option<Vec3> {
        self.visible_points().last().copied()
    }
}
