//! Peer beacon: a radial stalk with a marker on top

use crate::animation::{frame_step, DrawRange, Status};
use glam::Vec3;

/// Samples along the stalk; the draw range counts these
pub const BEACON_SAMPLES: usize = 120;
pub const DEFAULT_BEACON_HEIGHT: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BeaconPhase {
    /// Constructed and fully drawn, not animating
    Idle,
    FadingIn,
    Shown,
    FadingOut,
    Gone,
}

pub struct Beacon {
    points: Vec<Vec3>,
    tip: Vec3,
    tip_visible: bool,
    draw_range: DrawRange,
    t: usize,
    step: usize,
    phase: BeaconPhase,
}

impl Beacon {
    /// Stalk from `position` straight out along its normal by `height`.
    pub fn new(position: Vec3, height: f32) -> Self {
        let tip = position + position.normalize_or_zero() * height;
        let last = (BEACON_SAMPLES - 1) as f32;
        let points = (0..BEACON_SAMPLES)
            .map(|i| position.lerp(tip, i as f32 / last))
            .collect();

        Self {
            points,
            tip,
            tip_visible: true,
            draw_range: DrawRange::full(BEACON_SAMPLES),
            t: 0,
            step: frame_step(BEACON_SAMPLES),
            phase: BeaconPhase::Idle,
        }
    }

    pub fn fade_in(&mut self) {
        self.tip_visible = false;
        self.t = 0;
        self.draw_range = DrawRange::new(0, 0);
        self.phase = BeaconPhase::FadingIn;
    }

    /// Retract from the base up. Resumes from a fully drawn stalk.
    pub fn fade_out(&mut self) {
        if self.is_retiring() {
            return;
        }
        self.tip_visible = false;
        self.t = self.len();
        self.phase = BeaconPhase::FadingOut;
    }

    /// Advance one frame.
    pub fn tick(&mut self) -> Status {
        let len = self.len();
        match self.phase {
            BeaconPhase::FadingIn => {
                self.t += self.step;
                if self.t < len {
                    self.draw_range = DrawRange::new(0, self.t);
                    Status::Running
                } else {
                    self.draw_range = DrawRange::full(len);
                    self.tip_visible = true;
                    self.phase = BeaconPhase::Shown;
                    Status::Finished
                }
            }
            BeaconPhase::FadingOut => {
                self.t += self.step;
                if self.t < len * 2 {
                    let offset = self.t - len;
                    self.draw_range = DrawRange::new(offset, len - offset);
                    Status::Running
                } else {
                    self.draw_range = DrawRange::new(len, 0);
                    self.phase = BeaconPhase::Gone;
                    Status::Finished
                }
            }
            BeaconPhase::Idle | BeaconPhase::Shown | BeaconPhase::Gone => Status::Finished,
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_gone(&self) -> bool {
        self.phase == BeaconPhase::Gone
    }

    /// Fading out or already gone
    pub fn is_retiring(&self) -> bool {
        matches!(self.phase, BeaconPhase::FadingOut | BeaconPhase::Gone)
    }

    /// Stalk samples inside the current draw range
    pub fn visible_points(&self) -> &[Vec3] {
        &self.points[self.draw_range.indices(self.points.len())]
    }

    pub fn tip(&self) -> Option<Vec3> {
        self.tip_visible.then_some(self.tip)
    }

}
