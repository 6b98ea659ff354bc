//! Orthographic orbit camera around the globe

use crate::geo::{normalize_longitude, shortest_angular_delta, to_cartesian, GeoCoordinate};
use glam::{Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};

const MIN_ZOOM: f32 = 0.3;
const MAX_ZOOM: f32 = 4.0;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
/// Radians per second while auto-rotating
const AUTO_ROTATE_SPEED: f32 = 0.15;
/// Share of the remaining pan covered per second, exponentially
const PAN_RATE: f32 = 6.0;
/// Pans closer than this many radians snap to the target
const PAN_EPSILON: f32 = 1e-3;

/// Screen position in dots plus depth toward the viewer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    pub x: i32,
    pub y: i32,
    pub depth: f32,
}

#[derive(Clone, Debug)]
pub struct Camera {
    yaw: f32,
    pitch: f32,
    zoom: f32,
    auto_rotate: bool,
    home: (f32, f32),
    /// Yaw and pitch being panned towards
    target: Option<(f32, f32)>,
}

/// Yaw and pitch that put `coord` in the middle of the view
fn angles_for(coord: GeoCoordinate) -> (f32, f32) {
    let v = to_cartesian(coord);
    let yaw = (-v.x).atan2(v.z);
    let pitch = v.y.atan2(v.x.hypot(v.z)).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    (yaw, pitch)
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.35,
            zoom: 1.0,
            auto_rotate: true,
            home: (0.0, 0.35),
            target: None,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Centre `coord` and make it the reset position.
    pub fn look_at(&mut self, coord: GeoCoordinate) {
        (self.yaw, self.pitch) = angles_for(coord);
        self.home = (self.yaw, self.pitch);
        self.target = None;
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_x(self.pitch) * Quat::from_rotation_y(self.yaw)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn is_auto_rotating(&self) -> bool {
        self.auto_rotate
    }

    /// Manual rotation; cancels any pan in progress.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.target = None;
        self.turn(yaw, pitch);
    }

    fn turn(&mut self, yaw: f32, pitch: f32) {
        self.yaw = (self.yaw + yaw).rem_euclid(TAU);
        self.pitch = (self.pitch + pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Pan back to the home view at normal zoom.
    pub fn reset(&mut self) {
        self.target = Some(self.home);
        self.zoom = 1.0;
    }

    pub fn toggle_auto_rotate(&mut self) {
        self.auto_rotate = !self.auto_rotate;
    }

    /// Advance a pending pan, or auto-rotation, by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let Some((yaw, pitch)) = self.target else {
            if self.auto_rotate {
                self.turn(AUTO_ROTATE_SPEED * dt, 0.0);
            }
            return;
        };

        let d_yaw = shortest_angular_delta(
            normalize_longitude(self.yaw.to_degrees()),
            normalize_longitude(yaw.to_degrees()),
        )
        .to_radians();
        let d_pitch = pitch - self.pitch;
        if d_yaw.abs() < PAN_EPSILON && d_pitch.abs() < PAN_EPSILON {
            self.yaw = yaw.rem_euclid(TAU);
            self.pitch = pitch;
            self.target = None;
            return;
        }
        let k = 1.0 - (-PAN_RATE * dt).exp();
        self.turn(d_yaw * k, d_pitch * k);
    }

    pub fn viewport(&self, width_dots: usize, height_dots: usize) -> Viewport {
        let rotation = self.rotation();
        Viewport {
            rotation,
            center_x: width_dots as f32 / 2.0,
            center_y: height_dots as f32 / 2.0,
            radius: width_dots.min(height_dots) as f32 * 0.4 * self.zoom,
        }
    }
}

/// Camera frozen for one frame at a canvas size
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    rotation: Quat,
    center_x: f32,
    center_y: f32,
    /// Dots per unit of world space
    radius: f32,
}

impl Viewport {
    pub fn to_view(&self, p: Vec3) -> Vec3 {
        self.rotation * p
    }

    /// Project `p` unless the globe hides it.
    pub fn project(&self, p: Vec3) -> Option<Projected> {
        let v = self.to_view(p);
        if !is_visible(v) {
            return None;
        }
        Some(self.project_view(v))
    }

    pub fn project_view(&self, v: Vec3) -> Projected {
        Projected {
            x: (self.center_x + v.x * self.radius).round() as i32,
            y: (self.center_y - v.y * self.radius).round() as i32,
            depth: v.z,
        }
    }
}

/// Front hemisphere, or outside the unit silhouette
pub fn is_visible(view: Vec3) -> bool {
    view.z >= 0.0 || view.x * view.x + view.y * view.y > 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_centres_coordinate() {
        for coord in [
            GeoCoordinate::new(0.0, 0.0),
            GeoCoordinate::new(51.5, -0.1),
            GeoCoordinate::new(-33.9, 151.2),
            GeoCoordinate::new(60.0, -150.0),
        ] {
            let mut camera = Camera::new();
            camera.look_at(coord);
            let v = camera.rotation() * to_cartesian(coord);
            assert!(v.x.abs() < 1e-4, "{coord:?} -> {v:?}");
            assert!(v.y.abs() < 1e-4, "{coord:?} -> {v:?}");
            assert!((v.z - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn far_side_is_hidden_unless_outside_silhouette() {
        let mut camera = Camera::new();
        camera.look_at(GeoCoordinate::new(0.0, 0.0));
        let front = to_cartesian(GeoCoordinate::new(0.0, 0.0));
        assert!(is_visible(camera.rotation() * front));
        assert!(!is_visible(camera.rotation() * -front));
        // Far-side point high above the limb
        let lifted = to_cartesian(GeoCoordinate::new(0.0, 100.0)) * 1.4;
        assert!(is_visible(camera.rotation() * lifted));
    }

    #[test]
    fn viewport_maps_centre_and_up() {
        let mut camera = Camera::new();
        camera.look_at(GeoCoordinate::new(0.0, 0.0));
        let viewport = camera.viewport(100, 80);
        let centre = viewport.project(to_cartesian(GeoCoordinate::new(0.0, 0.0))).unwrap();
        assert_eq!((centre.x, centre.y), (50, 40));
        let north = viewport.project(to_cartesian(GeoCoordinate::new(30.0, 0.0))).unwrap();
        assert!(north.y < centre.y);
        assert_eq!(viewport.radius, 32.0);
    }

    #[test]
    fn zoom_and_pitch_are_clamped() {
        let mut camera = Camera::new();
        camera.zoom_by(100.0);
        assert_eq!(camera.zoom(), MAX_ZOOM);
        camera.rotate(0.0, 10.0);
        assert!(camera.pitch <= PITCH_LIMIT);
        camera.reset();
        assert_eq!(camera.zoom(), 1.0);
        assert!(camera.target.is_some());
    }

    #[test]
    fn auto_rotation_can_be_toggled() {
        let mut camera = Camera::new();
        let yaw = camera.yaw;
        camera.update(1.0);
        assert!(camera.yaw > yaw);
        camera.toggle_auto_rotate();
        let yaw = camera.yaw;
        camera.update(1.0);
        assert_eq!(camera.yaw, yaw);
    }

    #[test]
    fn reset_pans_home_the_short_way() {
        let mut camera = Camera::new();
        camera.home = (-3.1, 0.35);
        camera.yaw = 3.1;
        camera.pitch = 0.35;
        camera.reset();

        // Across the seam: 0.08 rad forward, not 6.2 back
        camera.update(1.0 / 30.0);
        assert!(camera.yaw > 3.1 && camera.yaw < 3.2, "{}", camera.yaw);

        for _ in 0..300 {
            camera.update(1.0 / 30.0);
        }
        assert!(camera.target.is_none());
        assert!((camera.yaw - (-3.1f32).rem_euclid(TAU)).abs() < 1e-3);
    }

    #[test]
    fn manual_rotation_cancels_pan() {
        let mut camera = Camera::new();
        camera.rotate(1.0, 0.0);
        camera.reset();
        camera.rotate(0.1, 0.0);
        assert!(camera.target.is_none());
    }

    #[test]
    fn auto_rotation_waits_for_pan() {
        let mut camera = Camera::new();
        camera.look_at(GeoCoordinate::new(0.0, 0.0));
        camera.reset();
        let yaw = camera.yaw;
        camera.update(1.0);
        // Already on target: the pan snaps and ends instead of rotating
        assert!((camera.yaw - yaw.rem_euclid(TAU)).abs() < 1e-6);
        assert!(camera.target.is_none());
    }
}
