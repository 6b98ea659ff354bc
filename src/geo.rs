//! Geographic coordinate helpers
//!
//! Latitude/longitude are in degrees. Cartesian positions live on the unit
//! sphere with +Y through the north pole.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A point on the globe in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub lat: f32,
    pub lon: f32,
}

impl GeoCoordinate {
    pub const fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }

    /// Finite and inside [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }
}

/// Project a coordinate onto the unit sphere.
pub fn to_cartesian(coord: GeoCoordinate) -> Vec3 {
    let phi = (90.0 - coord.lat).to_radians();
    let theta = (coord.lon + 180.0).to_radians();

    let x = -(phi.sin() * theta.cos());
    let z = phi.sin() * theta.sin();
    let y = phi.cos();

    Vec3::new(x, y, z)
}

/// Inverse of [`to_cartesian`]. The vector does not need to be unit length.
pub fn to_lat_lon(v: Vec3) -> GeoCoordinate {
    let v = v.normalize_or_zero();
    let phi = v.y.clamp(-1.0, 1.0).acos();
    let theta = v.z.atan2(-v.x);

    GeoCoordinate {
        lat: 90.0 - phi.to_degrees(),
        lon: normalize_longitude(theta.to_degrees() - 180.0),
    }
}

/// Great-circle midpoint of two unit vectors.
///
/// Antipodal inputs have no unique midpoint; any unit vector orthogonal to
/// `start` is returned instead.
pub fn midpoint(start: Vec3, end: Vec3) -> Vec3 {
    let mid = ((start + end) / 2.0).normalize_or_zero();
    if mid == Vec3::ZERO {
        start.any_orthonormal_vector()
    } else {
        mid
    }
}

/// Angle in radians between two directions.
pub fn great_circle_angle(a: Vec3, b: Vec3) -> f32 {
    a.normalize_or_zero()
        .dot(b.normalize_or_zero())
        .clamp(-1.0, 1.0)
        .acos()
}

/// Shortest signed delta from `from` to `to` in degrees, in range [-180, 180].
pub fn shortest_angular_delta(from: f32, to: f32) -> f32 {
    let mut delta = to - from;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    delta
}

/// Wrap a longitude into [-180, 180].
pub fn normalize_longitude(lon: f32) -> f32 {
    let normalized = lon.rem_euclid(360.0);
    if normalized > 180.0 {
        normalized - 360.0
    } else {
        normalized
    }
}
