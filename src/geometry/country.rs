//! Extruded country prism: side walls plus a triangulated cap

use super::triangulate::triangulate;
use crate::colors::Rgb;
use crate::geo::{self, GeoCoordinate};
use crate::land::{Country, Position};
use glam::{Vec2, Vec3};
use rand::Rng;

/// Radius of the cap, matching the globe's land extrusion
pub const CAP_RADIUS: f32 = 1.05;

/// Triangle soup, three vertices per triangle
pub struct CountryMesh {
    pub code: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub color: Rgb,
}

impl CountryMesh {
    pub fn new<R: Rng>(country: &Country, rng: &mut R) -> Self {
        let mut positions = Vec::new();

        for ring in country.rings() {
            for pair in ring.windows(2) {
                let current = to_point(pair[0]);
                let next = to_point(pair[1]);
                positions.extend_from_slice(&[
                    current * CAP_RADIUS,
                    current,
                    next * CAP_RADIUS,
                    current,
                    next,
                    next * CAP_RADIUS,
                ]);
            }
        }

        // Holes only get walls
        for outer in country.polygons.iter().filter_map(|rings| rings.first()) {
            let coords: Vec<Vec3> = outer.iter().map(|&p| to_point(p) * CAP_RADIUS).collect();
            let projected = project_to_plane(&coords);
            positions.extend(triangulate(&projected).into_iter().map(|i| coords[i]));
        }

        let normals = positions.iter().map(|p| p.normalize_or_zero()).collect();
        let color = Rgb::new(rng.gen(), rng.gen(), rng.gen());

        Self {
            code: country.code.clone(),
            positions,
            normals,
            color,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Triangles with their averaged vertex normal
    pub fn triangles(&self) -> impl Iterator<Item = ([Vec3; 3], Vec3)> + '_ {
        self.positions
            .chunks_exact(3)
            .zip(self.normals.chunks_exact(3))
            .map(|(t, n)| ([t[0], t[1], t[2]], (n[0] + n[1] + n[2]).normalize_or_zero()))
    }
}

fn to_point([lon, lat]: Position) -> Vec3 {
    geo::to_cartesian(GeoCoordinate::new(lat, lon))
}

/// Project points onto the plane tangent to the sphere at their centroid.
pub fn project_to_plane(polygon: &[Vec3]) -> Vec<Vec2> {
    if polygon.is_empty() {
        return Vec::new();
    }
    let centroid = polygon.iter().copied().sum::<Vec3>() / polygon.len() as f32;

    let normal = centroid.normalize_or_zero();
    let mut tangent = normal.cross(Vec3::Y);
    if tangent.length() < 0.001 {
        tangent = Vec3::X;
    }
    let tangent = tangent.normalize();
    let bitangent = normal.cross(tangent);

    polygon
        .iter()
        .map(|&v| {
            let d = v - centroid;
            Vec2::new(d.dot(tangent), d.dot(bitangent))
        })
        .collect()
}
