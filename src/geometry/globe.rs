//! Icosphere globe with land extrusion
//!
//! The mesh starts from a regular icosahedron and is subdivided `n` times.
//! Every face whose centroid falls inside a country lifts its three vertices
//! to [`LAND_EXTRUSION`] and paints them [`palette::LAND`]. That surface is
//! kept as the base every unselect animation returns to.

use crate::animation::{Status, Timeline};
use crate::colors::{palette, Rgb};
use crate::geo::{self, GeoCoordinate};
use crate::land::Atlas;
use glam::Vec3;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const OCEAN_EXTRUSION: f32 = 1.0;
pub const LAND_EXTRUSION: f32 = 1.05;
pub const MAX_SUBDIVISIONS: u8 = 7;

pub type Face = [u32; 3];

/// 12 vertices on the unit sphere and the 20 canonical faces
pub fn icosahedron() -> (Vec<Vec3>, Vec<Face>) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;

    let vertices = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
    .into_iter()
    .map(Vec3::normalize)
    .collect();

    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    (vertices, faces)
}

/// Split every face into four, sharing edge midpoints between neighbours.
pub fn subdivide(vertices: &mut Vec<Vec3>, faces: &[Face]) -> Vec<Face> {
    let mut cache: HashMap<(u32, u32), u32> = HashMap::with_capacity(faces.len() * 3 / 2);
    let mut midpoint = |a: u32, b: u32| -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        *cache.entry(key).or_insert_with(|| {
            let mid = (vertices[a as usize] + vertices[b as usize]).normalize();
            vertices.push(mid);
            (vertices.len() - 1) as u32
        })
    };

    let mut subdivided = Vec::with_capacity(faces.len() * 4);
    for &[a, b, c] in faces {
        let ab = midpoint(a, b);
        let bc = midpoint(b, c);
        let ca = midpoint(c, a);
        subdivided.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
    }
    subdivided
}

/// Animation parameters shared by the select/unselect helpers
#[derive(Clone, Copy, Debug)]
pub struct HighlightOptions {
    pub duration: Duration,
    pub extrusion: f32,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(500),
            extrusion: 0.01,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HighlightId(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
enum Direction {
    /// Up from land height, painted in the given colour
    Raise(Rgb),
    /// Down to the base surface, in the base colour
    Lower,
}

struct Highlight {
    id: HighlightId,
    faces: Vec<usize>,
    direction: Direction,
    extrusion: f32,
    timeline: Timeline,
}

pub struct Globe {
    vertices: Vec<Vec3>,
    faces: Vec<Face>,
    centroids: Vec<Vec3>,
    extrusions: Vec<f32>,
    colors: Vec<Rgb>,
    /// Surface as classified, before any highlight
    base_extrusions: Vec<f32>,
    base_colors: Vec<Rgb>,
    face_country: Vec<Option<u16>>,
    country_codes: Vec<String>,
    country_faces: HashMap<String, Vec<usize>>,
    highlights: Vec<Highlight>,
    next_highlight: u64,
}

impl Globe {
    /// Build the subdivided sphere and classify it against `atlas`.
    pub fn new(subdivisions: u8, atlas: &Atlas) -> Self {
        let (mut vertices, mut faces) = icosahedron();
        for _ in 0..subdivisions.min(MAX_SUBDIVISIONS) {
            faces = subdivide(&mut vertices, &faces);
        }

        let centroids: Vec<Vec3> = faces
            .iter()
            .map(|f| (f.iter().map(|&i| vertices[i as usize]).sum::<Vec3>() / 3.0).normalize())
            .collect();

        let mut extrusions = vec![OCEAN_EXTRUSION; vertices.len()];
        let mut colors = vec![palette::OCEAN; vertices.len()];
        let mut face_country = vec![None; faces.len()];
        let mut country_faces: HashMap<String, Vec<usize>> = HashMap::new();
        let country_codes: Vec<String> = atlas.iter().map(|c| c.code.clone()).collect();
        let mut code_index: HashMap<&str, u16> = HashMap::with_capacity(country_codes.len());
        for (ci, code) in country_codes.iter().enumerate() {
            code_index.entry(code.as_str()).or_insert(ci as u16);
        }

        for (fi, centroid) in centroids.iter().enumerate() {
            let Some(country) = atlas.classify(geo::to_lat_lon(*centroid)) else {
                continue;
            };
            let Some(&ci) = code_index.get(country.code.as_str()) else {
                continue;
            };

            face_country[fi] = Some(ci);
            country_faces.entry(country.code.clone()).or_default().push(fi);
            for &vi in &faces[fi] {
                extrusions[vi as usize] = LAND_EXTRUSION;
                colors[vi as usize] = palette::LAND;
            }
        }

        log::info!(
            "Globe built: {} vertices, {} faces, {} land faces across {} countries",
            vertices.len(),
            faces.len(),
            face_country.iter().filter(|c| c.is_some()).count(),
            country_faces.len()
        );

        Self {
            vertices,
            faces,
            centroids,
            base_extrusions: extrusions.clone(),
            base_colors: colors.clone(),
            extrusions,
            colors,
            face_country,
            country_codes,
            country_faces,
            highlights: Vec::new(),
            next_highlight: 0,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Unit-sphere direction of a vertex
    pub fn vertex_normal(&self, index: usize) -> Vec3 {
        self.vertices[index]
    }

    /// Rendered position: direction scaled by the vertex extrusion
    pub fn vertex_position(&self, index: usize) -> Vec3 {
        self.vertices[index] * self.extrusions[index]
    }

    pub fn vertex_color(&self, index: usize) -> Rgb {
        self.colors[index]
    }

    pub fn vertex_extrusion(&self, index: usize) -> f32 {
        self.extrusions[index]
    }

    pub fn land_face_count(&self) -> usize {
        self.face_country.iter().filter(|c| c.is_some()).count()
    }

    /// Country code of the face nearest to `coord`, if that face is land.
    pub fn country_at(&self, coord: GeoCoordinate) -> Option<&str> {
        let target = geo::to_cartesian(coord);
        let (face, _) = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.dot(target)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        self.face_country[face].map(|ci| self.country_codes[ci as usize].as_str())
    }

    /// Land faces per country code
    pub fn country_face_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .country_faces
            .iter()
            .map(|(code, faces)| (code.as_str(), faces.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        counts
    }

    /// Faces whose centroid lies within `radius_deg` of `center`
    pub fn region_faces(&self, center: GeoCoordinate, radius_deg: f32) -> Vec<usize> {
        let threshold = radius_deg.to_radians().cos();
        let center = geo::to_cartesian(center);
        self.centroids
            .iter()
            .enumerate()
            .filter(|(_, c)| center.dot(**c) >= threshold)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn select_country(&mut self, code: &str, options: HighlightOptions, now: Instant) -> Option<HighlightId> {
        let faces = self.country_faces.get(code)?.clone();
        self.start_highlight(faces, Direction::Raise(palette::COUNTRY_SELECTED), options, now)
    }

    pub fn unselect_country(&mut self, code: &str, options: HighlightOptions, now: Instant) -> Option<HighlightId> {
        let faces = self.country_faces.get(code)?.clone();
        self.start_highlight(faces, Direction::Lower, options, now)
    }

    pub fn select_region(
        &mut self,
        center: GeoCoordinate,
        radius_deg: f32,
        options: HighlightOptions,
        now: Instant,
    ) -> Option<HighlightId> {
        let faces = self.region_faces(center, radius_deg);
        self.start_highlight(faces, Direction::Raise(palette::REGION_SELECTED), options, now)
    }

    pub fn unselect_region(
        &mut self,
        center: GeoCoordinate,
        radius_deg: f32,
        options: HighlightOptions,
        now: Instant,
    ) -> Option<HighlightId> {
        let faces = self.region_faces(center, radius_deg);
        self.start_highlight(faces, Direction::Lower, options, now)
    }

    fn start_highlight(
        &mut self,
        faces: Vec<usize>,
        direction: Direction,
        options: HighlightOptions,
        now: Instant,
    ) -> Option<HighlightId> {
        if faces.is_empty() {
            return None;
        }
        let id = HighlightId(self.next_highlight);
        self.next_highlight += 1;
        self.highlights.push(Highlight {
            id,
            faces,
            direction,
            extrusion: options.extrusion,
            timeline: Timeline::new(now, options.duration),
        });
        Some(id)
    }

    #[cfg(test)]
    pub fn is_animating(&self, id: HighlightId) -> bool {
        self.highlights.iter().any(|h| h.id == id)
    }

    /// Highlights still running
    pub fn active_highlights(&self) -> usize {
        self.highlights.len()
    }

    /// Apply every running highlight at `now` and drop the finished ones.
    pub fn tick(&mut self, now: Instant) {
        let mut highlights = std::mem::take(&mut self.highlights);
        highlights.retain(|h| {
            let running = self.apply_highlight(h, now) == Status::Running;
            if !running {
                log::trace!("Highlight {:?} finished", h.id);
            }
            running
        });
        // New highlights cannot be started while ticking
        self.highlights = highlights;
    }

    fn apply_highlight(&mut self, highlight: &Highlight, now: Instant) -> Status {
        let progress = highlight.timeline.progress(now);
        let top = LAND_EXTRUSION + highlight.extrusion;
        for &fi in &highlight.faces {
            for &vi in &self.faces[fi] {
                let vi = vi as usize;
                (self.extrusions[vi], self.colors[vi]) = match highlight.direction {
                    Direction::Raise(color) => (LAND_EXTRUSION + progress * highlight.extrusion, color),
                    Direction::Lower => {
                        let base = self.base_extrusions[vi];
                        (top + (base - top) * progress, self.base_colors[vi])
                    }
                };
            }
        }
        if progress < 1.0 {
            Status::Running
        } else {
            Status::Finished
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::land::Country;

    fn square_atlas() -> Atlas {
        let ring = vec![[-20.0, -20.0], [20.0, -20.0], [20.0, 20.0], [-20.0, 20.0], [-20.0, -20.0]];
        Atlas::new(vec![Country::new("Square", "SQ", vec![vec![ring]])])
    }

    #[test]
    fn icosahedron_is_unit_and_closed() {
        let (vertices, faces) = icosahedron();
        assert_eq!(vertices.len(), 12);
        assert_eq!(faces.len(), 20);
        for v in &vertices {
            assert!((v.length() - 1.0).abs() < 1e-6);
        }
        // Euler characteristic of a sphere: V - E + F = 2, E = 3F/2
        assert_eq!(vertices.len() as i32 - 30 + faces.len() as i32, 2);
    }

    #[test]
    fn subdivision_counts_follow_geodesic_formula() {
        let (mut vertices, mut faces) = icosahedron();
        for level in 1..=4u32 {
            faces = subdivide(&mut vertices, &faces);
            let expected_faces = 20 * 4usize.pow(level);
            assert_eq!(faces.len(), expected_faces);
            assert_eq!(vertices.len(), 10 * 4usize.pow(level) + 2);
        }
        for v in &vertices {
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn subdivision_shares_edge_midpoints() {
        let (mut vertices, faces) = icosahedron();
        let faces = subdivide(&mut vertices, &faces);
        // 30 edges of the icosahedron give exactly 30 new vertices
        assert_eq!(vertices.len(), 42);
        assert!(faces.iter().flatten().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn land_faces_are_extruded_and_colored() {
        let globe = Globe::new(3, &square_atlas());
        assert_eq!(globe.face_count(), 1280);
        assert!(globe.land_face_count() > 0);
        assert!(globe.land_face_count() < globe.face_count());

        for (fi, face) in globe.faces().iter().enumerate() {
            if globe.face_country[fi].is_some() {
                for &vi in face {
                    assert_eq!(globe.vertex_extrusion(vi as usize), LAND_EXTRUSION);
                    assert_eq!(globe.vertex_color(vi as usize), palette::LAND);
                }
            }
        }
        assert_eq!(globe.country_at(GeoCoordinate::new(0.0, 0.0)), Some("SQ"));
        assert_eq!(globe.country_at(GeoCoordinate::new(0.0, 180.0)), None);
    }

    #[test]
    fn ocean_vertices_stay_on_unit_sphere() {
        let globe = Globe::new(2, &square_atlas());
        let target = geo::to_cartesian(GeoCoordinate::new(0.0, 180.0));
        let nearest = (0..globe.vertex_count())
            .max_by(|&a, &b| globe.vertex_normal(a).dot(target).total_cmp(&globe.vertex_normal(b).dot(target)))
            .unwrap();
        assert_eq!(globe.vertex_extrusion(nearest), OCEAN_EXTRUSION);
        assert!((globe.vertex_position(nearest).length() - 1.0).abs() < 1e-5);
        assert_eq!(globe.vertex_color(nearest), palette::OCEAN);
    }

    #[test]
    fn unknown_country_has_no_animation() {
        let mut globe = Globe::new(2, &square_atlas());
        assert!(globe
            .select_country("XX", HighlightOptions::default(), Instant::now())
            .is_none());
    }

    #[test]
    fn select_country_raises_then_finishes() {
        let mut globe = Globe::new(3, &square_atlas());
        let start = Instant::now();
        let options = HighlightOptions::default();
        let id = globe.select_country("SQ", options, start).unwrap();

        globe.tick(start + Duration::from_millis(250));
        assert!(globe.is_animating(id));
        let (fi, _) = globe.faces().iter().enumerate().find(|(i, _)| globe.face_country[*i].is_some()).unwrap();
        let vi = globe.faces()[fi][0] as usize;
        assert!((globe.vertex_extrusion(vi) - (LAND_EXTRUSION + 0.005)).abs() < 1e-4);
        assert_eq!(globe.vertex_color(vi), palette::COUNTRY_SELECTED);

        globe.tick(start + Duration::from_millis(600));
        assert!(!globe.is_animating(id));
        assert!((globe.vertex_extrusion(vi) - (LAND_EXTRUSION + 0.01)).abs() < 1e-5);

        let back = globe.unselect_country("SQ", options, start + Duration::from_secs(1)).unwrap();
        globe.tick(start + Duration::from_secs(2));
        assert!(!globe.is_animating(back));
        assert!((globe.vertex_extrusion(vi) - LAND_EXTRUSION).abs() < 1e-5);
        assert_eq!(globe.vertex_color(vi), palette::LAND);
    }

    #[test]
    fn region_selection_uses_angular_radius() {
        let mut globe = Globe::new(4, &square_atlas());
        let center = GeoCoordinate::new(0.0, 0.0);
        let small = globe.region_faces(center, 5.0);
        let large = globe.region_faces(center, 15.0);
        assert!(!small.is_empty());
        assert!(large.len() > small.len());

        let now = Instant::now();
        let id = globe.select_region(center, 5.0, HighlightOptions::default(), now).unwrap();
        globe.tick(now + Duration::from_secs(1));
        assert!(!globe.is_animating(id));
        let vi = globe.faces()[small[0]][0] as usize;
        assert_eq!(globe.vertex_color(vi), palette::REGION_SELECTED);
    }

    #[test]
    fn unselecting_ocean_region_restores_ocean() {
        let mut globe = Globe::new(4, &square_atlas());
        let center = GeoCoordinate::new(0.0, 180.0);
        let faces = globe.region_faces(center, 5.0);
        let vi = globe.faces()[faces[0]][0] as usize;
        assert_eq!(globe.vertex_extrusion(vi), OCEAN_EXTRUSION);

        let options = HighlightOptions::default();
        let start = Instant::now();
        globe.select_region(center, 5.0, options, start).unwrap();
        globe.tick(start + Duration::from_secs(1));
        assert_eq!(globe.vertex_color(vi), palette::REGION_SELECTED);

        let back = start + Duration::from_secs(2);
        globe.unselect_region(center, 5.0, options, back).unwrap();
        globe.tick(back + Duration::from_millis(250));
        let halfway = LAND_EXTRUSION + 0.01 + (OCEAN_EXTRUSION - LAND_EXTRUSION - 0.01) * 0.5;
        assert!((globe.vertex_extrusion(vi) - halfway).abs() < 1e-4);

        globe.tick(back + Duration::from_secs(1));
        assert_eq!(globe.active_highlights(), 0);
        assert!((globe.vertex_extrusion(vi) - OCEAN_EXTRUSION).abs() < 1e-6);
        assert_eq!(globe.vertex_color(vi), palette::OCEAN);
        assert!((globe.vertex_position(vi).length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_region_has_no_animation() {
        let mut globe = Globe::new(1, &square_atlas());
        // 80 faces are ~25 degrees apart; a 0.1 degree cap off any centroid is empty
        let center = GeoCoordinate::new(1.0, 1.0);
        assert!(globe.region_faces(center, 0.1).is_empty());
        assert!(globe
            .select_region(center, 0.1, HighlightOptions::default(), Instant::now())
            .is_none());
    }

    #[test]
    fn country_face_counts_are_sorted() {
        let globe = Globe::new(3, &square_atlas());
        let counts = globe.country_face_counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].0, "SQ");
        assert_eq!(counts[0].1, globe.land_face_count());
    }
}
