//! Ear-clipping triangulation of simple 2D polygons

use glam::Vec2;

fn signed_area(points: &[Vec2]) -> f32 {
    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a - o).perp_dot(b - o)
}

fn contains(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Triangulate a polygon given as an open or closed ring.
///
/// Returns indices into `points`, three per triangle. A trailing point equal
/// to the first is ignored. Self-intersecting input degrades to a fan over
/// whatever could not be clipped.
pub fn triangulate(points: &[Vec2]) -> Vec<usize> {
    let mut n = points.len();
    if n >= 2 && points[0] == points[n - 1] {
        n -= 1;
    }
    if n < 3 {
        return Vec::new();
    }

    let ring = &points[..n];
    let mut remaining: Vec<usize> = (0..n).collect();
    if signed_area(ring) < 0.0 {
        remaining.reverse();
    }

    let mut triangles = Vec::with_capacity((n - 2) * 3);
    let mut guard = 0;
    let mut i = 0;
    while remaining.len() > 3 {
        let len = remaining.len();
        let prev = remaining[(i + len - 1) % len];
        let curr = remaining[i % len];
        let next = remaining[(i + 1) % len];
        let (a, b, c) = (ring[prev], ring[curr], ring[next]);

        let convex = cross(a, b, c) > 0.0;
        let is_ear = convex
            && remaining
                .iter()
                .filter(|&&k| k != prev && k != curr && k != next)
                .all(|&k| !contains(a, b, c, ring[k]));

        if is_ear {
            triangles.extend_from_slice(&[prev, curr, next]);
            remaining.remove(i % len);
            guard = 0;
            if i >= remaining.len() {
                i = 0;
            }
        } else {
            i = (i + 1) % len;
            guard += 1;
            if guard > len {
                break;
            }
        }
    }

    if remaining.len() >= 3 {
        for k in 1..remaining.len() - 1 {
            triangles.extend_from_slice(&[remaining[0], remaining[k], remaining[k + 1]]);
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_of(points: &[Vec2], tris: &[usize]) -> f32 {
        tris.chunks(3)
            .map(|t| cross(points[t[0]], points[t[1]], points[t[2]]).abs() * 0.5)
            .sum()
    }

    #[test]
    fn square_gives_two_triangles() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), 6);
        assert!((area_of(&pts, &tris) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn closing_point_and_winding_are_ignored() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), 6);
        assert!(tris.iter().all(|&i| i < 4));
        assert!((area_of(&pts, &tris) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn concave_polygon_area_is_preserved() {
        // U shape, area = 3*3 - 1*2 = 7
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(3.0, 3.0),
            Vec2::new(2.0, 3.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 3.0),
            Vec2::new(0.0, 3.0),
        ];
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), (pts.len() - 2) * 3);
        assert!((area_of(&pts, &tris) - 7.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_input_is_empty() {
        assert!(triangulate(&[Vec2::ZERO, Vec2::ONE]).is_empty());
        assert!(triangulate(&[]).is_empty());
    }
}
