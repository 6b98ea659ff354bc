//! Braille rendering of the scene
//!
//! Layers are drawn back to front into a depth-tested canvas, then the HUD
//! is written directly into the terminal buffer.

pub mod camera;
pub mod canvas;

use crate::colors::{palette, Rgb};
use crate::geo::{great_circle_angle, to_cartesian, GeoCoordinate};
use crate::geometry::globe::{LAND_EXTRUSION, OCEAN_EXTRUSION};
use crate::geometry::Globe;
use crate::help;
use crate::land::Atlas;
use crate::scene::{ConnectionState, Scene};
use crate::terminal::Terminal;
use camera::{Camera, Projected, Viewport};
use canvas::BrailleCanvas;
use crossterm::style::Color;
use glam::Vec3;

/// Coastlines float just above the land surface
const COASTLINE_LIFT: f32 = 1.0001;
/// Densify polylines to at most this many degrees per segment
const POLYLINE_STEP_DEG: f32 = 2.0;
const AMBIENT: f32 = 0.35;
const DIFFUSE: f32 = 0.65;

#[derive(Clone, Copy, Debug)]
pub struct Layers {
    pub ocean: bool,
    pub graticule: bool,
    pub coastlines: bool,
    pub countries: bool,
}

impl Default for Layers {
    fn default() -> Self {
        Self {
            ocean: true,
            graticule: false,
            coastlines: true,
            countries: false,
        }
    }
}

/// Frame-loop state shown in the HUD
#[derive(Clone, Debug, Default)]
pub struct HudInfo {
    pub source: String,
    pub paused: bool,
    pub show_help: bool,
}

/// Great-circle polyline through `points`, split into short segments
fn densify(points: &[Vec3]) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let steps = (great_circle_angle(a, b).to_degrees() / POLYLINE_STEP_DEG).ceil().max(1.0) as usize;
        for i in 0..steps {
            out.push(a.lerp(b, i as f32 / steps as f32).normalize_or_zero());
        }
    }
    out.extend(points.last().copied());
    out
}

fn coastlines(atlas: &Atlas) -> Vec<Vec<Vec3>> {
    atlas
        .iter()
        .flat_map(|country| country.rings())
        .map(|ring| {
            let points: Vec<Vec3> = ring
                .iter()
                .map(|&[lon, lat]| to_cartesian(GeoCoordinate::new(lat, lon)))
                .collect();
            densify(&points)
                .into_iter()
                .map(|p| p * LAND_EXTRUSION * COASTLINE_LIFT)
                .collect()
        })
        .collect()
}

fn graticule() -> Vec<Vec<Vec3>> {
    let mut lines = Vec::new();
    for lat in (-60..=60).step_by(30) {
        let ring: Vec<Vec3> = (-180..=180)
            .step_by(3)
            .map(|lon| to_cartesian(GeoCoordinate::new(lat as f32, lon as f32)))
            .collect();
        lines.push(ring);
    }
    for lon in (-180..180).step_by(30) {
        let meridian: Vec<Vec3> = (-90..=90)
            .step_by(3)
            .map(|lat| to_cartesian(GeoCoordinate::new(lat as f32, lon as f32)))
            .collect();
        lines.push(meridian);
    }
    lines
}

pub struct Renderer {
    canvas: BrailleCanvas,
    pub camera: Camera,
    pub layers: Layers,
    coastlines: Vec<Vec<Vec3>>,
    graticule: Vec<Vec<Vec3>>,
    /// View-space light direction
    light: Vec3,
}

impl Renderer {
    pub fn new(atlas: &Atlas, cols: u16, rows: u16) -> Self {
        Self {
            canvas: BrailleCanvas::new(cols, rows),
            camera: Camera::new(),
            layers: Layers::default(),
            coastlines: coastlines(atlas),
            graticule: graticule(),
            light: Vec3::new(-0.4, 0.5, 1.0).normalize(),
        }
    }

    fn shade(&self, viewport: &Viewport, normal: Vec3, color: Rgb) -> Rgb {
        let n = viewport.to_view(normal);
        color.scale(AMBIENT + DIFFUSE * n.dot(self.light).max(0.0))
    }

    /// Draw one full frame into `term`'s buffer.
    pub fn render(&mut self, scene: &Scene, hud: &HudInfo, term: &mut Terminal) {
        let (cols, rows) = term.size();
        self.canvas.resize(cols, rows);
        self.canvas.clear();
        term.clear();

        let viewport = self.camera.viewport(self.canvas.width(), self.canvas.height());

        self.draw_globe(&viewport, scene.globe());
        if self.layers.graticule {
            for line in &self.graticule {
                draw_polyline(&mut self.canvas, &viewport, line, palette::GRATICULE);
            }
        }
        if self.layers.coastlines {
            for line in &self.coastlines {
                draw_polyline(&mut self.canvas, &viewport, line, palette::COASTLINE);
            }
        }
        if self.layers.countries {
            self.draw_countries(&viewport, scene);
        }
        self.draw_beacons(&viewport, scene);
        self.draw_traces(&viewport, scene);

        self.canvas.blit(term);
        draw_hud(term, scene, hud, &self.camera);
        if hud.show_help {
            help::render_help_overlay(term, &help::help_text());
        }
    }

    fn draw_globe(&mut self, viewport: &Viewport, globe: &Globe) {
        for i in 0..globe.vertex_count() {
            let is_ocean = globe.vertex_extrusion(i) <= OCEAN_EXTRUSION;
            if is_ocean && !self.layers.ocean {
                continue;
            }
            let Some(p) = viewport.project(globe.vertex_position(i)) else {
                continue;
            };
            let color = self.shade(viewport, globe.vertex_normal(i), globe.vertex_color(i));
            self.canvas.plot_projected(p, color);
        }
    }

    fn draw_countries(&mut self, viewport: &Viewport, scene: &Scene) {
        for mesh in scene.countries() {
            for (triangle, normal) in mesh.triangles() {
                let projected: Vec<Projected> = triangle.iter().filter_map(|&v| viewport.project(v)).collect();
                let &[a, b, c] = projected.as_slice() else {
                    continue;
                };
                let color = self.shade(viewport, normal, mesh.color);
                self.canvas.line(a, b, color);
                self.canvas.line(b, c, color);
                self.canvas.line(c, a, color);
            }
        }
    }

    fn draw_beacons(&mut self, viewport: &Viewport, scene: &Scene) {
        for beacon in scene.beacons() {
            draw_polyline(&mut self.canvas, viewport, beacon.visible_points(), palette::BEACON_STALK);
            let Some(tip) = beacon.tip().and_then(|t| viewport.project(t)) else {
                continue;
            };
            for (dx, dy) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
                self.canvas.plot(tip.x + dx, tip.y + dy, tip.depth + 0.01, palette::BEACON_TIP);
            }
        }
    }

    fn draw_traces(&mut self, viewport: &Viewport, scene: &Scene) {
        for trace in scene.traces() {
            draw_polyline(&mut self.canvas, viewport, trace.visible_points(), palette::TRACE);
            if let Some(head) = trace.head().and_then(|h| viewport.project(h)) {
                self.canvas.plot(head.x, head.y, head.depth + 0.01, palette::TRACE.lighten(0.4));
            }
        }
    }
}

/// Connected polyline; hidden points break it
fn draw_polyline(canvas: &mut BrailleCanvas, viewport: &Viewport, points: &[Vec3], color: Rgb) {
    let mut previous: Option<Projected> = None;
    for &point in points {
        let current = viewport.project(point);
        match (previous, current) {
            (Some(a), Some(b)) => canvas.line(a, b, color),
            (None, Some(b)) => canvas.plot_projected(b, color),
            _ => {}
        }
        previous = current;
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn draw_hud(term: &mut Terminal, scene: &Scene, hud: &HudInfo, camera: &Camera) {
    let (width, height) = term.size();
    if width < 10 || height < 3 {
        return;
    }
    let width = width as usize;
    let text = Some(Color::from(palette::HUD));
    let accent = Some(Color::from(palette::HUD_ACCENT));
    let stats = scene.stats();

    let (status, status_color) = match &stats.connection {
        ConnectionState::Connecting => ("○ connecting".to_string(), accent),
        ConnectionState::Connected(detail) => (format!("● {detail}"), Some(Color::from(palette::TRACE))),
        ConnectionState::Disconnected(reason) => (format!("✕ {reason}"), Some(Color::from(palette::HUD_ERROR))),
    };

    let title = format!(" netglobe [{}] ", hud.source);
    term.set_str(0, 0, &title, accent, true);
    let clock = chrono::Local::now().format("%H:%M:%S").to_string();
    let room = width.saturating_sub(title.chars().count() + clock.len() + 2);
    term.set_str(title.chars().count() as i32, 0, &truncate(&status, room), status_color, false);
    term.set_str((width - clock.len() - 1) as i32, 0, &clock, text, false);

    let counters = format!(
        " events {}  packets {}  dropped {}  traces {}  beacons {}  peers {}  lit {}",
        stats.events_seen,
        stats.packets_drawn,
        stats.dropped,
        scene.trace_count(),
        scene.beacon_count(),
        scene.active_peers(),
        scene.globe().active_highlights()
    );
    let bottom = height as i32 - 1;
    term.set_str(0, bottom, &truncate(&counters, width), text, false);

    if let Some(last) = &stats.last_event {
        term.set_str(0, bottom - 1, &truncate(&format!(" {last}"), width), text, false);
    }

    let mut badge = String::from(" ");
    if hud.paused {
        badge.push_str("PAUSED  ");
    }
    if camera.is_auto_rotating() {
        badge.push_str("↻ ");
    }
    badge.push_str(&format!("{:.1}x  ? help ", camera.zoom()));
    let x = width.saturating_sub(badge.chars().count());
    term.set_str(x as i32, bottom - 1, &badge, accent, hud.paused);
}
