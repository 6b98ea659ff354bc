//! Interactive, print and info modes

use crate::config::{RunConfig, SourceKind};
use crate::error::Result;
use crate::geometry::{CountryMesh, Globe};
use crate::land::Atlas;
use crate::render::{HudInfo, Renderer};
use crate::scene::Scene;
use crate::stream::{self, demo::DemoGenerator};
use crate::terminal::Terminal;
use crossterm::event::{KeyCode, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// Country colours stay stable between runs unless a seed is given
const PALETTE_SEED: u64 = 0x6e67;
const ROTATE_STEP: f32 = 0.08;
const ZOOM_STEP: f32 = 1.15;
/// Events applied before a still frame of the demo source
const PRINT_DEMO_EVENTS: usize = 24;

struct World {
    atlas: Atlas,
    scene: Scene,
}

fn build_world(config: &RunConfig) -> Result<World> {
    let atlas = Atlas::load(config.globe.countries.as_deref())?;
    log::info!("Loaded {} countries", atlas.len());

    let started = Instant::now();
    let globe = Globe::new(config.globe.subdivisions, &atlas);
    let mut rng = StdRng::seed_from_u64(config.stream.seed.unwrap_or(PALETTE_SEED));
    let countries: Vec<CountryMesh> = atlas.iter().map(|c| CountryMesh::new(c, &mut rng)).collect();
    log::debug!(
        "Built globe with {} faces ({} land) in {:?}",
        globe.face_count(),
        globe.land_face_count(),
        started.elapsed()
    );

    let scene = Scene::new(globe, countries, config.scene);
    Ok(World { atlas, scene })
}

/// What a key press asks the loop to do
#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Quit,
}

/// Scene time: follows the wall clock but stands still while paused
struct SceneClock {
    origin: Instant,
    last: Instant,
    elapsed: Duration,
}

impl SceneClock {
    fn new(now: Instant) -> Self {
        Self {
            origin: now,
            last: now,
            elapsed: Duration::ZERO,
        }
    }

    /// Move to wall time `now`, counting the gap only when `running`.
    fn advance(&mut self, now: Instant, running: bool) -> Instant {
        if running {
            self.elapsed += now.saturating_duration_since(self.last);
        }
        self.last = now;
        self.now()
    }

    fn now(&self) -> Instant {
        self.origin + self.elapsed
    }
}

struct ViewState {
    paused: bool,
    show_help: bool,
}

impl ViewState {
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, renderer: &mut Renderer) -> KeyAction {
        let camera = &mut renderer.camera;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return KeyAction::Quit,
            KeyCode::Char(' ') => self.paused = !self.paused,
            KeyCode::Left | KeyCode::Char('h') => camera.rotate(-ROTATE_STEP, 0.0),
            KeyCode::Right | KeyCode::Char('l') => camera.rotate(ROTATE_STEP, 0.0),
            KeyCode::Up | KeyCode::Char('k') => camera.rotate(0.0, ROTATE_STEP),
            KeyCode::Down | KeyCode::Char('j') => camera.rotate(0.0, -ROTATE_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') => camera.zoom_by(ZOOM_STEP),
            KeyCode::Char('-') | KeyCode::Char('_') => camera.zoom_by(1.0 / ZOOM_STEP),
            KeyCode::Char('0') => camera.reset(),
            KeyCode::Char('r') => camera.toggle_auto_rotate(),
            KeyCode::Char('c') => renderer.layers.countries = !renderer.layers.countries,
            KeyCode::Char('g') => renderer.layers.graticule = !renderer.layers.graticule,
            KeyCode::Char('o') => renderer.layers.ocean = !renderer.layers.ocean,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            _ => {}
        }
        KeyAction::None
    }
}

/// Run the interactive globe until the user quits.
pub fn run(config: RunConfig) -> Result<()> {
    let World { atlas, mut scene } = build_world(&config)?;
    let feed = stream::open(&config.stream, &config.globe, &atlas)?;

    let mut term = Terminal::new(true)?;
    let (cols, rows) = term.size();
    let mut renderer = Renderer::new(&atlas, cols, rows);
    drop(atlas);
    if let Some(home) = config.globe.home {
        renderer.camera.look_at(home);
    }

    let mut view = ViewState {
        paused: false,
        show_help: false,
    };
    let frame = Duration::from_secs_f32(config.time_step.max(0.001));
    let mut last = Instant::now();
    let mut clock = SceneClock::new(last);

    loop {
        if term.refresh_size()? {
            term.invalidate();
        }

        while let Some((code, modifiers)) = term.check_key()? {
            if view.handle_key(code, modifiers, &mut renderer) == KeyAction::Quit {
                feed.stop();
                return Ok(());
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;
        let scene_now = clock.advance(now, !view.paused);

        for message in feed.drain() {
            scene.handle(message, scene_now);
        }
        if !view.paused {
            scene.tick(scene_now);
            renderer.camera.update(dt);
        }

        let hud = HudInfo {
            source: feed.name().to_string(),
            paused: view.paused,
            show_help: view.show_help,
        };
        renderer.render(&scene, &hud, &mut term);
        term.present()?;

        let spent = now.elapsed();
        if spent < frame {
            thread::sleep(frame - spent);
        }
    }
}

/// Render a single frame to stdout, coloured unless `plain`.
pub fn print(config: RunConfig, width: u16, height: u16, plain: bool) -> Result<()> {
    let World { atlas, mut scene } = build_world(&config)?;
    let mut renderer = Renderer::new(&atlas, width, height);
    renderer.camera.toggle_auto_rotate();
    if let Some(home) = config.globe.home {
        renderer.camera.look_at(home);
    }

    // A still frame of the demo shows some traffic mid-flight
    if config.stream.source == SourceKind::Demo {
        let start = Instant::now();
        let mut generator = DemoGenerator::new(config.stream.seed);
        for _ in 0..PRINT_DEMO_EVENTS {
            scene.apply(generator.next_event(SystemTime::now()), start);
        }
        scene.tick(start + config.scene.trace_duration / 2);
    }

    let mut term = Terminal::offscreen(width, height);
    let hud = HudInfo {
        source: config.stream.source.name().to_string(),
        paused: false,
        show_help: false,
    };
    renderer.render(&scene, &hud, &mut term);
    if plain {
        print!("{}", term.to_plain_string());
    } else {
        println!("{}", term.to_ansi_string());
    }
    Ok(())
}

/// Print mesh statistics.
pub fn info(config: RunConfig) -> Result<()> {
    let World { atlas, scene } = build_world(&config)?;
    let globe = scene.globe();

    println!("subdivisions: {}", config.globe.subdivisions);
    println!("vertices:     {}", globe.vertex_count());
    println!("faces:        {}", globe.face_count());
    println!("land faces:   {}", globe.land_face_count());
    println!("countries:    {}", atlas.len());

    let triangles: usize = scene.countries().iter().map(|m| m.triangle_count()).sum();
    println!("cap triangles: {triangles}");

    let counts = globe.country_face_counts();
    if !counts.is_empty() {
        println!();
        println!("largest countries by face count:");
        for &(code, faces) in counts.iter().take(10) {
            let name = atlas.find(code).map(|c| c.name.as_str()).unwrap_or(code);
            let caps = scene
                .countries()
                .iter()
                .find(|m| m.code == code)
                .map_or(0, |m| m.triangle_count());
            println!("  {code:<4} {faces:>6} {caps:>6}  {name}");
        }
    }
    Ok(())
}
