use crate::geo::GeoCoordinate;
use crate::geometry::beacon::DEFAULT_BEACON_HEIGHT;
use crate::geometry::globe::HighlightOptions;
use crate::geometry::trace::DEFAULT_TRACE_DURATION;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EVENTS_URL: &str = "http://localhost:3000/events";

/// Where scene updates come from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Server-sent events from a capture backend
    #[default]
    Sse,
    /// This machine's connections from /proc/net
    Local,
    /// Synthetic traffic between world cities
    Demo,
    /// Events recorded to a file
    Replay,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Sse => "sse",
            SourceKind::Local => "local",
            SourceKind::Demo => "demo",
            SourceKind::Replay => "replay",
        }
    }
}

/// Configuration for the event source
#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub source: SourceKind,
    pub url: String,
    pub file: Option<PathBuf>,
    pub reconnect: Duration,
    pub replay_interval: Duration,
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            url: DEFAULT_EVENTS_URL.to_string(),
            file: None,
            reconnect: Duration::from_secs(3),
            replay_interval: Duration::from_millis(250),
            seed: None,
        }
    }
}

/// Configuration for globe construction
#[derive(Clone, Debug)]
pub struct GlobeConfig {
    pub subdivisions: u8,
    pub countries: Option<PathBuf>,
    pub geoip_db: Option<PathBuf>,
    pub home: Option<GeoCoordinate>,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            subdivisions: 5,
            countries: None,
            geoip_db: None,
            home: None,
        }
    }
}

/// Timing and limits for scene animations
#[derive(Clone, Copy, Debug)]
pub struct SceneConfig {
    pub beacon_height: f32,
    pub trace_duration: Duration,
    pub max_traces: usize,
    pub peer_timeout: Duration,
    pub region_radius_deg: f32,
    pub highlight: HighlightOptions,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            beacon_height: DEFAULT_BEACON_HEIGHT,
            trace_duration: DEFAULT_TRACE_DURATION,
            max_traces: 256,
            peer_timeout: Duration::from_secs(60),
            region_radius_deg: 2.5,
            highlight: HighlightOptions::default(),
        }
    }
}

/// Everything the interactive and print modes need
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub stream: StreamConfig,
    pub globe: GlobeConfig,
    pub scene: SceneConfig,
    /// Seconds per frame
    pub time_step: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            globe: GlobeConfig::default(),
            scene: SceneConfig::default(),
            time_step: 1.0 / 30.0,
        }
    }
}
