use crate::config::{RunConfig, SourceKind};
use crate::geo::GeoCoordinate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub globe: GlobeSettings,
    #[serde(default)]
    pub scene: SceneSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamSettings {
    pub source: Option<SourceKind>,
    pub url: Option<String>,
    pub file: Option<PathBuf>,        // Recording for the replay source
    pub reconnect_ms: Option<u64>,
    pub replay_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobeSettings {
    pub subdivisions: Option<u8>,
    pub countries: Option<PathBuf>,   // GeoJSON country or land polygons
    pub geoip_db: Option<PathBuf>,    // Path to GeoLite2-City.mmdb database
    pub home: Option<GeoCoordinate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SceneSettings {
    pub beacon_height: Option<f32>,
    pub trace_duration_ms: Option<u64>,
    pub max_traces: Option<usize>,
    pub peer_timeout_secs: Option<u64>,
    pub region_radius_deg: Option<f32>,
}

impl Settings {
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings in {}: {e}", path.display());
                Self::default()
            }),
            Err(e) => {
                log::warn!("Cannot read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netglobe")
            .join("config.toml")
    }

    /// Overlay every value present in the file onto `config`.
    pub fn apply(&self, config: &mut RunConfig) {
        let stream = &mut config.stream;
        if let Some(source) = self.stream.source {
            stream.source = source;
        }
        if let Some(url) = &self.stream.url {
            stream.url = url.clone();
        }
        if let Some(file) = &self.stream.file {
            stream.file = Some(file.clone());
        }
        if let Some(ms) = self.stream.reconnect_ms {
            stream.reconnect = Duration::from_millis(ms);
        }
        if let Some(ms) = self.stream.replay_interval_ms {
            stream.replay_interval = Duration::from_millis(ms);
        }

        let globe = &mut config.globe;
        if let Some(subdivisions) = self.globe.subdivisions {
            globe.subdivisions = subdivisions;
        }
        if let Some(countries) = &self.globe.countries {
            globe.countries = Some(countries.clone());
        }
        if let Some(db) = &self.globe.geoip_db {
            globe.geoip_db = Some(db.clone());
        }
        if let Some(home) = self.globe.home {
            if home.is_valid() {
                globe.home = Some(home);
            } else {
                log::warn!("Ignoring out-of-range home location {},{}", home.lat, home.lon);
            }
        }

        let scene = &mut config.scene;
        if let Some(height) = self.scene.beacon_height {
            scene.beacon_height = height;
        }
        if let Some(ms) = self.scene.trace_duration_ms {
            scene.trace_duration = Duration::from_millis(ms);
        }
        if let Some(max) = self.scene.max_traces {
            scene.max_traces = max;
        }
        if let Some(secs) = self.scene.peer_timeout_secs {
            scene.peer_timeout = Duration::from_secs(secs);
        }
        if let Some(radius) = self.scene.region_radius_deg {
            scene.region_radius_deg = radius;
        }
    }
}
