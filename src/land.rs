//! Land polygons and point-in-polygon classification
//!
//! Reads Natural Earth style GeoJSON: either a `FeatureCollection` of
//! countries (`NAME` / `ISO_A2` properties) or a bare `GeometryCollection`
//! such as the 110m land layer.

use crate::error::{Error, Result};
use crate::geo::{self, GeoCoordinate};
use glam::Vec3;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Coarse landmass outlines compiled into the binary
const BUILTIN_LAND: &str = include_str!("../assets/land.geojson");

/// `[lon, lat]` in degrees
pub type Position = [f32; 2];
/// Closed ring; the first and last positions are usually equal
pub type Ring = Vec<Position>;
/// Outer ring followed by any holes
pub type Polygon = Vec<Ring>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Document {
    FeatureCollection { features: Vec<Feature> },
    GeometryCollection { geometries: Vec<Geometry> },
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(rename = "NAME", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "ISO_A2", alias = "iso_a2", default)]
    iso_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: serde_json::Value,
}

impl Geometry {
    fn into_polygons(self) -> Result<Vec<Polygon>> {
        let polygons = match self.kind.as_str() {
            "Polygon" => vec![convert_rings(serde_json::from_value(self.coordinates)?)],
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<Vec<f32>>>> = serde_json::from_value(self.coordinates)?;
                polygons.into_iter().map(convert_rings).collect()
            }
            _ => Vec::new(),
        };
        Ok(polygons)
    }
}

fn convert_rings(rings: Vec<Vec<Vec<f32>>>) -> Polygon {
    rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .filter(|p| p.len() >= 2)
                .map(|p| [p[0], p[1]])
                .collect::<Ring>()
        })
        .filter(|ring| ring.len() >= 3)
        .collect()
}

/// Lat/lon bounding box of a country
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f32,
    pub max_lat: f32,
    pub min_lon: f32,
    pub max_lon: f32,
}

impl Bounds {
    fn of(polygons: &[Polygon]) -> Self {
        let mut bounds = Bounds {
            min_lat: f32::INFINITY,
            max_lat: f32::NEG_INFINITY,
            min_lon: f32::INFINITY,
            max_lon: f32::NEG_INFINITY,
        };
        for [lon, lat] in polygons.iter().flatten().flatten().copied() {
            bounds.min_lon = bounds.min_lon.min(lon);
            bounds.max_lon = bounds.max_lon.max(lon);
            bounds.min_lat = bounds.min_lat.min(lat);
            bounds.max_lat = bounds.max_lat.max(lat);
        }
        bounds
    }

    pub fn contains(&self, point: GeoCoordinate) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

/// A named land area made of one or more polygons
#[derive(Debug, Clone)]
pub struct Country {
    pub name: String,
    pub code: String,
    pub polygons: Vec<Polygon>,
    pub bounds: Bounds,
}

impl Country {
    pub fn new(name: impl Into<String>, code: impl Into<String>, polygons: Vec<Polygon>) -> Self {
        let bounds = Bounds::of(&polygons);
        Self {
            name: name.into(),
            code: code.into(),
            polygons,
            bounds,
        }
    }

    /// Even-odd containment per polygon, so holes are excluded.
    pub fn contains(&self, point: GeoCoordinate) -> bool {
        if !self.bounds.contains(point) {
            return false;
        }
        self.polygons.iter().any(|rings| {
            rings.iter().filter(|ring| point_in_ring(point, ring)).count() % 2 == 1
        })
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons.iter().flatten()
    }

    /// Mean direction of the largest outer ring. Works across the antimeridian.
    pub fn centre(&self) -> Option<GeoCoordinate> {
        let ring = self.polygons.iter().filter_map(|p| p.first()).max_by_key(|r| r.len())?;
        let open = match ring.split_last() {
            Some((last, rest)) if rest.first() == Some(last) => rest,
            _ => ring.as_slice(),
        };
        let sum: Vec3 = open
            .iter()
            .map(|&[lon, lat]| geo::to_cartesian(GeoCoordinate::new(lat, lon)))
            .sum();
        (sum.length() > 1e-6).then(|| geo::to_lat_lon(sum.normalize()))
    }
}

/// Ray-casting point-in-polygon test in lon/lat space.
pub fn point_in_ring(point: GeoCoordinate, ring: &[Position]) -> bool {
    let (lon, lat) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for (i, &[c_lon, c_lat]) in ring.iter().enumerate() {
        let [n_lon, n_lat] = ring[j];
        let crosses = (c_lat > lat) != (n_lat > lat)
            && lon < (n_lon - c_lon) * (lat - c_lat) / (n_lat - c_lat + 1e-12) + c_lon;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Collection of countries used to classify the globe surface
#[derive(Debug, Clone, Default)]
pub struct Atlas {
    countries: Vec<Country>,
}

impl Atlas {
    pub fn new(countries: Vec<Country>) -> Self {
        Self { countries }
    }

    /// Embedded coarse landmasses.
    pub fn builtin() -> Result<Self> {
        Self::from_geojson(BUILTIN_LAND, Path::new("<builtin>"))
    }

    /// Load from a GeoJSON file, or the built-in outlines when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                Self::from_geojson(&content, path)
            }
            None => Self::builtin(),
        }
    }

    /// `origin` names the source in errors.
    pub fn from_geojson(content: &str, origin: &Path) -> Result<Self> {
        let document: Document = serde_json::from_str(content)?;
        let mut countries = Vec::new();
        match document {
            Document::FeatureCollection { features } => {
                for (i, feature) in features.into_iter().enumerate() {
                    let Some(geometry) = feature.geometry else {
                        continue;
                    };
                    let polygons = geometry.into_polygons()?;
                    if polygons.is_empty() {
                        continue;
                    }
                    // Natural Earth marks disputed areas with "-99"
                    let code = feature
                        .properties
                        .iso_code
                        .filter(|c| !c.is_empty() && c != "-99")
                        .unwrap_or_else(|| format!("#{i}"));
                    let name = feature.properties.name.unwrap_or_else(|| code.clone());
                    countries.push(Country::new(name, code, polygons));
                }
            }
            Document::GeometryCollection { geometries } => {
                for (i, geometry) in geometries.into_iter().enumerate() {
                    let polygons = geometry.into_polygons()?;
                    if !polygons.is_empty() {
                        countries.push(Country::new(format!("Land {i}"), format!("#{i}"), polygons));
                    }
                }
            }
        }

        if countries.is_empty() {
            return Err(Error::EmptyAtlas(origin.to_path_buf()));
        }
        log::debug!("Loaded {} land areas from {}", countries.len(), origin.display());
        Ok(Self { countries })
    }

    /// First country containing the point.
    pub fn classify(&self, point: GeoCoordinate) -> Option<&Country> {
        self.countries.iter().find(|c| c.contains(point))
    }

    pub fn find(&self, code: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Country> {
        self.countries.iter()
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }
}
