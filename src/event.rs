//! Wire model of the pushed event stream
//!
//! Three payload shapes are accepted: the flat capture event emitted by the
//! packet sniffer, and the `{"packet": ...}` / `{"peer": ...}` envelopes.

use crate::error::{Error, Result};
use crate::geo::GeoCoordinate;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

/// A peer counts as active for this long after its last message
pub const PEER_ACTIVE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ingress,
    Egress,
}

/// How a peer's location was determined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum LocationDetails {
    City { city_name: String, accuracy_radius: u16 },
    Manual,
    RegisteredCountry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub lat: f32,
    pub lon: f32,
    #[serde(default)]
    pub country_code: String,
    #[serde(flatten)]
    pub details: LocationDetails,
}

impl PeerInfo {
    pub fn location(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub addr: IpAddr,
    pub info: PeerInfo,
    #[serde(default)]
    pub ingress_bytes: u64,
    #[serde(default)]
    pub egress_bytes: u64,
    /// Serialized as `{secs_since_epoch, nanos_since_epoch}`
    pub last_message: SystemTime,
}

impl Peer {
    pub fn is_active(&self, now: SystemTime) -> bool {
        match now.duration_since(self.last_message) {
            Ok(age) => age < PEER_ACTIVE_WINDOW,
            // Clock skew: a message from the future is fresh
            Err(_) => true,
        }
    }
}

/// One observed packet between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(default)]
    pub proto: Option<String>,
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    #[serde(default)]
    pub src_location: Option<GeoCoordinate>,
    #[serde(default)]
    pub dst_location: Option<GeoCoordinate>,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<SystemTime>,
}

impl Packet {
    /// Both endpoints, if present and within range
    pub fn endpoints(&self) -> Option<(GeoCoordinate, GeoCoordinate)> {
        let src = self.src_location.filter(GeoCoordinate::is_valid)?;
        let dst = self.dst_location.filter(GeoCoordinate::is_valid)?;
        Some((src, dst))
    }

    pub fn summary(&self) -> String {
        let proto = self.proto.as_deref().unwrap_or("?");
        let port = |p: Option<u16>| p.map(|p| format!(":{p}")).unwrap_or_default();
        format!(
            "{}{} -> {}{} {} {}B",
            self.src_addr,
            port(self.src_port),
            self.dst_addr,
            port(self.dst_port),
            proto,
            self.bytes
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Peer { peer: Peer },
    Packet { packet: Packet },
    Raw(Packet),
}

/// Parse one SSE `data` payload.
pub fn parse_event(data: &str) -> Result<Event> {
    let data = data.trim();
    if data.is_empty() {
        return Err(Error::InvalidEvent("empty payload".into()));
    }
    let value: serde_json::Value = serde_json::from_str(data)?;
    if !value.is_object() {
        return Err(Error::InvalidEvent(format!("expected a JSON object, got {value}")));
    }
    serde_json::from_value(value).map_err(|e| Error::InvalidEvent(e.to_string()))
}
