//! Scene state: the globe plus every live beacon and trace
//!
//! Events mutate the scene; [`Scene::tick`] advances all running animations
//! and retires the finished ones. Both run on the frame loop thread.

use crate::config::SceneConfig;
use crate::event::{Event, Packet, Peer};
use crate::geo::{to_cartesian, GeoCoordinate};
use crate::geometry::globe::LAND_EXTRUSION;
use crate::geometry::{Beacon, CountryMesh, Globe, Trace};
use crate::stream::StreamMessage;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Instant, SystemTime};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected(String),
    Disconnected(String),
}

#[derive(Clone, Debug)]
pub struct SceneStats {
    pub events_seen: u64,
    pub packets_drawn: u64,
    pub peers_seen: u64,
    pub dropped: u64,
    pub connection: ConnectionState,
    pub last_event: Option<String>,
}

impl Default for SceneStats {
    fn default() -> Self {
        Self {
            events_seen: 0,
            packets_drawn: 0,
            peers_seen: 0,
            dropped: 0,
            connection: ConnectionState::Connecting,
            last_event: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TracePhase {
    FadingIn,
    FadingOut,
}

struct ActiveTrace {
    trace: Trace,
    dst_addr: IpAddr,
    dst: GeoCoordinate,
    phase: TracePhase,
}

struct Marker {
    beacon: Beacon,
    last_activity: Instant,
}

struct TrackedPeer {
    peer: Peer,
    country: Option<String>,
    last_seen: Instant,
    expiring: bool,
}

/// Surface point at land height
fn surface(coord: GeoCoordinate) -> glam::Vec3 {
    to_cartesian(coord) * LAND_EXTRUSION
}

pub struct Scene {
    globe: Globe,
    countries: Vec<CountryMesh>,
    beacons: HashMap<IpAddr, Marker>,
    traces: Vec<ActiveTrace>,
    peers: HashMap<IpAddr, TrackedPeer>,
    config: SceneConfig,
    stats: SceneStats,
}

impl Scene {
    pub fn new(globe: Globe, countries: Vec<CountryMesh>, config: SceneConfig) -> Self {
        Self {
            globe,
            countries,
            beacons: HashMap::new(),
            traces: Vec::new(),
            peers: HashMap::new(),
            config,
            stats: SceneStats::default(),
        }
    }

    pub fn handle(&mut self, message: StreamMessage, now: Instant) {
        match message {
            StreamMessage::Connected(detail) => {
                log::info!("Connected: {detail}");
                self.stats.connection = ConnectionState::Connected(detail);
            }
            StreamMessage::Disconnected(reason) => {
                self.stats.connection = ConnectionState::Disconnected(reason);
            }
            StreamMessage::Event(event) => self.apply(event, now),
        }
    }

    pub fn apply(&mut self, event: Event, now: Instant) {
        self.stats.events_seen += 1;
        match event {
            Event::Packet { packet } | Event::Raw(packet) => self.apply_packet(packet, now),
            Event::Peer { peer } => self.apply_peer(peer, now),
        }
    }

    fn apply_packet(&mut self, packet: Packet, now: Instant) {
        let Some((src, dst)) = packet.endpoints() else {
            log::debug!("Dropping unlocated packet {}", packet.summary());
            self.stats.dropped += 1;
            return;
        };
        if self.traces.len() >= self.config.max_traces {
            log::debug!("Trace limit reached, dropping {}", packet.summary());
            self.stats.dropped += 1;
            return;
        }

        let mut trace = Trace::new(surface(src), surface(dst));
        trace.fade_in(now, self.config.trace_duration);
        self.traces.push(ActiveTrace {
            trace,
            dst_addr: packet.dst_addr,
            dst,
            phase: TracePhase::FadingIn,
        });

        self.ensure_beacon(packet.src_addr, src, now);
        self.globe
            .select_region(dst, self.config.region_radius_deg, self.config.highlight, now);

        self.stats.packets_drawn += 1;
        self.stats.last_event = Some(packet.summary());
    }

    fn apply_peer(&mut self, peer: Peer, now: Instant) {
        self.stats.peers_seen += 1;
        let active = peer.is_active(SystemTime::now());
        let expiring = self.peers.get(&peer.addr).map(|t| t.expiring);

        match (expiring, active) {
            (None, false) => {}
            (None, true) => self.track_peer(peer, now),
            // Back before its fade finished: start over as a new peer
            (Some(true), true) => {
                self.peers.remove(&peer.addr);
                self.track_peer(peer, now);
            }
            (Some(false), true) => {
                let location = peer.info.location();
                let addr = peer.addr;
                if let Some(tracked) = self.peers.get_mut(&addr) {
                    tracked.last_seen = now;
                    tracked.peer = peer;
                }
                self.ensure_beacon(addr, location, now);
            }
            // Let the timeout or the pending fade run its course
            (Some(_), false) => {
                if let Some(tracked) = self.peers.get_mut(&peer.addr) {
                    tracked.peer = peer;
                }
            }
        }
    }

    fn track_peer(&mut self, peer: Peer, now: Instant) {
        let location = peer.info.location();
        if !location.is_valid() {
            self.stats.dropped += 1;
            return;
        }

        let country = self
            .globe
            .country_at(location)
            .map(str::to_string)
            .or_else(|| (!peer.info.country_code.is_empty()).then(|| peer.info.country_code.clone()));
        if let Some(code) = &country {
            self.globe.select_country(code, self.config.highlight, now);
        }

        self.stats.last_event = Some(format!("peer {}", peer.addr));
        self.ensure_beacon(peer.addr, location, now);
        self.peers.insert(
            peer.addr,
            TrackedPeer {
                peer,
                country,
                last_seen: now,
                expiring: false,
            },
        );
    }

    /// Refresh the beacon at `addr`, growing a new one if needed.
    fn ensure_beacon(&mut self, addr: IpAddr, location: GeoCoordinate, now: Instant) {
        if let Some(marker) = self.beacons.get_mut(&addr) {
            if !marker.beacon.is_retiring() {
                marker.last_activity = now;
                return;
            }
        }
        // An expired peer does not own the replacement beacon
        if self.peers.get(&addr).is_some_and(|p| p.expiring) {
            self.peers.remove(&addr);
        }
        let mut beacon = Beacon::new(surface(location), self.config.beacon_height);
        beacon.fade_in();
        self.beacons.insert(
            addr,
            Marker {
                beacon,
                last_activity: now,
            },
        );
    }

    /// Advance every animation to `now`.
    pub fn tick(&mut self, now: Instant) {
        self.tick_traces(now);
        self.expire_peers(now);
        self.tick_beacons(now);
        self.globe.tick(now);
    }

    fn tick_traces(&mut self, now: Instant) {
        let traces = std::mem::take(&mut self.traces);
        let mut alive = Vec::with_capacity(traces.len());

        for mut active in traces {
            if !active.trace.tick(now).is_finished() {
                alive.push(active);
                continue;
            }
            match active.phase {
                TracePhase::FadingIn => {
                    self.ensure_beacon(active.dst_addr, active.dst, now);
                    active.trace.fade_out(now, self.config.trace_duration);
                    active.phase = TracePhase::FadingOut;
                    alive.push(active);
                }
                TracePhase::FadingOut => {
                    self.globe.unselect_region(
                        active.dst,
                        self.config.region_radius_deg,
                        self.config.highlight,
                        now,
                    );
                }
            }
        }

        self.traces = alive;
    }

    fn expire_peers(&mut self, now: Instant) {
        let timeout = self.config.peer_timeout;
        for (addr, tracked) in &mut self.peers {
            if tracked.expiring || now.saturating_duration_since(tracked.last_seen) < timeout {
                continue;
            }
            log::debug!("Peer {addr} timed out");
            tracked.expiring = true;
            if let Some(code) = &tracked.country {
                self.globe.unselect_country(code, self.config.highlight, now);
            }
            if let Some(marker) = self.beacons.get_mut(addr) {
                marker.beacon.fade_out();
            }
        }

        let beacons = &self.beacons;
        self.peers.retain(|addr, tracked| {
            !tracked.expiring || beacons.get(addr).is_some_and(|m| !m.beacon.is_gone())
        });
    }

    fn tick_beacons(&mut self, now: Instant) {
        let timeout = self.config.peer_timeout;
        for (addr, marker) in &mut self.beacons {
            // Live peer beacons are retired with their peer
            let idle = now.saturating_duration_since(marker.last_activity) >= timeout;
            let owned = self.peers.get(addr).is_some_and(|p| !p.expiring);
            if idle && !owned {
                marker.beacon.fade_out();
            }
            marker.beacon.tick();
        }
        self.beacons.retain(|_, marker| !marker.beacon.is_gone());
    }

    pub fn globe(&self) -> &Globe {
        &self.globe
    }

    pub fn countries(&self) -> &[CountryMesh] {
        &self.countries
    }

    pub fn beacons(&self) -> impl Iterator<Item = &Beacon> {
        self.beacons.values().map(|m| &m.beacon)
    }

    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter().map(|t| &t.trace)
    }

    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    pub fn beacon_count(&self) -> usize {
        self.beacons.len()
    }

    pub fn active_peers(&self) -> usize {
        self.peers.values().filter(|p| !p.expiring).count()
    }

    pub fn stats(&self) -> &SceneStats {
        &self.stats
    }
}
