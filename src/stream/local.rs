//! Connections of this machine, read from /proc/net
//!
//! Each newly seen connection to a public peer becomes one packet event
//! between the home location and the peer's GeoIP location.

use super::Sink;
use crate::error::Error;
use crate::event::{Direction, Event, Packet};
use crate::geo::GeoCoordinate;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, SystemTime};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Local ports at or above this are ephemeral, so we opened the connection
const EPHEMERAL_PORT_START: u16 = 32768;

/// What a socket row says about its peer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Link {
    /// Handshake in progress or established
    Open,
    /// The peer is hanging up
    Closing,
}

impl Link {
    /// Kernel TCP state code from the `st` column. Listening, closed and
    /// unknown sockets have no peer worth drawing.
    fn from_tcp_state(code: &str) -> Option<Self> {
        match u8::from_str_radix(code, 16).ok()? {
            // ESTABLISHED, SYN_SENT, SYN_RECV
            0x01..=0x03 => Some(Link::Open),
            // FIN_WAIT1/2, TIME_WAIT, CLOSE_WAIT, LAST_ACK, CLOSING
            0x04..=0x06 | 0x08 | 0x09 | 0x0B => Some(Link::Closing),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn name(self) -> &'static str {
        match self {
            Protocol::Tcp => "Tcp",
            Protocol::Udp => "Udp",
        }
    }
}

/// One row of /proc/net/{tcp,udp}
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
    pub remote_ip: Ipv4Addr,
    pub remote_port: u16,
    pub link: Link,
    pub protocol: Protocol,
}

impl Connection {
    pub fn is_outbound(&self) -> bool {
        self.local_port >= EPHEMERAL_PORT_START
    }

    fn key(&self) -> (Ipv4Addr, u16, Protocol) {
        (self.remote_ip, self.remote_port, self.protocol)
    }

    /// Packet event oriented by direction
    pub fn to_packet(&self, home: GeoCoordinate, remote: GeoCoordinate) -> Packet {
        let local = (IpAddr::V4(self.local_ip), self.local_port, home);
        let remote = (IpAddr::V4(self.remote_ip), self.remote_port, remote);
        let (src, dst, direction) = if self.is_outbound() {
            (local, remote, Direction::Egress)
        } else {
            (remote, local, Direction::Ingress)
        };

        Packet {
            proto: Some(self.protocol.name().to_string()),
            src_addr: src.0,
            dst_addr: dst.0,
            src_location: Some(src.2),
            dst_location: Some(dst.2),
            src_port: Some(src.1),
            dst_port: Some(dst.1),
            bytes: 0,
            direction: Some(direction),
            pid: None,
            timestamp: Some(SystemTime::now()),
        }
    }
}

/// Parse hex IP from /proc/net format (little-endian)
fn parse_hex_ip(hex: &str) -> Option<Ipv4Addr> {
    let bytes = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(bytes.swap_bytes()))
}

fn parse_endpoint(field: &str) -> Option<(Ipv4Addr, u16)> {
    let (ip, port) = field.split_once(':')?;
    Some((parse_hex_ip(ip)?, u16::from_str_radix(port, 16).ok()?))
}

/// Connected, non-listening rows of a /proc/net table
pub fn parse_proc_net(content: &str, protocol: Protocol) -> Vec<Connection> {
    let mut connections = Vec::new();

    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }

        let Some((remote_ip, remote_port)) = parse_endpoint(parts[2]) else {
            continue;
        };
        if remote_ip.is_unspecified() {
            continue;
        }
        let Some((local_ip, local_port)) = parse_endpoint(parts[1]) else {
            continue;
        };

        let link = match protocol {
            Protocol::Tcp => Link::from_tcp_state(parts[3]),
            // Connectionless
            Protocol::Udp => Some(Link::Open),
        };
        let Some(link) = link else {
            continue;
        };

        connections.push(Connection {
            local_ip,
            local_port,
            remote_ip,
            remote_port,
            link,
            protocol,
        });
    }

    connections
}

/// Remembers connections across polls to report only new ones
#[derive(Default)]
pub struct ConnectionTracker {
    known: HashSet<(Ipv4Addr, u16, Protocol)>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections absent from the previous snapshot. Closed ones are forgotten.
    pub fn update(&mut self, snapshot: Vec<Connection>) -> Vec<Connection> {
        let current: HashSet<_> = snapshot.iter().map(Connection::key).collect();
        let fresh = snapshot
            .into_iter()
            .filter(|c| !self.known.contains(&c.key()))
            .collect();
        self.known = current;
        fresh
    }
}

fn read_snapshot() -> io::Result<Vec<Connection>> {
    let mut snapshot = parse_proc_net(&fs::read_to_string("/proc/net/tcp")?, Protocol::Tcp);
    snapshot.extend(parse_proc_net(&fs::read_to_string("/proc/net/udp")?, Protocol::Udp));
    Ok(snapshot)
}

#[derive(Deserialize)]
struct IpApiLocation {
    lat: f32,
    lon: f32,
}

/// Approximate location of this machine from its public address
fn fetch_home_location() -> Option<GeoCoordinate> {
    // ip-api's free tier is HTTP only
    let response = ureq::get("http://ip-api.com/json/?fields=lat,lon")
        .timeout(Duration::from_secs(3))
        .call();
    match response.map(|r| r.into_json::<IpApiLocation>()) {
        Ok(Ok(location)) => Some(GeoCoordinate::new(location.lat, location.lon)),
        Ok(Err(e)) => {
            log::warn!("Unexpected home location response: {e}");
            None
        }
        Err(e) => {
            log::warn!("Home location lookup failed: {e}");
            None
        }
    }
}

pub fn missing_database() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::NotFound,
        "the local source needs a GeoLite2 City database (--geoip-db)",
    ))
}

pub fn run(home: Option<GeoCoordinate>, sink: &mut Sink) {
    let home = home.or_else(fetch_home_location).unwrap_or_else(|| {
        log::warn!("Home location unknown, using 0,0");
        GeoCoordinate::default()
    });
    log::info!("Tracking local connections from {:.1},{:.1}", home.lat, home.lon);

    let mut tracker = ConnectionTracker::new();
    let mut connected = false;

    loop {
        match read_snapshot() {
            Ok(snapshot) => {
                if !connected {
                    connected = sink.connected("/proc/net");
                }
                for connection in tracker.update(snapshot) {
                    // Already hanging up when first seen
                    if connection.link == Link::Closing {
                        log::trace!("Skipping closing connection to {}", connection.remote_ip);
                        continue;
                    }
                    let remote = IpAddr::V4(connection.remote_ip);
                    let Some(location) = sink.resolver().and_then(|r| r.locate(remote)) else {
                        continue;
                    };
                    let packet = connection.to_packet(home, location);
                    if !sink.event(Event::Raw(packet)) {
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("Cannot read /proc/net: {e}");
                if connected && !sink.disconnected(e.to_string()) {
                    return;
                }
                connected = false;
            }
        }

        if !sink.sleep(POLL_INTERVAL) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_TABLE: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:0277 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1 1 0000000000000000 100 0 0 10 0
   1: 0F02000A:A3C2 08080808:01BB 01 00000000:00000000 00:00000000 00000000  1000        0 2 1 0000000000000000 20 4 30 10 -1
   2: 0F02000A:0016 0101A8C0:D431 01 00000000:00000000 00:00000000 00000000     0        0 3 1 0000000000000000 20 4 30 10 -1
   3: garbage";

    #[test]
    fn parses_established_rows() {
        let connections = parse_proc_net(TCP_TABLE, Protocol::Tcp);
        assert_eq!(connections.len(), 2);

        let outbound = &connections[0];
        assert_eq!(outbound.local_ip, Ipv4Addr::new(10, 0, 2, 15));
        assert_eq!(outbound.local_port, 0xA3C2);
        assert_eq!(outbound.remote_ip, Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(outbound.remote_port, 443);
        assert_eq!(outbound.link, Link::Open);
        assert!(outbound.is_outbound());

        let inbound = &connections[1];
        assert_eq!(inbound.remote_ip, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(inbound.local_port, 22);
        assert!(!inbound.is_outbound());
    }

    #[test]
    fn tcp_states_map_to_links() {
        assert_eq!(Link::from_tcp_state("01"), Some(Link::Open));
        assert_eq!(Link::from_tcp_state("02"), Some(Link::Open));
        assert_eq!(Link::from_tcp_state("06"), Some(Link::Closing));
        assert_eq!(Link::from_tcp_state("0B"), Some(Link::Closing));
        assert_eq!(Link::from_tcp_state("07"), None);
        assert_eq!(Link::from_tcp_state("0A"), None);
        assert_eq!(Link::from_tcp_state("zz"), None);
    }

    #[test]
    fn tracker_reports_new_connections_once() {
        let snapshot = parse_proc_net(TCP_TABLE, Protocol::Tcp);
        let mut tracker = ConnectionTracker::new();
        assert_eq!(tracker.update(snapshot.clone()).len(), 2);
        assert!(tracker.update(snapshot.clone()).is_empty());

        // Closed then reopened counts as new
        tracker.update(snapshot[..1].to_vec());
        assert_eq!(tracker.known.len(), 1);
        assert_eq!(tracker.update(snapshot).len(), 1);
    }

    #[test]
    fn packet_direction_follows_port() {
        let connections = parse_proc_net(TCP_TABLE, Protocol::Tcp);
        let home = GeoCoordinate::new(52.5, 13.4);
        let remote = GeoCoordinate::new(37.4, -122.1);

        let egress = connections[0].to_packet(home, remote);
        assert_eq!(egress.direction, Some(Direction::Egress));
        assert_eq!(egress.src_location, Some(home));
        assert_eq!(egress.dst_addr, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(egress.proto.as_deref(), Some("Tcp"));

        let ingress = connections[1].to_packet(home, remote);
        assert_eq!(ingress.direction, Some(Direction::Ingress));
        assert_eq!(ingress.src_location, Some(remote));
        assert_eq!(ingress.dst_location, Some(home));
    }
}
