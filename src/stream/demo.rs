//! Synthetic traffic between world cities

use super::Sink;
use crate::event::{Direction, Event, LocationDetails, Packet, Peer, PeerInfo};
use crate::geo::GeoCoordinate;
use rand::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, SystemTime};

pub struct City {
    pub name: &'static str,
    pub lat: f32,
    pub lon: f32,
}

pub const CITIES: &[City] = &[
    // North America
    City { name: "New York", lat: 40.7, lon: -74.0 },
    City { name: "Los Angeles", lat: 34.1, lon: -118.2 },
    City { name: "Chicago", lat: 41.9, lon: -87.6 },
    City { name: "Houston", lat: 29.8, lon: -95.4 },
    City { name: "Phoenix", lat: 33.4, lon: -112.1 },
    City { name: "San Francisco", lat: 37.8, lon: -122.4 },
    City { name: "Seattle", lat: 47.6, lon: -122.3 },
    City { name: "Toronto", lat: 43.7, lon: -79.4 },
    City { name: "Montreal", lat: 45.5, lon: -73.6 },
    City { name: "Mexico City", lat: 19.4, lon: -99.1 },
    // South America
    City { name: "Sao Paulo", lat: -23.5, lon: -46.6 },
    City { name: "Rio de Janeiro", lat: -22.9, lon: -43.2 },
    City { name: "Buenos Aires", lat: -34.6, lon: -58.4 },
    City { name: "Santiago", lat: -33.4, lon: -70.6 },
    City { name: "Lima", lat: -12.0, lon: -77.0 },
    City { name: "Bogota", lat: 4.7, lon: -74.1 },
    // Europe
    City { name: "London", lat: 51.5, lon: -0.1 },
    City { name: "Paris", lat: 48.9, lon: 2.3 },
    City { name: "Berlin", lat: 52.5, lon: 13.4 },
    City { name: "Rome", lat: 41.9, lon: 12.5 },
    City { name: "Madrid", lat: 40.4, lon: -3.7 },
    City { name: "Amsterdam", lat: 52.4, lon: 4.9 },
    City { name: "Oslo", lat: 59.9, lon: 10.8 },
    City { name: "Stockholm", lat: 59.3, lon: 18.1 },
    City { name: "Moscow", lat: 55.8, lon: 37.6 },
    City { name: "Prague", lat: 50.1, lon: 14.4 },
    City { name: "Vienna", lat: 48.2, lon: 16.4 },
    City { name: "Istanbul", lat: 41.0, lon: 29.0 },
    // Africa
    City { name: "Cairo", lat: 30.0, lon: 31.2 },
    City { name: "Cape Town", lat: -33.9, lon: 18.4 },
    City { name: "Nairobi", lat: -1.3, lon: 36.8 },
    City { name: "Lagos", lat: 6.5, lon: 3.4 },
    City { name: "Casablanca", lat: 33.6, lon: -7.6 },
    City { name: "Johannesburg", lat: -26.2, lon: 28.0 },
    // Asia
    City { name: "Tokyo", lat: 35.7, lon: 139.7 },
    City { name: "Shanghai", lat: 31.2, lon: 121.5 },
    City { name: "Beijing", lat: 39.9, lon: 116.4 },
    City { name: "Hong Kong", lat: 22.3, lon: 114.2 },
    City { name: "Singapore", lat: 1.4, lon: 103.8 },
    City { name: "Seoul", lat: 37.6, lon: 127.0 },
    City { name: "Bangkok", lat: 13.8, lon: 100.5 },
    City { name: "Delhi", lat: 28.6, lon: 77.2 },
    City { name: "Mumbai", lat: 19.1, lon: 72.9 },
    City { name: "Taipei", lat: 25.0, lon: 121.5 },
    City { name: "Manila", lat: 14.6, lon: 121.0 },
    City { name: "Jakarta", lat: -6.2, lon: 106.8 },
    City { name: "Dubai", lat: 25.3, lon: 55.3 },
    City { name: "Tel Aviv", lat: 32.1, lon: 34.8 },
    // Oceania
    City { name: "Sydney", lat: -33.9, lon: 151.2 },
    City { name: "Melbourne", lat: -37.8, lon: 145.0 },
    City { name: "Auckland", lat: -36.8, lon: 174.8 },
    City { name: "Brisbane", lat: -27.5, lon: 153.0 },
];

/// Share of events that are peer updates rather than packets
const PEER_PROBABILITY: f64 = 0.1;

impl City {
    pub fn location(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.lat, self.lon)
    }
}

/// Stable documentation-range address per city (TEST-NET-3)
fn city_addr(index: usize) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(203, 0, 113, index as u8 + 1))
}

pub struct DemoGenerator {
    rng: StdRng,
}

impl DemoGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Pause before the next event
    pub fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(150..900))
    }

    pub fn next_event(&mut self, now: SystemTime) -> Event {
        if self.rng.gen_bool(PEER_PROBABILITY) {
            Event::Peer { peer: self.peer(now) }
        } else {
            Event::Packet { packet: self.packet(now) }
        }
    }

    fn packet(&mut self, now: SystemTime) -> Packet {
        let src = self.rng.gen_range(0..CITIES.len());
        let mut dst = self.rng.gen_range(0..CITIES.len() - 1);
        if dst >= src {
            dst += 1;
        }
        let (proto, port) = if self.rng.gen_bool(0.8) { ("Tcp", 443) } else { ("Udp", 53) };

        Packet {
            proto: Some(proto.to_string()),
            src_addr: city_addr(src),
            dst_addr: city_addr(dst),
            src_location: Some(CITIES[src].location()),
            dst_location: Some(CITIES[dst].location()),
            src_port: Some(self.rng.gen_range(32768..61000)),
            dst_port: Some(port),
            bytes: self.rng.gen_range(64..1500),
            direction: Some(if self.rng.gen_bool(0.5) { Direction::Egress } else { Direction::Ingress }),
            pid: None,
            timestamp: Some(now),
        }
    }

    fn peer(&mut self, now: SystemTime) -> Peer {
        let index = self.rng.gen_range(0..CITIES.len());
        let city = &CITIES[index];
        Peer {
            addr: city_addr(index),
            info: PeerInfo {
                lat: city.lat,
                lon: city.lon,
                country_code: String::new(),
                details: LocationDetails::City {
                    city_name: city.name.to_string(),
                    accuracy_radius: 20,
                },
            },
            ingress_bytes: self.rng.gen_range(0..1 << 20),
            egress_bytes: self.rng.gen_range(0..1 << 20),
            last_message: now,
        }
    }
}

pub fn run(mut generator: DemoGenerator, sink: &mut Sink) {
    if !sink.connected(format!("demo, {} cities", CITIES.len())) {
        return;
    }
    loop {
        let event = generator.next_event(SystemTime::now());
        if !sink.event(event) {
            return;
        }
        let delay = generator.next_delay();
        if !sink.sleep(delay) {
            return;
        }
    }
}
