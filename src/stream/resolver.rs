//! GeoIP lookups for events that arrive without coordinates
//!
//! Uses a MaxMind GeoLite2 City database. Records without a usable city
//! location are placed at the centre of their registered country, when the
//! loaded countries file has that country.

use crate::error::Result;
use crate::event::{Event, LocationDetails, Packet, Peer};
use crate::geo::GeoCoordinate;
use crate::land::Atlas;
use maxminddb::{geoip2, Reader};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

const CACHE_SIZE: usize = 1024;
const DATABASE_FILE: &str = "GeoLite2-City.mmdb";

/// Where an address was placed
#[derive(Clone, Debug, PartialEq)]
pub struct Located {
    pub coord: GeoCoordinate,
    pub country_code: String,
    pub details: LocationDetails,
}

/// Country centres by ISO code
#[derive(Clone, Debug, Default)]
pub struct CountryCentres(HashMap<String, GeoCoordinate>);

impl CountryCentres {
    /// Generated `#n` codes are not ISO codes and are skipped.
    pub fn from_atlas(atlas: &Atlas) -> Self {
        Self(
            atlas
                .iter()
                .filter(|c| !c.code.starts_with('#'))
                .filter_map(|c| Some((c.code.clone(), c.centre()?)))
                .collect(),
        )
    }

    fn get(&self, code: &str) -> Option<GeoCoordinate> {
        self.0.get(code).copied()
    }
}

/// The parts of a City record used for placement
#[derive(Debug, Default)]
struct CityRecord {
    coord: Option<GeoCoordinate>,
    accuracy_radius: Option<u16>,
    city_name: Option<String>,
    country: Option<String>,
    registered_country: Option<String>,
}

impl CityRecord {
    fn read(city: geoip2::City) -> Self {
        let location = city.location.as_ref();
        Self {
            coord: location
                .and_then(|l| Some(GeoCoordinate::new(l.latitude? as f32, l.longitude? as f32))),
            accuracy_radius: location.and_then(|l| l.accuracy_radius),
            city_name: city
                .city
                .and_then(|c| c.names)
                .and_then(|names| names.get("en").map(|n| n.to_string())),
            country: city.country.and_then(|c| c.iso_code).map(str::to_string),
            registered_country: city.registered_country.and_then(|c| c.iso_code).map(str::to_string),
        }
    }

    /// City coordinates when usable, else the registered country's centre.
    fn place(self, centres: &CountryCentres) -> Option<Located> {
        if let Some(coord) = self.coord.filter(GeoCoordinate::is_valid) {
            return Some(Located {
                coord,
                country_code: self.country.or(self.registered_country).unwrap_or_default(),
                details: LocationDetails::City {
                    city_name: self.city_name.unwrap_or_default(),
                    accuracy_radius: self.accuracy_radius.unwrap_or(0),
                },
            });
        }

        let code = self.registered_country.or(self.country)?;
        let coord = centres.get(&code)?;
        Some(Located {
            coord,
            country_code: code,
            details: LocationDetails::RegisteredCountry,
        })
    }
}

/// Address to placement cache; the oldest entry goes first when full
struct LocationCache {
    entries: HashMap<IpAddr, Option<Located>>,
    order: VecDeque<IpAddr>,
    capacity: usize,
}

impl LocationCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn get_or_insert<F>(&mut self, ip: IpAddr, lookup: F) -> Option<Located>
    where
        F: FnOnce(IpAddr) -> Option<Located>,
    {
        if let Some(cached) = self.entries.get(&ip) {
            return cached.clone();
        }

        let result = lookup(ip);
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(ip);
        self.entries.insert(ip, result.clone());
        result
    }
}

pub struct Resolver {
    reader: Reader<Vec<u8>>,
    cache: LocationCache,
    centres: CountryCentres,
}

impl Resolver {
    pub fn from_path(path: &Path, centres: CountryCentres) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        log::info!(
            "Loaded GeoIP database {} ({})",
            path.display(),
            reader.metadata.database_type
        );
        Ok(Self {
            reader,
            cache: LocationCache::new(CACHE_SIZE),
            centres,
        })
    }

    /// Open the configured database, or the first one found in the usual places.
    pub fn open(explicit: Option<&Path>, centres: CountryCentres) -> Option<Self> {
        let path = find_database(explicit)?;
        match Self::from_path(&path, centres) {
            Ok(resolver) => Some(resolver),
            Err(e) => {
                log::warn!("Cannot open GeoIP database {}: {e}", path.display());
                None
            }
        }
    }

    /// Placement of a public address
    pub fn lookup(&mut self, ip: IpAddr) -> Option<Located> {
        if !is_public(ip) {
            return None;
        }
        let reader = &self.reader;
        let centres = &self.centres;
        self.cache
            .get_or_insert(ip, |ip| read_city(reader, ip)?.place(centres))
    }

    pub fn locate(&mut self, ip: IpAddr) -> Option<GeoCoordinate> {
        self.lookup(ip).map(|found| found.coord)
    }

    /// Fill in missing packet endpoints, peer locations and peer countries.
    pub fn resolve(&mut self, event: &mut Event) {
        match event {
            Event::Packet { packet } | Event::Raw(packet) => self.resolve_packet(packet),
            Event::Peer { peer } => fill_peer(peer, |ip| self.lookup(ip)),
        }
    }

    fn resolve_packet(&mut self, packet: &mut Packet) {
        if !packet.src_location.is_some_and(|c| c.is_valid()) {
            packet.src_location = self.locate(packet.src_addr);
        }
        if !packet.dst_location.is_some_and(|c| c.is_valid()) {
            packet.dst_location = self.locate(packet.dst_addr);
        }
    }
}

/// Complete a peer from `lookup`; values the peer already carries are kept.
fn fill_peer<F>(peer: &mut Peer, lookup: F)
where
    F: FnOnce(IpAddr) -> Option<Located>,
{
    let needs_location = !peer.info.location().is_valid();
    if !needs_location && !peer.info.country_code.is_empty() {
        return;
    }
    let Some(found) = lookup(peer.addr) else {
        return;
    };
    if needs_location {
        peer.info.lat = found.coord.lat;
        peer.info.lon = found.coord.lon;
        peer.info.details = found.details;
    }
    if peer.info.country_code.is_empty() {
        peer.info.country_code = found.country_code;
    }
}

fn read_city(reader: &Reader<Vec<u8>>, ip: IpAddr) -> Option<CityRecord> {
    match reader.lookup::<geoip2::City>(ip) {
        Ok(city) => Some(CityRecord::read(city)),
        Err(e) => {
            log::trace!("No GeoIP record for {ip}: {e}");
            None
        }
    }
}

/// Directories searched for the database, most specific first
fn search_dirs() -> Vec<PathBuf> {
    let mut places = Vec::new();
    places.extend(dirs::config_dir().map(|d| d.join("netglobe")));
    places.extend(dirs::data_dir().map(|d| d.join("netglobe")));
    places.extend(["/usr/local/share/GeoIP", "/usr/share/GeoIP", "/var/lib/GeoIP"].map(PathBuf::from));
    places.push(PathBuf::from("."));
    places
}

fn find_database(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        log::warn!("GeoIP database {} does not exist, searching", path.display());
    }
    search_dirs()
        .into_iter()
        .map(|dir| dir.join(DATABASE_FILE))
        .find(|path| path.is_file())
}

/// Routable on the public internet
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast()
                // 100.64.0.0/10 carrier-grade NAT
                || (octets[0] == 100 && (64..=127).contains(&octets[1])))
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7 unique local, fe80::/10 link local
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PeerInfo;
    use crate::land::Country;
    use std::cell::Cell;
    use std::time::SystemTime;

    fn centres() -> CountryCentres {
        let ring = vec![[0.0, 40.0], [8.0, 40.0], [8.0, 50.0], [0.0, 50.0], [0.0, 40.0]];
        CountryCentres::from_atlas(&Atlas::new(vec![
            Country::new("France", "FR", vec![vec![ring.clone()]]),
            Country::new("Land 1", "#1", vec![vec![ring]]),
        ]))
    }

    fn located(lat: f32, lon: f32) -> Located {
        Located {
            coord: GeoCoordinate::new(lat, lon),
            country_code: "US".into(),
            details: LocationDetails::Manual,
        }
    }

    #[test]
    fn public_address_filter() {
        for private in ["127.0.0.1", "10.1.2.3", "172.16.0.9", "192.168.1.1", "0.0.0.0", "100.64.0.1", "::1", "fe80::1", "fd00::5"] {
            assert!(!is_public(private.parse().unwrap()), "{private}");
        }
        for public in ["8.8.8.8", "1.1.1.1", "172.32.0.1", "2606:4700::1111"] {
            assert!(is_public(public.parse().unwrap()), "{public}");
        }
    }

    #[test]
    fn city_location_wins() {
        let record = CityRecord {
            coord: Some(GeoCoordinate::new(48.9, 2.3)),
            accuracy_radius: Some(20),
            city_name: Some("Paris".into()),
            country: Some("FR".into()),
            registered_country: Some("DE".into()),
        };
        let found = record.place(&centres()).unwrap();
        assert_eq!(found.coord, GeoCoordinate::new(48.9, 2.3));
        assert_eq!(found.country_code, "FR");
        assert_eq!(
            found.details,
            LocationDetails::City {
                city_name: "Paris".into(),
                accuracy_radius: 20
            }
        );
    }

    #[test]
    fn registered_country_places_at_its_centre() {
        let record = CityRecord {
            registered_country: Some("FR".into()),
            ..CityRecord::default()
        };
        let found = record.place(&centres()).unwrap();
        assert_eq!(found.country_code, "FR");
        assert_eq!(found.details, LocationDetails::RegisteredCountry);
        assert!((found.coord.lon - 4.0).abs() < 0.5, "{:?}", found.coord);
        assert!((found.coord.lat - 45.0).abs() < 1.0, "{:?}", found.coord);

        // Out of range city coordinates count as missing
        let record = CityRecord {
            coord: Some(GeoCoordinate::new(120.0, 0.0)),
            country: Some("FR".into()),
            ..CityRecord::default()
        };
        assert_eq!(record.place(&centres()).unwrap().details, LocationDetails::RegisteredCountry);
    }

    #[test]
    fn unknown_country_is_unplaced() {
        let record = CityRecord {
            registered_country: Some("ZZ".into()),
            ..CityRecord::default()
        };
        assert!(record.place(&centres()).is_none());
        assert!(CityRecord::default().place(&centres()).is_none());
        assert!(centres().get("#1").is_none());
    }

    #[test]
    fn peer_gets_missing_country_only() {
        let mut peer = Peer {
            addr: "203.0.113.5".parse().unwrap(),
            info: PeerInfo {
                lat: 10.0,
                lon: 20.0,
                country_code: String::new(),
                details: LocationDetails::Manual,
            },
            ingress_bytes: 0,
            egress_bytes: 0,
            last_message: SystemTime::now(),
        };
        fill_peer(&mut peer, |_| Some(located(37.4, -122.1)));
        assert_eq!(peer.info.country_code, "US");
        assert_eq!(peer.info.location(), GeoCoordinate::new(10.0, 20.0));

        // Complete peers are not looked up at all
        fill_peer(&mut peer, |_| panic!("no lookup expected"));
    }

    #[test]
    fn peer_without_location_is_placed() {
        let mut peer = Peer {
            addr: "203.0.113.5".parse().unwrap(),
            info: PeerInfo {
                lat: 95.0,
                lon: 0.0,
                country_code: "CA".into(),
                details: LocationDetails::Manual,
            },
            ingress_bytes: 0,
            egress_bytes: 0,
            last_message: SystemTime::now(),
        };
        fill_peer(&mut peer, |_| Some(located(37.4, -122.1)));
        assert_eq!(peer.info.location(), GeoCoordinate::new(37.4, -122.1));
        assert_eq!(peer.info.country_code, "CA");
    }

    #[test]
    fn cache_looks_up_once() {
        let mut cache = LocationCache::new(4);
        let calls = Cell::new(0);
        let ip: IpAddr = "8.8.8.8".parse().unwrap();
        let lookup = |_| {
            calls.set(calls.get() + 1);
            Some(located(37.4, -122.1))
        };
        assert_eq!(cache.get_or_insert(ip, lookup), Some(located(37.4, -122.1)));
        assert_eq!(cache.get_or_insert(ip, lookup), Some(located(37.4, -122.1)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cache_remembers_misses_and_drops_oldest() {
        let mut cache = LocationCache::new(3);
        for i in 0..3u8 {
            cache.get_or_insert(IpAddr::from([1, 1, 1, i]), |_| None);
        }
        cache.get_or_insert(IpAddr::from([1, 1, 1, 9]), |_| None);
        assert_eq!(cache.entries.len(), 3);
        assert!(!cache.entries.contains_key(&IpAddr::from([1, 1, 1, 0])));
        assert!(cache.entries.contains_key(&IpAddr::from([1, 1, 1, 1])));

        // A remembered miss is not looked up again
        cache.get_or_insert(IpAddr::from([1, 1, 1, 9]), |_| panic!("cached"));
    }

    #[test]
    fn explicit_database_path_is_preferred() {
        let path = std::env::temp_dir().join("netglobe-resolver-test.mmdb");
        std::fs::write(&path, b"not a database").unwrap();
        assert_eq!(find_database(Some(&path)), Some(path.clone()));
        // Present but unreadable
        assert!(Resolver::from_path(&path, CountryCentres::default()).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_explicit_database_is_not_found() {
        let path = Path::new("/nonexistent/netglobe/GeoLite2-City.mmdb");
        assert!(Resolver::from_path(path, CountryCentres::default()).is_err());
    }
}
