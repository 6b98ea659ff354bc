//! Replay of recorded events
//!
//! Accepts either raw SSE text (`data:` lines) or newline-delimited JSON.

use super::sse::parse_document;
use super::Sink;
use crate::error::Result;
use crate::event::{parse_event, Event};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Parse recorded events, skipping malformed entries.
pub fn parse_recording(content: &str) -> Vec<Event> {
    let is_sse = content
        .lines()
        .map(str::trim_start)
        .any(|l| l.starts_with("data:"));

    let payloads: Vec<String> = if is_sse {
        parse_document(content).into_iter().map(|e| e.data).collect()
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    };

    payloads
        .iter()
        .enumerate()
        .filter_map(|(i, data)| match parse_event(data) {
            Ok(event) => Some(event),
            Err(e) => {
                log::warn!("Skipping recorded event {}: {e}", i + 1);
                None
            }
        })
        .collect()
}

pub fn load(path: Option<&Path>) -> Result<Vec<Event>> {
    let path = path.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "the replay source needs --file")
    })?;
    let events = parse_recording(&fs::read_to_string(path)?);
    log::info!("Loaded {} recorded events from {}", events.len(), path.display());
    Ok(events)
}

pub fn run(events: Vec<Event>, interval: Duration, sink: &mut Sink) {
    let total = events.len();
    if !sink.connected(format!("replay, {total} events")) {
        return;
    }
    for event in events {
        if !sink.event(event) || !sink.sleep(interval) {
            return;
        }
    }
    sink.disconnected("end of recording");
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: &str = r#"{"src_addr":"192.0.2.1","dst_addr":"192.0.2.2","src_location":{"lat":1,"lon":2},"dst_location":{"lat":3,"lon":4}}"#;

    #[test]
    fn reads_newline_delimited_json() {
        let content = format!("{PACKET}\n\n# comment\nnot json\n{{\"packet\":{PACKET}}}\n");
        let events = parse_recording(&content);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Raw(_)));
        assert!(matches!(events[1], Event::Packet { .. }));
    }

    #[test]
    fn reads_sse_capture() {
        let content = format!(": recorded\ndata: {PACKET}\n\nevent: status\ndata: up\n\ndata: {PACKET}\n\n");
        assert_eq!(parse_recording(&content).len(), 2);
    }

    #[test]
    fn missing_file_argument_is_an_error() {
        assert!(load(None).is_err());
        assert!(load(Some(Path::new("/nonexistent/recording.ndjson"))).is_err());
    }
}
