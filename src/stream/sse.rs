//! Server-sent events: line parser and reconnecting client

use super::Sink;
use crate::event::parse_event;
use std::io::{BufRead, BufReader};
use std::time::Duration;

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Unnamed events and `message` events carry scene updates
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Incremental parser fed one line at a time
#[derive(Debug, Default)]
pub struct SseParser {
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line without its terminator. A blank line dispatches.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    /// Flush a pending event at end of stream
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

/// Parse a complete SSE document into its message events.
pub fn parse_document(text: &str) -> Vec<SseEvent> {
    let mut parser = SseParser::new();
    let mut events: Vec<SseEvent> = text.lines().filter_map(|l| parser.feed_line(l)).collect();
    events.extend(parser.finish());
    events.retain(SseEvent::is_message);
    events
}

fn forward(sse: SseEvent, sink: &mut Sink) -> bool {
    if !sse.is_message() {
        log::trace!("Ignoring {:?} event", sse.event);
        return true;
    }
    match parse_event(&sse.data) {
        Ok(event) => sink.event(event),
        Err(e) => {
            log::warn!("Skipping malformed event: {e}");
            true
        }
    }
}

enum Outcome {
    Closed,
    /// The server asked us not to reconnect
    Done,
    Stopped,
}

fn stream_once(agent: &ureq::Agent, url: &str, parser: &mut SseParser, sink: &mut Sink) -> crate::error::Result<Outcome> {
    let mut request = agent
        .get(url)
        .set("Accept", "text/event-stream")
        .set("Cache-Control", "no-cache");
    if let Some(id) = parser.last_id() {
        request = request.set("Last-Event-ID", id);
    }

    let response = request.call()?;
    if response.status() == 204 {
        return Ok(Outcome::Done);
    }
    if !sink.connected(url) {
        return Ok(Outcome::Stopped);
    }

    let reader = BufReader::new(response.into_reader());
    for line in reader.lines() {
        let line = line?;
        if let Some(sse) = parser.feed_line(&line) {
            if !forward(sse, sink) {
                return Ok(Outcome::Stopped);
            }
        }
        if sink.is_stopped() {
            return Ok(Outcome::Stopped);
        }
    }
    if let Some(sse) = parser.finish() {
        forward(sse, sink);
    }
    Ok(Outcome::Closed)
}

/// Subscribe to `url`, reconnecting after each drop until stopped.
pub fn run(url: &str, reconnect: Duration, sink: &mut Sink) {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .build();
    let mut parser = SseParser::new();

    while !sink.is_stopped() {
        let reason = match stream_once(&agent, url, &mut parser, sink) {
            Ok(Outcome::Stopped) => return,
            Ok(Outcome::Done) => {
                log::info!("{url} returned 204, not reconnecting");
                sink.disconnected("closed by server");
                return;
            }
            Ok(Outcome::Closed) => "stream closed".to_string(),
            Err(e) => e.to_string(),
        };

        let delay = parser.retry().unwrap_or(reconnect);
        log::warn!("Event stream {url}: {reason}; reconnecting in {delay:?}");
        if !sink.disconnected(reason) || !sink.sleep(delay) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::stream::{EventFeed, StreamMessage};
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Instant;

    const PACKET: &str = r#"{"src_addr":"192.0.2.1","dst_addr":"192.0.2.2","src_location":{"lat":1,"lon":2},"dst_location":{"lat":3,"lon":4}}"#;

    fn feed(parser: &mut SseParser, text: &str) -> Vec<SseEvent> {
        text.lines().filter_map(|l| parser.feed_line(l)).collect()
    }

    #[test]
    fn dispatches_on_blank_line() {
        let mut parser = SseParser::new();
        let events = feed(&mut parser, "data: {\"a\":1}\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert!(events[0].is_message());
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn joins_multiline_data() {
        let mut parser = SseParser::new();
        let events = feed(&mut parser, "data: first\ndata:second\ndata\n\n");
        assert_eq!(events[0].data, "first\nsecond\n");
    }

    #[test]
    fn handles_fields_and_comments() {
        let mut parser = SseParser::new();
        let events = feed(
            &mut parser,
            ": keep-alive\r\nretry: 1500\r\nid: 7\r\nevent: ping\r\ndata: x\r\n\r\nretry: soon\n",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("ping"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert!(!events[0].is_message());
        assert_eq!(parser.retry(), Some(Duration::from_millis(1500)));
        assert_eq!(parser.last_id(), Some("7"));
    }

    #[test]
    fn event_name_resets_between_dispatches() {
        let mut parser = SseParser::new();
        let events = feed(&mut parser, "event: ping\n\ndata: y\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, None);
        assert_eq!(events[0].data, "y");
    }

    #[test]
    fn id_persists_across_events() {
        let mut parser = SseParser::new();
        let events = feed(&mut parser, "id: 1\ndata: a\n\ndata: b\n\n");
        assert_eq!(events[1].id.as_deref(), Some("1"));
    }

    #[test]
    fn finish_flushes_trailing_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed_line("data: tail").is_none());
        assert_eq!(parser.finish().map(|e| e.data), Some("tail".to_string()));
        assert!(parser.finish().is_none());
    }

    #[test]
    fn document_keeps_message_events_only() {
        let events = parse_document("event: status\ndata: up\n\ndata: 1\n\nevent: message\ndata: 2");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, ["1", "2"]);
    }

    /// Request line and headers, up to the blank line
    fn read_request(stream: &TcpStream) -> String {
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                return head;
            }
            head.push_str(&line);
        }
    }

    #[test]
    fn client_resumes_with_last_id_and_stops_on_204() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/events", listener.local_addr().unwrap());
        let first = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             : hello\nid: 7\nretry: 10\ndata: {PACKET}\n\n"
        );
        let responses = [
            first,
            "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        ];
        let server = thread::spawn(move || {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                requests.push(read_request(&stream));
                stream.write_all(response.as_bytes()).unwrap();
            }
            requests
        });

        let target = url.clone();
        let feed = EventFeed::spawn("sse", None, move |sink| {
            run(&target, Duration::from_secs(30), sink)
        })
        .unwrap();

        let done = StreamMessage::Disconnected("closed by server".into());
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut messages = Vec::new();
        while !messages.contains(&done) && Instant::now() < deadline {
            messages.extend(feed.drain());
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(messages.len(), 4, "{messages:?}");
        assert_eq!(messages[0], StreamMessage::Connected(url));
        match &messages[1] {
            StreamMessage::Event(Event::Raw(packet)) => {
                assert_eq!(packet.src_addr.to_string(), "192.0.2.1");
            }
            other => panic!("expected a packet, got {other:?}"),
        }
        assert_eq!(messages[2], StreamMessage::Disconnected("stream closed".into()));
        assert_eq!(messages[3], done);

        // The server's retry of 10 ms replaced the 30 s default
        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("GET /events "));
        assert!(!requests[0].to_ascii_lowercase().contains("last-event-id"));
        assert!(requests[1].to_ascii_lowercase().contains("last-event-id: 7"), "{}", requests[1]);
    }

    #[test]
    fn unreachable_server_reports_and_stops_on_drop() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/events");
        let feed = EventFeed::spawn("sse", None, move |sink| run(&url, Duration::from_secs(30), sink)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut messages = Vec::new();
        while messages.is_empty() && Instant::now() < deadline {
            messages.extend(feed.drain());
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(messages.first(), Some(StreamMessage::Disconnected(_))), "{messages:?}");
        feed.stop();
    }
}
