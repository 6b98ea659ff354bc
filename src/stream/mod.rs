//! Scene update sources
//!
//! Every source runs on its own worker thread and reports back over a
//! channel. Dropping the [`EventFeed`] raises the stop flag; workers check it
//! between reads and exit on their own.

pub mod demo;
pub mod local;
pub mod replay;
pub mod resolver;
pub mod sse;

use crate::config::{GlobeConfig, SourceKind, StreamConfig};
use crate::error::Result;
use crate::event::Event;
use crate::land::Atlas;
use resolver::{CountryCentres, Resolver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Granularity of interruptible sleeps
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Connected(String),
    Event(Event),
    Disconnected(String),
}

/// Worker-side handle: sends messages and watches the stop flag
pub struct Sink {
    tx: Sender<StreamMessage>,
    stop: Arc<AtomicBool>,
    resolver: Option<Resolver>,
}

impl Sink {
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn connected(&self, detail: impl Into<String>) -> bool {
        self.send(StreamMessage::Connected(detail.into()))
    }

    pub fn disconnected(&self, reason: impl Into<String>) -> bool {
        self.send(StreamMessage::Disconnected(reason.into()))
    }

    /// Fill in missing locations, then forward the event.
    pub fn event(&mut self, mut event: Event) -> bool {
        if let Some(resolver) = self.resolver.as_mut() {
            resolver.resolve(&mut event);
        }
        self.send(StreamMessage::Event(event))
    }

    pub fn resolver(&mut self) -> Option<&mut Resolver> {
        self.resolver.as_mut()
    }

    /// Sleep for `duration` unless stopped first. Returns false once stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.is_stopped() {
                return false;
            }
            let step = remaining.min(STOP_POLL);
            thread::sleep(step);
            remaining -= step;
        }
        !self.is_stopped()
    }

    fn send(&self, message: StreamMessage) -> bool {
        if self.is_stopped() {
            return false;
        }
        if self.tx.send(message).is_err() {
            // Receiver is gone
            self.stop.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }
}

/// Receiving end of a running source
pub struct EventFeed {
    name: &'static str,
    receiver: Receiver<StreamMessage>,
    stop: Arc<AtomicBool>,
}

impl EventFeed {
    /// Run `worker` on a named thread with a fresh channel.
    pub fn spawn<F>(name: &'static str, resolver: Option<Resolver>, worker: F) -> Result<Self>
    where
        F: FnOnce(&mut Sink) + Send + 'static,
    {
        let (tx, receiver) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let mut sink = Sink {
            tx,
            stop: stop.clone(),
            resolver,
        };

        thread::Builder::new()
            .name(format!("netglobe-{name}"))
            .spawn(move || {
                log::debug!("{name} source started");
                worker(&mut sink);
                log::debug!("{name} source stopped");
            })?;

        Ok(Self { name, receiver, stop })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Every message received since the last call
    pub fn drain(&self) -> Vec<StreamMessage> {
        let mut messages = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the configured source.
pub fn open(stream: &StreamConfig, globe: &GlobeConfig, atlas: &Atlas) -> Result<EventFeed> {
    // The built-in layer holds continents, so only a countries file has centres
    let centres = match globe.countries {
        Some(_) => CountryCentres::from_atlas(atlas),
        None => CountryCentres::default(),
    };
    let resolver = Resolver::open(globe.geoip_db.as_deref(), centres);
    match stream.source {
        SourceKind::Sse => {
            let url = stream.url.clone();
            let reconnect = stream.reconnect;
            log::info!("Subscribing to {url}");
            EventFeed::spawn("sse", resolver, move |sink| sse::run(&url, reconnect, sink))
        }
        SourceKind::Local => {
            let Some(resolver) = resolver else {
                return Err(local::missing_database());
            };
            let home = globe.home;
            EventFeed::spawn("local", Some(resolver), move |sink| local::run(home, sink))
        }
        SourceKind::Demo => {
            let generator = demo::DemoGenerator::new(stream.seed);
            EventFeed::spawn("demo", None, move |sink| demo::run(generator, sink))
        }
        SourceKind::Replay => {
            let events = replay::load(stream.file.as_deref())?;
            let interval = stream.replay_interval;
            EventFeed::spawn("replay", resolver, move |sink| replay::run(events, interval, sink))
        }
    }
}
