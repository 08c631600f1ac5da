//! Destinations events are fanned out to by the bus listener.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::event::Event;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink output disconnected")]
    Disconnected,
    #[error("sink serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One destination for events. Sinks observe every event the bus dispatches,
/// including diagnostics; filtering is each sink's own concern.
pub trait EventSink: Send {
    fn handle(&mut self, event: &Event) -> Result<(), SinkError>;
}

/// Prints events as compact JSON lines. Handy in demos.
#[derive(Default)]
pub struct StdOutSink;

impl EventSink for StdOutSink {
    fn handle(&mut self, event: &Event) -> Result<(), SinkError> {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    }
}

/// Collects events in memory for later inspection. Clones share the buffer,
/// so keep one clone outside the bus to read what the listener captured.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Forwards events into a flume channel, bridging the bus to another
/// consumer (the session service's protocol encoder uses this shape).
pub struct ChannelSink {
    sender: flume::Sender<Event>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: flume::Sender<Event>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &Event) -> Result<(), SinkError> {
        self.sender
            .send(event.clone())
            .map_err(|_| SinkError::Disconnected)
    }
}
