//! The multiplexer: one unbounded channel merging every signal source of a
//! run, drained by a background listener that fans out to sinks.
//!
//! Producers (steps, the executor, fan-out branches) share clones of the
//! bus's [`flume::Sender`]. The channel preserves per-producer emission
//! order; the listener dispatches strictly in arrival order and stops after
//! the terminal [`Event::stream_end`] marker (or when every sender is gone).

use tracing::warn;

use super::event::Event;
use super::sink::EventSink;

pub struct EventBus {
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            sinks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Handle producers use to emit onto this bus.
    #[must_use]
    pub fn sender(&self) -> flume::Sender<Event> {
        self.sender.clone()
    }

    /// Drain the bus, dispatching each event to every sink in order.
    ///
    /// Consumes the bus; run it on its own task. A failing sink is logged
    /// and skipped for that event, it never blocks the others. Returns once
    /// the stream-end marker has been dispatched or all senders dropped.
    pub async fn listen(mut self) {
        // The bus's own sender must not keep the channel alive.
        drop(self.sender);
        while let Ok(event) = self.receiver.recv_async().await {
            let stream_end = event.is_stream_end();
            for sink in &mut self.sinks {
                if let Err(err) = sink.handle(&event) {
                    warn!(error = %err, "event sink failed; dropping event for that sink");
                }
            }
            if stream_end {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::sink::MemorySink;

    #[tokio::test]
    async fn dispatches_in_order_and_stops_on_stream_end() {
        let sink = MemorySink::new();
        let bus = EventBus::new().with_sink(Box::new(sink.clone()));
        let sender = bus.sender();

        sender.send(Event::loading("first")).unwrap();
        sender.send(Event::public_chunk("m1", "second")).unwrap();
        sender.send(Event::stream_end()).unwrap();
        sender.send(Event::loading("after end")).unwrap();

        bus.listen().await;

        let seen = sink.snapshot();
        assert_eq!(seen.len(), 3);
        assert!(matches!(&seen[0], Event::Loading { message } if message == "first"));
        assert!(seen[2].is_stream_end());
    }
}
