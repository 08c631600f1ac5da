//! Event multiplexing: the bus, the event vocabulary, and the sinks it fans
//! out to.

mod bus;
mod event;
mod sink;

pub use bus::EventBus;
pub use event::{Event, PARTIAL_FANOUT_SCOPE, STREAM_END_SCOPE, Visibility};
pub use sink::{ChannelSink, EventSink, MemorySink, SinkError, StdOutSink};
