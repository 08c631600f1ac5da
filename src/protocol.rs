//! The boundary protocol: newline-delimited discriminated JSON records.
//!
//! One execution is one streamed session. The server side emits
//! [`ClientRecord`]s — `state`, `message_chunk`, `loading`, `interrupt` —
//! and the client side sends [`ClientSignal::Resume`] bound to its thread
//! identifier. Encoding happens at this seam, and so does visibility
//! filtering: only [`Visibility::Public`] chunks ever become client records;
//! private fragments and internal diagnostics are dropped here.
//!
//! The transport itself (HTTP, WebSocket, a pipe) is an external
//! collaborator; anything that can carry lines of JSON can carry a session.

use serde::{Deserialize, Serialize};

use crate::events::{Event, Visibility};
use crate::state::StateRecord;

/// A server-to-client record.
///
/// ```
/// use rebook::protocol::ClientRecord;
///
/// let record = ClientRecord::Loading { message: "Loading your calendar…".into() };
/// let line = record.ndjson_line().unwrap();
/// assert_eq!(line, "{\"type\":\"loading\",\"message\":\"Loading your calendar…\"}\n");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRecord {
    State {
        #[serde(flatten)]
        record: StateRecord,
    },
    MessageChunk {
        id: String,
        content: String,
    },
    Loading {
        message: String,
    },
    Interrupt {
        id: String,
        value: String,
    },
}

impl ClientRecord {
    /// Encode a bus event, or `None` for events that never cross the
    /// boundary (private chunks, diagnostics).
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::State { record } => Some(ClientRecord::State {
                record: record.clone(),
            }),
            Event::MessageChunk {
                id,
                content,
                visibility: Visibility::Public,
            } => Some(ClientRecord::MessageChunk {
                id: id.clone(),
                content: content.clone(),
            }),
            Event::MessageChunk {
                visibility: Visibility::Private,
                ..
            } => None,
            Event::Loading { message } => Some(ClientRecord::Loading {
                message: message.clone(),
            }),
            Event::Interrupt { id, value } => Some(ClientRecord::Interrupt {
                id: id.clone(),
                value: value.clone(),
            }),
            Event::Diagnostic { .. } => None,
        }
    }

    /// One wire line, newline included.
    pub fn ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// A client-to-server record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientSignal {
    /// Answer the pending interrupt `id` with `value`.
    Resume {
        id: String,
        value: serde_json::Value,
    },
}

impl ClientSignal {
    /// Parse one wire line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn private_chunks_are_dropped() {
        let public = Event::public_chunk("m1", "hello");
        let private = Event::private_chunk("m1", "internal reasoning");
        assert!(ClientRecord::from_event(&public).is_some());
        assert!(ClientRecord::from_event(&private).is_none());
    }

    #[test]
    fn diagnostics_never_reach_the_client() {
        assert!(ClientRecord::from_event(&Event::stream_end()).is_none());
        assert!(ClientRecord::from_event(&Event::diagnostic("scope", "msg")).is_none());
    }

    #[test]
    fn resume_round_trips() {
        let signal = ClientSignal::Resume {
            id: "confirm_start".into(),
            value: json!("CONFIRMED"),
        };
        let line = serde_json::to_string(&signal).unwrap();
        assert_eq!(
            line,
            "{\"type\":\"resume\",\"id\":\"confirm_start\",\"value\":\"CONFIRMED\"}"
        );
        assert_eq!(ClientSignal::parse(&line).unwrap(), signal);
    }

    #[test]
    fn interrupt_record_tag() {
        let record = ClientRecord::Interrupt {
            id: "confirm_start".into(),
            value: "Do you want to start?".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "interrupt");
        assert_eq!(json["id"], "confirm_start");
    }
}
