//! Signals produced during one workflow execution.
//!
//! Four logically concurrent sources feed the bus: full state snapshots after
//! each step, incremental text chunks, loading indicators, and interrupts.
//! Emission order is preserved per source by the underlying channel; no total
//! order is imposed across sources beyond causal step ordering.

use serde::{Deserialize, Serialize};

use crate::state::StateRecord;

/// Scope of the terminal diagnostic closing a run's stream.
pub const STREAM_END_SCOPE: &str = "stream_end";

/// Scope of the diagnostic reporting partially failed fan-out branches.
pub const PARTIAL_FANOUT_SCOPE: &str = "partial_fanout_failure";

/// Who is allowed to see a message chunk.
///
/// Private chunks carry internal reasoning traces; the protocol encoder drops
/// them before anything reaches the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// One signal on the event bus.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Full state snapshot emitted after a step completes.
    State { record: StateRecord },
    /// Incremental text fragment, grouped by `id`.
    MessageChunk {
        id: String,
        content: String,
        visibility: Visibility,
    },
    /// Progress indicator shown while a slow collaborator call runs.
    Loading { message: String },
    /// Suspension point awaiting an external decision.
    Interrupt { id: String, value: String },
    /// Out-of-band information for operators and sinks, never forwarded to
    /// clients.
    Diagnostic { scope: String, message: String },
}

impl Event {
    pub fn state(record: StateRecord) -> Self {
        Event::State { record }
    }

    pub fn public_chunk(id: impl Into<String>, content: impl Into<String>) -> Self {
        Event::MessageChunk {
            id: id.into(),
            content: content.into(),
            visibility: Visibility::Public,
        }
    }

    pub fn private_chunk(id: impl Into<String>, content: impl Into<String>) -> Self {
        Event::MessageChunk {
            id: id.into(),
            content: content.into(),
            visibility: Visibility::Private,
        }
    }

    pub fn loading(message: impl Into<String>) -> Self {
        Event::Loading {
            message: message.into(),
        }
    }

    pub fn interrupt(id: impl Into<String>, value: impl Into<String>) -> Self {
        Event::Interrupt {
            id: id.into(),
            value: value.into(),
        }
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic {
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// Terminal marker telling listeners the run produced everything it will.
    pub fn stream_end() -> Self {
        Event::Diagnostic {
            scope: STREAM_END_SCOPE.to_string(),
            message: String::new(),
        }
    }

    pub fn is_stream_end(&self) -> bool {
        matches!(self, Event::Diagnostic { scope, .. } if scope == STREAM_END_SCOPE)
    }
}
