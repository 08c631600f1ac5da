//! Suspend/resume persistence: at-most-one live checkpoint per thread.
//!
//! A checkpoint is written the moment a step suspends and rewritten on every
//! later suspension of the same thread; it is cleared when the run reaches
//! the terminal step. Loading an unknown thread is a client-visible error,
//! never the silent start of a fresh run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::StateRecord;

/// The interrupt a suspended thread is waiting on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    /// Stable identifier the resume signal must match.
    pub id: String,
    /// Prompt shown to the user.
    pub prompt: String,
}

/// Paused execution position plus the full state needed to continue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    /// Step that suspended; resume re-runs it with the supplied value.
    pub paused_at: String,
    pub state: StateRecord,
    pub interrupt: PendingInterrupt,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(
        thread_id: impl Into<String>,
        paused_at: impl Into<String>,
        state: StateRecord,
        interrupt: PendingInterrupt,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            paused_at: paused_at.into(),
            state,
            interrupt,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    /// No live checkpoint for the requested thread.
    #[error("no suspended run for thread `{thread_id}`")]
    #[diagnostic(
        code(rebook::checkpoint::thread_not_found),
        help("The thread either never suspended or already ran to completion.")
    )]
    ThreadNotFound { thread_id: String },

    #[error("checkpoint storage failed: {message}")]
    #[diagnostic(code(rebook::checkpoint::storage))]
    Storage { message: String },

    #[error(transparent)]
    #[diagnostic(code(rebook::checkpoint::serde_json))]
    Serde(#[from] serde_json::Error),
}

/// Persistence seam for suspended runs.
///
/// `save` overwrites any earlier checkpoint for the same thread; `clear` is
/// idempotent so the executor can call it unconditionally at the terminal
/// step.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    async fn load(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError>;

    async fn clear(&self, thread_id: &str) -> Result<(), CheckpointError>;
}

/// Process-local checkpoint store. The default for tests and demos.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    slots: Mutex<FxHashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        self.slots
            .lock()
            .insert(checkpoint.thread_id.clone(), checkpoint);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError> {
        self.slots
            .lock()
            .get(thread_id)
            .cloned()
            .ok_or_else(|| CheckpointError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })
    }

    async fn clear(&self, thread_id: &str) -> Result<(), CheckpointError> {
        self.slots.lock().remove(thread_id);
        Ok(())
    }
}
