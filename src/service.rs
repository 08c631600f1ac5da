//! Session service: the surface a transport layer mounts.
//!
//! One call to [`WorkflowService::start`] or [`WorkflowService::resume`] is
//! one streamed session: a background task drives the executor, the run's
//! event bus encodes onto the session's record channel through a protocol
//! sink, and the returned [`SessionStream`] hands both the records and the
//! final outcome back to the caller.
//!
//! Thread identifiers are client-supplied opaque strings (UUIDs in
//! practice), scoping one checkpoint lifetime each.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::domain::Collaborators;
use crate::events::{Event, EventBus, EventSink, SinkError};
use crate::graphs::WorkflowGraph;
use crate::protocol::ClientRecord;
use crate::runtime::{CheckpointError, Checkpointer, Executor, RunOutcome, RunnerError};
use crate::state::StateRecord;

/// Client-visible session errors, plus everything the runtime can surface.
#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    /// No suspended run under that thread identifier. Never silently starts
    /// a new run.
    #[error("no such session: {thread_id}")]
    #[diagnostic(code(rebook::service::thread_not_found))]
    ThreadNotFound { thread_id: String },

    /// The resume signal names an interrupt that is not the pending one.
    /// The checkpoint is untouched.
    #[error("resume targets interrupt `{got}`, but `{expected}` is pending")]
    #[diagnostic(
        code(rebook::service::invalid_resume_target),
        help("Answer the interrupt id the session most recently streamed.")
    )]
    InvalidResumeTarget { expected: String, got: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// One streamed session.
#[derive(Debug)]
pub struct SessionStream {
    /// Records in emission order; closes when the run is done.
    pub records: flume::Receiver<ClientRecord>,
    /// Resolves to the run's outcome once the stream has closed.
    pub outcome: JoinHandle<Result<RunOutcome, ServiceError>>,
}

/// Wiring for one session: the executor, its event channel, the bus listener
/// task, and the record stream handed back to the caller.
struct SessionParts {
    executor: Executor,
    emitter: flume::Sender<Event>,
    listener: JoinHandle<()>,
    records: flume::Receiver<ClientRecord>,
}

/// Encodes bus events into client records, dropping whatever must not cross
/// the boundary.
struct ProtocolSink {
    out: flume::Sender<ClientRecord>,
}

impl EventSink for ProtocolSink {
    fn handle(&mut self, event: &Event) -> Result<(), SinkError> {
        match ClientRecord::from_event(event) {
            Some(record) => self.out.send(record).map_err(|_| SinkError::Disconnected),
            None => Ok(()),
        }
    }
}

/// Mounts one compiled workflow for streamed, resumable sessions.
pub struct WorkflowService {
    graph: Arc<WorkflowGraph>,
    collaborators: Arc<Collaborators>,
    checkpointer: Arc<dyn Checkpointer>,
}

impl WorkflowService {
    #[must_use]
    pub fn new(
        graph: Arc<WorkflowGraph>,
        collaborators: Arc<Collaborators>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        Self {
            graph,
            collaborators,
            checkpointer,
        }
    }

    fn session_parts(&self, thread_id: &str) -> SessionParts {
        let (records_tx, records_rx) = flume::unbounded();
        let bus = EventBus::new().with_sink(Box::new(ProtocolSink { out: records_tx }));
        let emitter = bus.sender();
        let listener = tokio::spawn(bus.listen());
        let executor = Executor::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.collaborators),
            Arc::clone(&self.checkpointer),
            emitter.clone(),
            thread_id,
        );
        SessionParts {
            executor,
            emitter,
            listener,
            records: records_rx,
        }
    }

    /// Begin a fresh session for `thread_id` with the given seed record.
    #[instrument(skip(self, seed))]
    pub fn start(&self, thread_id: &str, seed: StateRecord) -> SessionStream {
        let SessionParts {
            executor,
            emitter,
            listener,
            records,
        } = self.session_parts(thread_id);
        let outcome = tokio::spawn(async move {
            let result = executor.start(seed).await;
            let _ = emitter.send(Event::stream_end());
            let _ = listener.await;
            result.map_err(ServiceError::from)
        });
        SessionStream { records, outcome }
    }

    /// Resume the suspended session `thread_id`, answering interrupt `id`
    /// with `value`.
    ///
    /// An unknown thread fails with [`ServiceError::ThreadNotFound`]; an `id`
    /// not matching the pending interrupt fails with
    /// [`ServiceError::InvalidResumeTarget`]. Neither mutates the checkpoint.
    /// If the paused step rejects the value, the same interrupt is streamed
    /// again and the session ends with the step's error; the checkpoint
    /// stays in place for another attempt.
    #[instrument(skip(self, value))]
    pub async fn resume(
        &self,
        thread_id: &str,
        id: &str,
        value: serde_json::Value,
    ) -> Result<SessionStream, ServiceError> {
        let checkpoint = self.checkpointer.load(thread_id).await.map_err(|err| {
            match err {
                CheckpointError::ThreadNotFound { thread_id } => {
                    ServiceError::ThreadNotFound { thread_id }
                }
                other => ServiceError::Checkpoint(other),
            }
        })?;
        if checkpoint.interrupt.id != id {
            return Err(ServiceError::InvalidResumeTarget {
                expected: checkpoint.interrupt.id,
                got: id.to_string(),
            });
        }

        let SessionParts {
            executor,
            emitter,
            listener,
            records,
        } = self.session_parts(thread_id);
        let pending = checkpoint.interrupt.clone();
        let outcome = tokio::spawn(async move {
            let result = executor.resume(checkpoint, value).await;
            if let Err(err) = &result
                && err.is_invalid_resume_value()
            {
                let _ = emitter.send(Event::interrupt(pending.id, pending.prompt));
            }
            let _ = emitter.send(Event::stream_end());
            let _ = listener.await;
            result.map_err(ServiceError::from)
        });
        Ok(SessionStream { records, outcome })
    }
}
