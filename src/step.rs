//! Step execution framework: the unit of work the workflow graph schedules.
//!
//! A [`Step`] receives the current [`StateRecord`] and an execution context,
//! and resolves to a [`StepOutcome`]: either a [`StepPartial`] to merge into
//! state, or a first-class `Suspended` variant asking for human input. The
//! driver pattern-matches on the outcome; suspension is never an error path.
//!
//! # Examples
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use rebook::state::StateRecord;
//! use rebook::step::{Step, StepContext, StepError, StepOutcome};
//!
//! struct Greeting;
//!
//! #[async_trait]
//! impl Step for Greeting {
//!     async fn run(
//!         &self,
//!         _state: &StateRecord,
//!         ctx: StepContext,
//!     ) -> Result<StepOutcome, StepError> {
//!         ctx.emit_public_chunk("greeting", "Hi! Let's look at your calendar.")?;
//!         Ok(StepOutcome::stay())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::domain::{Collaborators, ProviderError};
use crate::events::Event;
use crate::state::{SchemaViolation, Stage, StateRecord};

/// One unit of async work in the pipeline.
///
/// Steps are stateless: everything they need arrives through the state
/// record and the context. A step that wants external data calls a
/// collaborator from the context; a step that needs a human decision returns
/// [`StepOutcome::Suspended`] and, on re-entry, validates the resume value
/// itself.
#[async_trait]
pub trait Step: Send + Sync {
    /// State fields this step reads. Checked for satisfiability when the
    /// graph compiles.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Stage this step advances the record to, if any. Also feeds the
    /// compile-time dependency walk.
    fn produces(&self) -> Option<Stage> {
        None
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError>;
}

/// Execution context handed to each step invocation.
#[derive(Clone)]
pub struct StepContext {
    /// Name of the step being executed.
    pub step_name: String,
    /// Session/thread identifier scoping this execution.
    pub thread_id: String,
    /// Injected collaborator set.
    pub collaborators: Arc<Collaborators>,
    emitter: flume::Sender<Event>,
    resume: Option<serde_json::Value>,
}

impl StepContext {
    #[must_use]
    pub fn new(
        step_name: impl Into<String>,
        thread_id: impl Into<String>,
        collaborators: Arc<Collaborators>,
        emitter: flume::Sender<Event>,
        resume: Option<serde_json::Value>,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            thread_id: thread_id.into(),
            collaborators,
            emitter,
            resume,
        }
    }

    /// Emit an event onto the run's bus.
    pub fn emit(&self, event: Event) -> Result<(), EmitError> {
        self.emitter.send(event).map_err(|_| EmitError::BusClosed)
    }

    /// Emit a client-visible text fragment grouped under `id`.
    pub fn emit_public_chunk(&self, id: &str, content: &str) -> Result<(), EmitError> {
        self.emit(Event::public_chunk(id, content))
    }

    /// Emit an internal reasoning fragment; never forwarded to clients.
    pub fn emit_private_chunk(&self, id: &str, content: &str) -> Result<(), EmitError> {
        self.emit(Event::private_chunk(id, content))
    }

    /// Emit a progress indicator ahead of a slow collaborator call.
    pub fn emit_loading(&self, message: &str) -> Result<(), EmitError> {
        self.emit(Event::loading(message))
    }

    /// The value supplied by the matching resume signal, present only when
    /// this invocation re-enters a previously suspended step.
    pub fn resume_value(&self) -> Option<&serde_json::Value> {
        self.resume.as_ref()
    }
}

/// Result of running a step.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// The step finished and contributes `StepPartial` to the state.
    Completed(StepPartial),
    /// The step needs a human decision before it can finish. The driver
    /// checkpoints and halts; a resume signal carrying `id` re-runs the step
    /// with the supplied value.
    Suspended { prompt: String, id: String },
}

impl StepOutcome {
    /// Finish without touching the state. For purely emitting steps.
    #[must_use]
    pub fn stay() -> Self {
        StepOutcome::Completed(StepPartial::default())
    }

    /// Finish, advancing the record to `stage` with the given new fields.
    #[must_use]
    pub fn advance(stage: Stage, fields: FxHashMap<String, serde_json::Value>) -> Self {
        StepOutcome::Completed(StepPartial {
            advance_to: Some(stage),
            fields,
        })
    }

    #[must_use]
    pub fn suspend(prompt: impl Into<String>, id: impl Into<String>) -> Self {
        StepOutcome::Suspended {
            prompt: prompt.into(),
            id: id.into(),
        }
    }
}

/// The state contribution of a completed step.
///
/// `advance_to: None` means the step contributed nothing; any fields present
/// without a target stage are rejected by the driver as a schema violation.
#[derive(Clone, Debug, Default)]
pub struct StepPartial {
    pub advance_to: Option<Stage>,
    pub fields: FxHashMap<String, serde_json::Value>,
}

impl StepPartial {
    #[must_use]
    pub fn advance(stage: Stage) -> Self {
        Self {
            advance_to: Some(stage),
            fields: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: serde_json::Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }
}

/// Fatal step failure. Aborts the step's branch; at the top level this
/// aborts the whole execution unless the fan-out coordinator contains it.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// Expected state data is missing or malformed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaViolation),

    /// A collaborator call failed or timed out.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    /// Human input did not match the expected shape. The step does not
    /// advance and the same interrupt is re-issued.
    #[error("invalid resume value: expected {expected:?}, got {got}")]
    #[diagnostic(
        code(rebook::step::invalid_resume_value),
        help("Resume the pending interrupt with the exact confirmation string it asks for.")
    )]
    InvalidResumeValue { expected: &'static str, got: String },

    #[error(transparent)]
    #[diagnostic(code(rebook::step::serde_json))]
    Serde(#[from] serde_json::Error),

    #[error("event bus error: {0}")]
    #[diagnostic(code(rebook::step::event_bus))]
    EventBus(#[from] EmitError),
}

/// Failure emitting onto the event bus.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    #[error("event bus closed")]
    #[diagnostic(
        code(rebook::step::bus_closed),
        help("The run's event listener has gone away; the session is shutting down.")
    )]
    BusClosed,
}
