//! The cursor loop driving one workflow execution.
//!
//! The executor owns the current [`StateRecord`] for the lifetime of a run.
//! It runs the step at the cursor, folds the step's partial into the state,
//! emits a snapshot, and follows the single outgoing edge; at the fan-out
//! edge it plans instructions, hands them to the coordinator, and continues
//! at the rejoin step once all branches have merged. Suspension persists a
//! checkpoint and halts; reaching the terminal step clears it.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::checkpoint::{Checkpoint, CheckpointError, Checkpointer, PendingInterrupt};
use super::fanout;
use crate::domain::Collaborators;
use crate::events::{Event, PARTIAL_FANOUT_SCOPE};
use crate::graphs::WorkflowGraph;
use crate::state::{SchemaViolation, StateRecord};
use crate::step::{StepContext, StepError, StepOutcome, StepPartial};

/// How a drive of the cursor loop ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The terminal step completed; the checkpoint is cleared.
    Completed(StateRecord),
    /// A step suspended; the checkpoint holds everything needed to resume.
    Suspended(PendingInterrupt),
}

/// Execution failure outside the fan-out's per-branch isolation.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("step `{step}` failed: {source}")]
    #[diagnostic(code(rebook::runtime::step))]
    Step {
        step: String,
        #[source]
        #[diagnostic_source]
        source: StepError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaViolation),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("all {failed} fan-out branches failed")]
    #[diagnostic(
        code(rebook::runtime::fanout_failed),
        help("Partial branch failure is tolerated; a run aborts only when no branch survives.")
    )]
    FanoutFailed { failed: usize },

    /// Cursor names a step the compiled graph does not know. Only reachable
    /// through a checkpoint written by a different graph revision.
    #[error("checkpointed step `{step}` is not part of the compiled graph")]
    #[diagnostic(
        code(rebook::runtime::unknown_step),
        help("The suspended run was checkpointed against an older workflow topology.")
    )]
    UnknownStep { step: String },

    #[error("event bus closed while the run was still producing")]
    #[diagnostic(code(rebook::runtime::event_bus))]
    EventBus,
}

impl RunnerError {
    /// The invalid-resume-value failure leaves the pending interrupt (and
    /// its checkpoint) in place; callers re-issue the same interrupt.
    pub fn is_invalid_resume_value(&self) -> bool {
        matches!(
            self,
            RunnerError::Step {
                source: StepError::InvalidResumeValue { .. },
                ..
            }
        )
    }
}

/// Fold a completed step's contribution into the state.
///
/// A partial without a target stage must be empty: fields with nowhere to go
/// are a schema violation, not silently dropped data.
pub(crate) fn apply_partial(
    state: &StateRecord,
    partial: StepPartial,
) -> Result<StateRecord, SchemaViolation> {
    match partial.advance_to {
        Some(next) => state.extend(next, partial.fields),
        None => match partial.fields.into_keys().next() {
            Some(field) => Err(SchemaViolation::UnexpectedField {
                stage: state.stage(),
                field,
            }),
            None => Ok(state.clone()),
        },
    }
}

/// Drives one thread's execution over a compiled graph.
pub struct Executor {
    graph: Arc<WorkflowGraph>,
    collaborators: Arc<Collaborators>,
    checkpointer: Arc<dyn Checkpointer>,
    emitter: flume::Sender<Event>,
    thread_id: String,
}

impl Executor {
    #[must_use]
    pub fn new(
        graph: Arc<WorkflowGraph>,
        collaborators: Arc<Collaborators>,
        checkpointer: Arc<dyn Checkpointer>,
        emitter: flume::Sender<Event>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            collaborators,
            checkpointer,
            emitter,
            thread_id: thread_id.into(),
        }
    }

    /// Start a fresh run from the entry step.
    #[instrument(skip(self, seed), fields(thread_id = %self.thread_id), err)]
    pub async fn start(&self, seed: StateRecord) -> Result<RunOutcome, RunnerError> {
        self.drive(seed, self.graph.entry().to_string(), None).await
    }

    /// Continue a suspended run from its checkpoint, handing `value` to the
    /// paused step.
    #[instrument(skip(self, checkpoint, value), fields(thread_id = %self.thread_id), err)]
    pub async fn resume(
        &self,
        checkpoint: Checkpoint,
        value: serde_json::Value,
    ) -> Result<RunOutcome, RunnerError> {
        self.drive(checkpoint.state, checkpoint.paused_at, Some(value))
            .await
    }

    async fn drive(
        &self,
        mut state: StateRecord,
        mut cursor: String,
        mut resume: Option<serde_json::Value>,
    ) -> Result<RunOutcome, RunnerError> {
        loop {
            let step = self
                .graph
                .step(&cursor)
                .ok_or_else(|| RunnerError::UnknownStep {
                    step: cursor.clone(),
                })?;
            let ctx = StepContext::new(
                cursor.clone(),
                self.thread_id.clone(),
                Arc::clone(&self.collaborators),
                self.emitter.clone(),
                resume.take(),
            );
            debug!(step = %cursor, stage = %state.stage(), "running step");
            match step.run(&state, ctx).await {
                Ok(StepOutcome::Completed(partial)) => {
                    state = apply_partial(&state, partial)?;
                    self.emit(Event::state(state.clone()))?;
                }
                Ok(StepOutcome::Suspended { prompt, id }) => {
                    let interrupt = PendingInterrupt {
                        id: id.clone(),
                        prompt: prompt.clone(),
                    };
                    self.checkpointer
                        .save(Checkpoint::new(
                            self.thread_id.clone(),
                            cursor.clone(),
                            state,
                            interrupt.clone(),
                        ))
                        .await?;
                    self.emit(Event::interrupt(id, prompt))?;
                    debug!(step = %cursor, "run suspended");
                    return Ok(RunOutcome::Suspended(interrupt));
                }
                Err(source) => {
                    // Checkpoint untouched: an invalid resume value leaves
                    // the same interrupt pending.
                    return Err(RunnerError::Step {
                        step: cursor,
                        source,
                    });
                }
            }

            if let Some(edge) = self.graph.fanout_from(&cursor) {
                let instructions = (edge.planner)(&state).map_err(|source| RunnerError::Step {
                    step: cursor.clone(),
                    source,
                })?;
                debug!(step = %cursor, branches = instructions.len(), "fanning out");
                let report = fanout::dispatch(
                    edge,
                    instructions,
                    Arc::clone(&self.collaborators),
                    self.emitter.clone(),
                    &self.thread_id,
                )
                .await?;
                if !report.failures.is_empty() {
                    let mut failed: Vec<String> =
                        report.failures.keys().map(ToString::to_string).collect();
                    failed.sort();
                    warn!(invitees = ?failed, "continuing with partial fan-out results");
                    self.emit(Event::diagnostic(
                        PARTIAL_FANOUT_SCOPE,
                        format!("branches failed for invitees: {}", failed.join(", ")),
                    ))?;
                }
                let partial = (edge.finisher)(report).map_err(|source| RunnerError::Step {
                    step: cursor.clone(),
                    source,
                })?;
                state = apply_partial(&state, partial)?;
                self.emit(Event::state(state.clone()))?;
                cursor = edge.rejoin.clone();
            } else if let Some(next) = self.graph.next_after(&cursor) {
                cursor = next.to_string();
            } else {
                self.checkpointer.clear(&self.thread_id).await?;
                debug!(step = %cursor, "run completed");
                return Ok(RunOutcome::Completed(state));
            }
        }
    }

    fn emit(&self, event: Event) -> Result<(), RunnerError> {
        self.emitter.send(event).map_err(|_| RunnerError::EventBus)
    }
}
