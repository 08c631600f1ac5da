//! Fluent builder for declaring workflow topologies.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::warn;

use super::fanout::FanoutEdge;
use crate::state::Stage;
use crate::step::Step;

/// Builder for workflow graphs.
///
/// Declare steps, connect them with unconditional edges, pick the entry step
/// and its seed stage, optionally attach the one permitted fan-out edge, then
/// [`compile`](Self::compile). Compilation validates the topology and returns
/// an immutable [`WorkflowGraph`](super::WorkflowGraph); a malformed topology
/// never starts executing.
///
/// # Examples
///
/// ```
/// use rebook::graphs::GraphBuilder;
/// use rebook::state::Stage;
/// # use async_trait::async_trait;
/// # use rebook::state::StateRecord;
/// # use rebook::step::{Step, StepContext, StepError, StepOutcome};
/// # struct Noop;
/// # #[async_trait]
/// # impl Step for Noop {
/// #     async fn run(&self, _: &StateRecord, _: StepContext) -> Result<StepOutcome, StepError> {
/// #         Ok(StepOutcome::stay())
/// #     }
/// # }
///
/// let graph = GraphBuilder::new()
///     .add_step("greet", Noop)
///     .add_step("done", Noop)
///     .add_edge("greet", "done")
///     .set_entry("greet", Stage::Initial)
///     .compile()
///     .unwrap();
/// assert_eq!(graph.terminal(), "done");
/// ```
pub struct GraphBuilder {
    pub(super) steps: FxHashMap<String, Arc<dyn Step>>,
    pub(super) edges: Vec<(String, String)>,
    pub(super) entry: Option<(String, Stage)>,
    pub(super) fanout: Option<FanoutEdge>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: FxHashMap::default(),
            edges: Vec::new(),
            entry: None,
            fanout: None,
        }
    }

    /// Register a step under `name`. Re-registering a name replaces the
    /// earlier step and logs a warning.
    #[must_use]
    pub fn add_step(mut self, name: impl Into<String>, step: impl Step + 'static) -> Self {
        let name = name.into();
        if self.steps.insert(name.clone(), Arc::new(step)).is_some() {
            warn!(step = %name, "step re-registered; replacing earlier definition");
        }
        self
    }

    /// Connect `from` to `to` with an unconditional edge. Each step may have
    /// at most one outgoing edge; violations surface at compile time.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Declare the entry step and the stage its seed record arrives at.
    #[must_use]
    pub fn set_entry(mut self, name: impl Into<String>, seed_stage: Stage) -> Self {
        self.entry = Some((name.into(), seed_stage));
        self
    }

    /// Attach the graph's single dynamic fan-out edge.
    #[must_use]
    pub fn add_fanout(mut self, fanout: FanoutEdge) -> Self {
        if self.fanout.is_some() {
            warn!("fan-out edge re-declared; replacing earlier declaration");
        }
        self.fanout = Some(fanout);
        self
    }
}
