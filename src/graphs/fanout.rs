//! Types declaring the single dynamic construct a graph may carry: the
//! conditional fan-out edge.
//!
//! The planner inspects the current state and produces one send instruction
//! per invitee, each targeting the same sub-workflow with a distinct seed.
//! After the join barrier, the collector pulls each branch's contribution out
//! of its final state, and the finisher turns the merged report into the
//! partial the parent state is extended with.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::compilation::WorkflowGraph;
use crate::domain::UserId;
use crate::state::{Stage, StateRecord};
use crate::step::{StepError, StepPartial};

/// One fan-out branch to spawn: an invitee key plus the branch's seed state,
/// a projection of the parent state rather than the full record.
#[derive(Clone, Debug)]
pub struct SendInstruction {
    pub key: UserId,
    pub seed: StateRecord,
}

/// Produces the send instructions for a fan-out, one per invitee.
pub type FanoutPlanner =
    Arc<dyn Fn(&StateRecord) -> Result<Vec<SendInstruction>, StepError> + Send + Sync + 'static>;

/// Extracts a branch's contribution from its final state, keyed by field
/// name. List-valued contributions are concatenated at merge time; scalars
/// are last-completed-wins.
pub type BranchCollector = Arc<
    dyn Fn(&StateRecord) -> Result<FxHashMap<String, Value>, StepError> + Send + Sync + 'static,
>;

/// Turns the merged fan-out report into the parent's state contribution.
pub type FanoutFinisher =
    Arc<dyn Fn(FanoutReport) -> Result<StepPartial, StepError> + Send + Sync + 'static>;

/// Aggregate of all branch results after the join barrier.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// field name → invitee key → merged value.
    pub merged: FxHashMap<String, FxHashMap<UserId, Value>>,
    /// Branches that failed, with the captured error message.
    pub failures: FxHashMap<UserId, String>,
}

/// The declared fan-out edge of a compiled graph.
#[derive(Clone)]
pub struct FanoutEdge {
    /// Step whose completion triggers the fan-out.
    pub from: String,
    /// Sub-workflow every branch runs.
    pub subflow: Arc<WorkflowGraph>,
    pub planner: FanoutPlanner,
    pub collector: BranchCollector,
    pub finisher: FanoutFinisher,
    /// Stage the finisher advances the parent to; used by the compile-time
    /// dependency walk.
    pub produces: Stage,
    /// Step the outer cursor continues at once all branches have merged.
    pub rejoin: String,
}
