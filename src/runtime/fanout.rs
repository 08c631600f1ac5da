//! Fan-out coordinator: one concurrent sub-workflow per invitee, a join-all
//! barrier, and a keyed merge of whatever survived.
//!
//! Branch failures are contained: a collaborator error or an unexpected
//! suspension inside a branch becomes that invitee's failure entry, never a
//! cancellation signal to siblings. The whole fan-out fails only when every
//! branch does.

use std::sync::Arc;

use futures_util::future;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::executor::{RunnerError, apply_partial};
use crate::domain::{Collaborators, UserId};
use crate::events::Event;
use crate::graphs::{FanoutEdge, FanoutReport, SendInstruction, WorkflowGraph};
use crate::state::StateRecord;
use crate::step::{StepContext, StepOutcome};

/// Run every instruction's branch concurrently, wait for all of them, and
/// merge the keyed contributions.
///
/// Returns `Err` only when every branch failed (and there was at least one);
/// partial failure is reported through [`FanoutReport::failures`].
pub async fn dispatch(
    edge: &FanoutEdge,
    instructions: Vec<SendInstruction>,
    collaborators: Arc<Collaborators>,
    emitter: flume::Sender<Event>,
    thread_id: &str,
) -> Result<FanoutReport, RunnerError> {
    let total = instructions.len();
    let tasks = instructions.into_iter().map(|instruction| {
        let subflow = Arc::clone(&edge.subflow);
        let collector = Arc::clone(&edge.collector);
        let collaborators = Arc::clone(&collaborators);
        let emitter = emitter.clone();
        let branch_thread = format!("{thread_id}/{}", instruction.key);
        let key = instruction.key;
        let handle = tokio::spawn(async move {
            let final_state =
                run_branch(&subflow, instruction.seed, collaborators, emitter, &branch_thread)
                    .await?;
            (collector)(&final_state).map_err(|e| e.to_string())
        });
        async move { (key, handle.await) }
    });

    let mut report = FanoutReport::default();
    for (key, joined) in future::join_all(tasks).await {
        match joined {
            Ok(Ok(contribution)) => merge_contribution(&mut report.merged, key, contribution),
            Ok(Err(message)) => {
                warn!(invitee = %key, error = %message, "fan-out branch failed");
                report.failures.insert(key, message);
            }
            Err(join_err) => {
                warn!(invitee = %key, error = %join_err, "fan-out branch task aborted");
                report
                    .failures
                    .insert(key, format!("branch task aborted: {join_err}"));
            }
        }
    }

    if total > 0 && report.failures.len() == total {
        return Err(RunnerError::FanoutFailed { failed: total });
    }
    debug!(
        branches = total,
        failed = report.failures.len(),
        "fan-out joined"
    );
    Ok(report)
}

/// Merge one branch's contribution into the accumulator.
///
/// Contributions for distinct keys are unioned. Should two branches ever
/// write the same key, list values are concatenated in completion order and
/// scalar values are last-completed-wins; nothing is silently dropped.
pub fn merge_contribution(
    merged: &mut FxHashMap<String, FxHashMap<UserId, Value>>,
    key: UserId,
    contribution: FxHashMap<String, Value>,
) {
    for (field, value) in contribution {
        let per_key = merged.entry(field).or_default();
        match (per_key.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(mut incoming)) => {
                existing.append(&mut incoming);
            }
            (_, value) => {
                per_key.insert(key, value);
            }
        }
    }
}

/// Drive one branch's sub-workflow to its terminal step.
///
/// Branches have no checkpoint scope, so a step suspending in here is a
/// branch failure, reported like any collaborator error.
async fn run_branch(
    subflow: &WorkflowGraph,
    seed: StateRecord,
    collaborators: Arc<Collaborators>,
    emitter: flume::Sender<Event>,
    thread_id: &str,
) -> Result<StateRecord, String> {
    let mut state = seed;
    let mut cursor = subflow.entry().to_string();
    loop {
        let step = subflow
            .step(&cursor)
            .ok_or_else(|| format!("branch step `{cursor}` missing from compiled graph"))?;
        let ctx = StepContext::new(
            cursor.clone(),
            thread_id,
            Arc::clone(&collaborators),
            emitter.clone(),
            None,
        );
        match step.run(&state, ctx).await {
            Ok(StepOutcome::Completed(partial)) => {
                state = apply_partial(&state, partial).map_err(|e| e.to_string())?;
            }
            Ok(StepOutcome::Suspended { id, .. }) => {
                return Err(format!(
                    "step `{cursor}` suspended (interrupt `{id}`) inside a fan-out branch"
                ));
            }
            Err(err) => return Err(format!("step `{cursor}` failed: {err}")),
        }
        match subflow.next_after(&cursor) {
            Some(next) => cursor = next.to_string(),
            None => return Ok(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_unions_distinct_keys() {
        let a = UserId::random();
        let b = UserId::random();
        let mut merged = FxHashMap::default();
        let mut first = FxHashMap::default();
        first.insert("outcomes".to_string(), json!([1]));
        let mut second = FxHashMap::default();
        second.insert("outcomes".to_string(), json!([2]));

        merge_contribution(&mut merged, a, first);
        merge_contribution(&mut merged, b, second);

        assert_eq!(merged["outcomes"][&a], json!([1]));
        assert_eq!(merged["outcomes"][&b], json!([2]));
    }

    #[test]
    fn merge_concatenates_lists_and_overwrites_scalars_on_collision() {
        let key = UserId::random();
        let mut merged = FxHashMap::default();
        let mut first = FxHashMap::default();
        first.insert("conversations".to_string(), json!(["m1"]));
        first.insert("latest".to_string(), json!("a"));
        let mut second = FxHashMap::default();
        second.insert("conversations".to_string(), json!(["m2"]));
        second.insert("latest".to_string(), json!("b"));

        merge_contribution(&mut merged, key, first);
        merge_contribution(&mut merged, key, second);

        assert_eq!(merged["conversations"][&key], json!(["m1", "m2"]));
        assert_eq!(merged["latest"][&key], json!("b"));
    }
}
