//! Graph compilation: topology validation and the executable graph.
//!
//! "Compile time" here means graph-compile time: every structural error —
//! undeclared edge endpoints, cycles outside the fan-out construct, dead
//! steps, unsatisfiable field dependencies — is caught before a single step
//! runs, and execution never starts on a malformed graph.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::debug;

use super::builder::GraphBuilder;
use super::fanout::FanoutEdge;
use crate::state::Stage;
use crate::step::Step;

/// Malformed topology. Fatal at compile time; execution never starts.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphValidationError {
    #[error("no entry step declared")]
    #[diagnostic(
        code(rebook::graph::missing_entry),
        help("Call set_entry(name, seed_stage) before compiling.")
    )]
    MissingEntry,

    #[error("{referenced_by} references undeclared step `{name}`")]
    #[diagnostic(code(rebook::graph::unknown_step))]
    UnknownStep {
        name: String,
        referenced_by: &'static str,
    },

    #[error("step `{from}` has more than one outgoing edge")]
    #[diagnostic(
        code(rebook::graph::conflicting_edges),
        help("Steps follow a single unconditional edge; dynamic branching is the fan-out edge's job.")
    )]
    ConflictingEdges { from: String },

    #[error("cycle detected at step `{at}`")]
    #[diagnostic(code(rebook::graph::cycle))]
    CycleDetected { at: String },

    #[error("step `{step}` is unreachable from the entry step")]
    #[diagnostic(code(rebook::graph::unreachable))]
    Unreachable { step: String },

    #[error("step `{step}` requires field `{field}`, which no ancestor step produces")]
    #[diagnostic(
        code(rebook::graph::unsatisfied_requirement),
        help("Reorder the pipeline or fix the step's requires()/produces() declarations.")
    )]
    UnsatisfiedRequirement { step: String, field: &'static str },

    #[error("step `{step}` advances to stage {stage}, which drops fields already accumulated")]
    #[diagnostic(code(rebook::graph::stage_regression))]
    StageRegression { step: String, stage: Stage },
}

/// A validated, immutable workflow topology ready for execution.
#[derive(Clone)]
pub struct WorkflowGraph {
    steps: FxHashMap<String, Arc<dyn Step>>,
    next: FxHashMap<String, String>,
    entry: String,
    seed_stage: Stage,
    terminal: String,
    fanout: Option<FanoutEdge>,
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("next", &self.next)
            .field("entry", &self.entry)
            .field("seed_stage", &self.seed_stage)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

impl WorkflowGraph {
    pub fn step(&self, name: &str) -> Option<&Arc<dyn Step>> {
        self.steps.get(name)
    }

    /// The step the cursor moves to after `name`, if `name` is not terminal.
    pub fn next_after(&self, name: &str) -> Option<&str> {
        self.next.get(name).map(String::as_str)
    }

    /// The fan-out edge triggered by completing `name`, if any.
    pub fn fanout_from(&self, name: &str) -> Option<&FanoutEdge> {
        self.fanout.as_ref().filter(|f| f.from == name)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn seed_stage(&self) -> Stage {
        self.seed_stage
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }
}

impl GraphBuilder {
    /// Validate the declared topology and produce an executable graph.
    pub fn compile(self) -> Result<WorkflowGraph, GraphValidationError> {
        let (entry, seed_stage) = self.entry.ok_or(GraphValidationError::MissingEntry)?;
        if !self.steps.contains_key(&entry) {
            return Err(GraphValidationError::UnknownStep {
                name: entry,
                referenced_by: "entry declaration",
            });
        }

        let mut next: FxHashMap<String, String> = FxHashMap::default();
        for (from, to) in self.edges {
            for endpoint in [&from, &to] {
                if !self.steps.contains_key(endpoint) {
                    return Err(GraphValidationError::UnknownStep {
                        name: endpoint.clone(),
                        referenced_by: "edge",
                    });
                }
            }
            if next.insert(from.clone(), to).is_some() {
                return Err(GraphValidationError::ConflictingEdges { from });
            }
        }

        if let Some(fanout) = &self.fanout {
            for (name, role) in [
                (&fanout.from, "fan-out source"),
                (&fanout.rejoin, "fan-out rejoin"),
            ] {
                if !self.steps.contains_key(name) {
                    return Err(GraphValidationError::UnknownStep {
                        name: name.clone(),
                        referenced_by: role,
                    });
                }
            }
            // The fan-out edge is the source step's only outgoing edge.
            if next.contains_key(&fanout.from) {
                return Err(GraphValidationError::ConflictingEdges {
                    from: fanout.from.clone(),
                });
            }
        }

        // Walk the chain from the entry: linear topology means one pass
        // covers reachability, cycle detection, terminal discovery, and the
        // field-dependency check all at once.
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut available: FxHashSet<&'static str> =
            seed_stage.declared_fields().iter().copied().collect();
        let mut cursor = entry.clone();
        let terminal = loop {
            visited.insert(cursor.clone());
            let step = &self.steps[&cursor];
            for &field in step.requires() {
                if !available.contains(field) {
                    return Err(GraphValidationError::UnsatisfiedRequirement {
                        step: cursor,
                        field,
                    });
                }
            }
            if let Some(stage) = step.produces() {
                if !available.iter().all(|f| stage.declares(f)) {
                    return Err(GraphValidationError::StageRegression { step: cursor, stage });
                }
                available = stage.declared_fields().iter().copied().collect();
            }
            let to = if let Some(fanout) = self.fanout.as_ref().filter(|f| f.from == cursor) {
                // The merged fan-out contribution advances the stage again
                // before the rejoin step sees the record.
                let stage = fanout.produces;
                if !available.iter().all(|f| stage.declares(f)) {
                    return Err(GraphValidationError::StageRegression { step: cursor, stage });
                }
                available = stage.declared_fields().iter().copied().collect();
                Some(fanout.rejoin.clone())
            } else {
                next.get(&cursor).cloned()
            };
            match to {
                Some(to) => {
                    if visited.contains(&to) {
                        return Err(GraphValidationError::CycleDetected { at: to });
                    }
                    cursor = to;
                }
                None => break cursor,
            }
        };

        for name in self.steps.keys() {
            if !visited.contains(name) {
                return Err(GraphValidationError::Unreachable { step: name.clone() });
            }
        }

        debug!(
            entry = %entry,
            terminal = %terminal,
            steps = self.steps.len(),
            "graph compiled"
        );
        Ok(WorkflowGraph {
            steps: self.steps,
            next,
            entry,
            seed_stage,
            terminal,
            fanout: self.fanout,
        })
    }
}
