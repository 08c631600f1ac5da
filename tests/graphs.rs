use async_trait::async_trait;

use rebook::graphs::{GraphBuilder, GraphValidationError};
use rebook::reschedule::{self, names};
use rebook::state::{Stage, StateRecord, fields};
use rebook::step::{Step, StepContext, StepError, StepOutcome};

struct Noop;

#[async_trait]
impl Step for Noop {
    async fn run(&self, _: &StateRecord, _: StepContext) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::stay())
    }
}

struct Needs(&'static [&'static str]);

#[async_trait]
impl Step for Needs {
    fn requires(&self) -> &'static [&'static str] {
        self.0
    }

    async fn run(&self, _: &StateRecord, _: StepContext) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::stay())
    }
}

struct Produces(Stage);

#[async_trait]
impl Step for Produces {
    fn produces(&self) -> Option<Stage> {
        Some(self.0)
    }

    async fn run(&self, _: &StateRecord, _: StepContext) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::stay())
    }
}

#[test]
fn compile_requires_an_entry() {
    let err = GraphBuilder::new().add_step("only", Noop).compile().unwrap_err();
    assert!(matches!(err, GraphValidationError::MissingEntry));
}

#[test]
fn compile_rejects_unknown_entry() {
    let err = GraphBuilder::new()
        .add_step("only", Noop)
        .set_entry("ghost", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::UnknownStep { name, .. } if name == "ghost"
    ));
}

#[test]
fn compile_rejects_undeclared_edge_endpoints() {
    let err = GraphBuilder::new()
        .add_step("a", Noop)
        .add_edge("a", "ghost")
        .set_entry("a", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::UnknownStep { name, .. } if name == "ghost"
    ));
}

#[test]
fn compile_rejects_multiple_outgoing_edges() {
    let err = GraphBuilder::new()
        .add_step("a", Noop)
        .add_step("b", Noop)
        .add_step("c", Noop)
        .add_edge("a", "b")
        .add_edge("a", "c")
        .set_entry("a", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::ConflictingEdges { from } if from == "a"
    ));
}

#[test]
fn compile_rejects_cycles() {
    let err = GraphBuilder::new()
        .add_step("a", Noop)
        .add_step("b", Noop)
        .add_edge("a", "b")
        .add_edge("b", "a")
        .set_entry("a", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::CycleDetected { at } if at == "a"
    ));
}

#[test]
fn compile_rejects_unreachable_steps() {
    let err = GraphBuilder::new()
        .add_step("a", Noop)
        .add_step("island", Noop)
        .set_entry("a", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::Unreachable { step } if step == "island"
    ));
}

#[test]
fn compile_rejects_requirements_no_ancestor_satisfies() {
    let err = GraphBuilder::new()
        .add_step("wants_calendar", Needs(&[fields::CALENDAR]))
        .set_entry("wants_calendar", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::UnsatisfiedRequirement {
            field: fields::CALENDAR,
            ..
        }
    ));
}

#[test]
fn compile_accepts_requirements_satisfied_upstream() {
    let graph = GraphBuilder::new()
        .add_step("load", Produces(Stage::WithCalendar))
        .add_step("read", Needs(&[fields::CALENDAR]))
        .add_edge("load", "read")
        .set_entry("load", Stage::Initial)
        .compile()
        .unwrap();
    assert_eq!(graph.terminal(), "read");
}

#[test]
fn compile_rejects_stage_regression() {
    let err = GraphBuilder::new()
        .add_step("forward", Produces(Stage::WithCalendar))
        .add_step("backward", Produces(Stage::Initial))
        .add_edge("forward", "backward")
        .set_entry("forward", Stage::Initial)
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphValidationError::StageRegression { step, .. } if step == "backward"
    ));
}

#[test]
fn demo_pipeline_compiles() {
    let graph = reschedule::build_graph().unwrap();
    assert_eq!(graph.entry(), names::INTRODUCTION);
    assert_eq!(graph.terminal(), names::WRAP_UP);
    assert_eq!(graph.seed_stage(), Stage::Initial);
    assert!(graph.fanout_from(names::CONFIRM_PROPOSALS).is_some());
    assert!(graph.fanout_from(names::DRAFT_PROPOSALS).is_none());
}
