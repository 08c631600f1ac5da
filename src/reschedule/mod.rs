//! The calendar-rescheduling workflow wired onto the engine.
//!
//! Main pipeline: introduction → confirm_start → load_calendar →
//! summarize_calendar → load_invitees → draft_proposals → confirm_proposals,
//! then the fan-out over the per-invitee outreach sub-workflow (send_proposal
//! → await_reply → classify_reply), rejoining at apply_outcomes → wrap_up.
//!
//! Both confirmation steps suspend with an interrupt and expect the resume
//! value `"CONFIRMED"`, exactly.

mod invitee;
mod steps;

pub use invitee::{outreach_fanout, outreach_subflow};
pub use steps::CONFIRMATION;

use crate::graphs::{GraphBuilder, GraphValidationError, WorkflowGraph};
use crate::state::Stage;

/// Step names of the main pipeline and the outreach sub-workflow.
pub mod names {
    pub const INTRODUCTION: &str = "introduction";
    pub const CONFIRM_START: &str = "confirm_start";
    pub const LOAD_CALENDAR: &str = "load_calendar";
    pub const SUMMARIZE_CALENDAR: &str = "summarize_calendar";
    pub const LOAD_INVITEES: &str = "load_invitees";
    pub const DRAFT_PROPOSALS: &str = "draft_proposals";
    pub const CONFIRM_PROPOSALS: &str = "confirm_proposals";
    pub const APPLY_OUTCOMES: &str = "apply_outcomes";
    pub const WRAP_UP: &str = "wrap_up";

    pub const SEND_PROPOSAL: &str = "send_proposal";
    pub const AWAIT_REPLY: &str = "await_reply";
    pub const CLASSIFY_REPLY: &str = "classify_reply";
}

/// Compile the full rescheduling workflow.
pub fn build_graph() -> Result<WorkflowGraph, GraphValidationError> {
    use names::*;

    GraphBuilder::new()
        .add_step(INTRODUCTION, steps::Introduction)
        .add_step(CONFIRM_START, steps::ConfirmStart)
        .add_step(LOAD_CALENDAR, steps::LoadCalendar)
        .add_step(SUMMARIZE_CALENDAR, steps::SummarizeCalendar)
        .add_step(LOAD_INVITEES, steps::LoadInvitees)
        .add_step(DRAFT_PROPOSALS, steps::DraftProposals)
        .add_step(CONFIRM_PROPOSALS, steps::ConfirmProposals)
        .add_step(APPLY_OUTCOMES, steps::ApplyOutcomes)
        .add_step(WRAP_UP, steps::WrapUp)
        .add_edge(INTRODUCTION, CONFIRM_START)
        .add_edge(CONFIRM_START, LOAD_CALENDAR)
        .add_edge(LOAD_CALENDAR, SUMMARIZE_CALENDAR)
        .add_edge(SUMMARIZE_CALENDAR, LOAD_INVITEES)
        .add_edge(LOAD_INVITEES, DRAFT_PROPOSALS)
        .add_edge(DRAFT_PROPOSALS, CONFIRM_PROPOSALS)
        .add_edge(APPLY_OUTCOMES, WRAP_UP)
        .add_fanout(outreach_fanout()?)
        .set_entry(INTRODUCTION, Stage::Initial)
        .compile()
}
