//! Steps of the main rescheduling pipeline.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::domain::{CalendarEvent, ProposalOutcome, User, UserId};
use crate::state::{Stage, StateRecord, fields};
use crate::step::{Step, StepContext, StepError, StepOutcome};

/// The exact resume value both confirmation steps accept.
pub const CONFIRMATION: &str = "CONFIRMED";

const START_PROMPT: &str = "Do you want to start the rescheduling process?";
const PROPOSALS_PROMPT: &str = "Do these rescheduling proposals look good?";

/// Shared confirmation handling: suspend on first entry, validate on resume.
///
/// Returns `Some(Suspended)` when no resume value is present yet, `None`
/// when the user confirmed, and `InvalidResumeValue` for anything else — in
/// which case the driver leaves the checkpoint alone and the same interrupt
/// is re-issued.
fn confirmation_gate(ctx: &StepContext, prompt: &str) -> Result<Option<StepOutcome>, StepError> {
    match ctx.resume_value() {
        None => Ok(Some(StepOutcome::suspend(prompt, ctx.step_name.clone()))),
        Some(value) if value.as_str() == Some(CONFIRMATION) => Ok(None),
        Some(other) => Err(StepError::InvalidResumeValue {
            expected: CONFIRMATION,
            got: other.to_string(),
        }),
    }
}

fn field_map(
    entries: impl IntoIterator<Item = (&'static str, Value)>,
) -> FxHashMap<String, Value> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Greets the user. Emits only; contributes no state.
pub struct Introduction;

#[async_trait]
impl Step for Introduction {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::USER]
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let user = state.user()?;
        ctx.emit_public_chunk(
            "introduction",
            &format!(
                "Hi {}! I can reach out to your invitees and reshuffle your day for you.",
                user.given_name
            ),
        )?;
        Ok(StepOutcome::stay())
    }
}

pub struct ConfirmStart;

#[async_trait]
impl Step for ConfirmStart {
    async fn run(&self, _state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        if let Some(suspended) = confirmation_gate(&ctx, START_PROMPT)? {
            return Ok(suspended);
        }
        Ok(StepOutcome::stay())
    }
}

pub struct LoadCalendar;

#[async_trait]
impl Step for LoadCalendar {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::DATE]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::WithCalendar)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        ctx.emit_loading("Loading your calendar…")?;
        let date = state.date()?;
        let events = ctx.collaborators.calendar.get_events_on(date).await?;
        Ok(StepOutcome::advance(
            Stage::WithCalendar,
            field_map([(fields::CALENDAR, serde_json::to_value(events)?)]),
        ))
    }
}

pub struct SummarizeCalendar;

#[async_trait]
impl Step for SummarizeCalendar {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::DATE, fields::CALENDAR]
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let date = state.date()?;
        let calendar = state.calendar()?;
        ctx.emit_public_chunk(
            "calendar_summary",
            &format!("You have {} event(s) on {date}:", calendar.len()),
        )?;
        for event in &calendar {
            ctx.emit_public_chunk(
                "calendar_summary",
                &format!(
                    " • {} ({}–{}, {} invitee(s))",
                    event.title,
                    event.start_time.format("%H:%M"),
                    event.end_time.format("%H:%M"),
                    event.invitees.len()
                ),
            )?;
        }
        Ok(StepOutcome::stay())
    }
}

/// Resolves every invitee across the calendar and gathers their own events
/// for the day, so the proposal generator can see the conflicts it must
/// steer around.
pub struct LoadInvitees;

#[async_trait]
impl Step for LoadInvitees {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::DATE, fields::USER, fields::CALENDAR]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::WithInvitees)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        ctx.emit_loading("Looking up your invitees…")?;
        let date = state.date()?;
        let user = state.user()?;
        let calendar = state.calendar()?;

        // First-appearance order, deduplicated, the user excluded.
        let mut seen: FxHashSet<UserId> = FxHashSet::default();
        let mut invitees: Vec<User> = Vec::new();
        for event in &calendar {
            for invitee in &event.invitees {
                if invitee.user_id != user.id && seen.insert(invitee.user_id) {
                    invitees.push(ctx.collaborators.directory.get_user(invitee.user_id).await?);
                }
            }
        }

        let all_events = ctx.collaborators.calendar.get_events_on(date).await?;
        let invitee_calendars: FxHashMap<UserId, Vec<CalendarEvent>> = invitees
            .iter()
            .map(|invitee| {
                let events = all_events
                    .iter()
                    .filter(|e| e.involves(invitee.id))
                    .cloned()
                    .collect();
                (invitee.id, events)
            })
            .collect();

        Ok(StepOutcome::advance(
            Stage::WithInvitees,
            field_map([
                (fields::INVITEES, serde_json::to_value(invitees)?),
                (
                    fields::INVITEE_CALENDARS,
                    serde_json::to_value(invitee_calendars)?,
                ),
            ]),
        ))
    }
}

pub struct DraftProposals;

#[async_trait]
impl Step for DraftProposals {
    fn requires(&self) -> &'static [&'static str] {
        &[
            fields::DATE,
            fields::USER,
            fields::CALENDAR,
            fields::INVITEE_CALENDARS,
        ]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::WithPendingProposals)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        ctx.emit_loading("Drafting rescheduling proposals…")?;
        let date = state.date()?;
        let user = state.user()?;
        let calendar = state.calendar()?;
        let invitee_calendars = state.invitee_calendars()?;

        let proposals = ctx
            .collaborators
            .proposals
            .propose(date, &user, &calendar, &invitee_calendars)
            .await?;

        for proposal in &proposals {
            // Reasoning trace stays internal; only the proposal text itself
            // is user-visible.
            ctx.emit_private_chunk("proposal_reasoning", &proposal.explanation)?;
            ctx.emit_public_chunk(
                "proposals",
                &format!(
                    "Proposal: move \"{}\" to {}–{}.",
                    proposal.event.title,
                    proposal.new_start_time.format("%H:%M"),
                    proposal.new_end_time.format("%H:%M"),
                ),
            )?;
        }

        Ok(StepOutcome::advance(
            Stage::WithPendingProposals,
            field_map([(
                fields::PENDING_PROPOSALS,
                serde_json::to_value(proposals)?,
            )]),
        ))
    }
}

pub struct ConfirmProposals;

#[async_trait]
impl Step for ConfirmProposals {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::PENDING_PROPOSALS]
    }

    async fn run(&self, _state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        if let Some(suspended) = confirmation_gate(&ctx, PROPOSALS_PROMPT)? {
            return Ok(suspended);
        }
        Ok(StepOutcome::stay())
    }
}

/// Applies every accepted proposal to the calendar. Rejected proposals are
/// terminal and left alone.
pub struct ApplyOutcomes;

#[async_trait]
impl Step for ApplyOutcomes {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::PROPOSAL_OUTCOMES]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::Completed)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let outcomes = state.proposal_outcomes()?;
        let mut applied = Vec::new();
        for outcome in outcomes.values().flatten() {
            if let ProposalOutcome::Accepted { proposal } = outcome {
                ctx.collaborators
                    .calendar
                    .change_event_time(
                        proposal.event.id,
                        proposal.new_start_time,
                        proposal.new_end_time,
                    )
                    .await?;
                applied.push(proposal.clone());
            }
        }
        // Map iteration order is arbitrary; keep the record deterministic.
        applied.sort_by(|a, b| {
            a.new_start_time
                .cmp(&b.new_start_time)
                .then_with(|| a.event.title.cmp(&b.event.title))
        });
        Ok(StepOutcome::advance(
            Stage::Completed,
            field_map([(fields::COMPLETED_PROPOSALS, serde_json::to_value(applied)?)]),
        ))
    }
}

pub struct WrapUp;

#[async_trait]
impl Step for WrapUp {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::COMPLETED_PROPOSALS, fields::OUTREACH_FAILURES]
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let applied = state.completed_proposals()?;
        let failures = state.outreach_failures()?;
        ctx.emit_public_chunk(
            "wrap_up",
            &format!("All done — {} event(s) moved to their new times.", applied.len()),
        )?;
        for proposal in &applied {
            ctx.emit_public_chunk(
                "wrap_up",
                &format!(
                    " • \"{}\" now starts at {}.",
                    proposal.event.title,
                    proposal.new_start_time.format("%H:%M")
                ),
            )?;
        }
        if !failures.is_empty() {
            ctx.emit_public_chunk(
                "wrap_up",
                &format!(
                    "{} invitee(s) could not be reached; their events were left as they were.",
                    failures.len()
                ),
            )?;
        }
        Ok(StepOutcome::stay())
    }
}
