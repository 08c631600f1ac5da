//! The per-invitee outreach sub-workflow and its fan-out wiring.
//!
//! Each branch runs send_proposal → await_reply → classify_reply against a
//! seed that projects only what the invitee's conversation needs: the user,
//! the invitee, and the proposals touching that invitee's events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::domain::{
    MessageReceipt, ProposalOutcome, ProposedReschedule, ProviderError, Sentiment, User,
};
use crate::graphs::{
    FanoutEdge, FanoutReport, GraphBuilder, GraphValidationError, SendInstruction, WorkflowGraph,
};
use crate::message::{ConversationLog, ConversationMessage, merge_conversations};
use crate::state::{Stage, StateRecord, fields};
use crate::step::{Step, StepContext, StepError, StepOutcome, StepPartial};

use super::names::{APPLY_OUTCOMES, AWAIT_REPLY, CLASSIFY_REPLY, CONFIRM_PROPOSALS, SEND_PROPOSAL};

/// Contribution keys branches hand back through the collector.
const CONTRIB_CONVERSATIONS: &str = "conversations";
const CONTRIB_OUTCOMES: &str = "outcomes";

const REPLY_POLL_ATTEMPTS: u32 = 5;
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(25);

fn outreach_text(user: &User, invitee: &User, proposals: &[ProposedReschedule]) -> String {
    let mut text = format!(
        "Hi {}! {} would like to reshuffle the following:",
        invitee.given_name, user.given_name
    );
    for proposal in proposals {
        text.push_str(&format!(
            "\n • \"{}\" → {}–{}",
            proposal.event.title,
            proposal.new_start_time.format("%H:%M"),
            proposal.new_end_time.format("%H:%M"),
        ));
    }
    text.push_str("\nDoes that work for you?");
    text
}

struct SendProposal;

#[async_trait]
impl Step for SendProposal {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::USER, fields::INVITEE, fields::PENDING_PROPOSALS]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::OutreachSent)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let user = state.user()?;
        let invitee = state.invitee()?;
        let proposals = state.pending_proposals()?;

        let text = outreach_text(&user, &invitee, &proposals);
        let receipt = ctx
            .collaborators
            .messenger
            .send_message(&invitee, &text)
            .await?;
        let sent = ConversationMessage::outgoing(user.id, invitee.id, &text);

        let mut new_fields = FxHashMap::default();
        new_fields.insert(fields::SENT_MESSAGE.to_string(), serde_json::to_value(&sent)?);
        new_fields.insert(fields::RECEIPT.to_string(), serde_json::to_value(&receipt)?);
        Ok(StepOutcome::advance(Stage::OutreachSent, new_fields))
    }
}

/// Polls the messenger a bounded number of times; an invitee who never
/// answers turns into a timeout, which the coordinator records as that
/// branch's failure.
struct AwaitReply;

#[async_trait]
impl Step for AwaitReply {
    fn requires(&self) -> &'static [&'static str] {
        &[fields::USER, fields::INVITEE, fields::RECEIPT]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::OutreachAnswered)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let user = state.user()?;
        let invitee = state.invitee()?;
        let receipt: MessageReceipt = state.field(fields::RECEIPT)?;

        let mut reply = None;
        for attempt in 0..REPLY_POLL_ATTEMPTS {
            if let Some(text) = ctx.collaborators.messenger.get_response(&receipt).await? {
                reply = Some(text);
                break;
            }
            debug!(invitee = %invitee.id, attempt, "no reply yet");
            tokio::time::sleep(REPLY_POLL_INTERVAL).await;
        }
        let text = reply.ok_or_else(|| ProviderError::Timeout {
            what: format!("reply from {}", invitee.given_name),
        })?;

        let received = ConversationMessage::incoming(invitee.id, user.id, &text);
        let mut new_fields = FxHashMap::default();
        new_fields.insert(
            fields::RECEIVED_MESSAGE.to_string(),
            serde_json::to_value(&received)?,
        );
        Ok(StepOutcome::advance(Stage::OutreachAnswered, new_fields))
    }
}

struct ClassifyReply;

#[async_trait]
impl Step for ClassifyReply {
    fn requires(&self) -> &'static [&'static str] {
        &[
            fields::PENDING_PROPOSALS,
            fields::SENT_MESSAGE,
            fields::RECEIVED_MESSAGE,
        ]
    }

    fn produces(&self) -> Option<Stage> {
        Some(Stage::OutreachClassified)
    }

    async fn run(&self, state: &StateRecord, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let proposals = state.pending_proposals()?;
        let sent = state.sent_message()?;
        let received = state.received_message()?;

        let sentiment = ctx
            .collaborators
            .sentiment
            .classify(&proposals, &sent, &received)
            .await?;
        ctx.emit_private_chunk(
            "reply_classification",
            &format!("Reply {:?} classified as {sentiment:?}.", received.content),
        )?;

        let mut new_fields = FxHashMap::default();
        new_fields.insert(
            fields::SENTIMENT.to_string(),
            serde_json::to_value(sentiment)?,
        );
        Ok(StepOutcome::advance(Stage::OutreachClassified, new_fields))
    }
}

/// Compile the three-step outreach pipeline a branch runs.
pub fn outreach_subflow() -> Result<WorkflowGraph, GraphValidationError> {
    GraphBuilder::new()
        .add_step(SEND_PROPOSAL, SendProposal)
        .add_step(AWAIT_REPLY, AwaitReply)
        .add_step(CLASSIFY_REPLY, ClassifyReply)
        .add_edge(SEND_PROPOSAL, AWAIT_REPLY)
        .add_edge(AWAIT_REPLY, CLASSIFY_REPLY)
        .set_entry(SEND_PROPOSAL, Stage::Outreach)
        .compile()
}

fn plan_branches(state: &StateRecord) -> Result<Vec<SendInstruction>, StepError> {
    let user = state.user()?;
    let invitees = state.invitees()?;
    let proposals = state.pending_proposals()?;

    let mut instructions = Vec::with_capacity(invitees.len());
    for invitee in invitees {
        let relevant: Vec<_> = proposals
            .iter()
            .filter(|p| p.event.involves(invitee.id))
            .cloned()
            .collect();
        if relevant.is_empty() {
            debug!(invitee = %invitee.id, "no proposals touch this invitee; skipping outreach");
            continue;
        }
        let mut seed_fields = FxHashMap::default();
        seed_fields.insert(fields::USER.to_string(), serde_json::to_value(&user)?);
        seed_fields.insert(fields::INVITEE.to_string(), serde_json::to_value(&invitee)?);
        seed_fields.insert(
            fields::PENDING_PROPOSALS.to_string(),
            serde_json::to_value(&relevant)?,
        );
        instructions.push(SendInstruction {
            key: invitee.id,
            seed: StateRecord::new(Stage::Outreach, seed_fields)?,
        });
    }
    Ok(instructions)
}

fn collect_branch(state: &StateRecord) -> Result<FxHashMap<String, Value>, StepError> {
    let sent = state.sent_message()?;
    let received = state.received_message()?;
    let sentiment = state.sentiment()?;
    let proposals = state.pending_proposals()?;

    let outcomes: Vec<ProposalOutcome> = proposals
        .into_iter()
        .map(|proposal| match sentiment {
            Sentiment::Positive => ProposalOutcome::Accepted { proposal },
            Sentiment::Negative | Sentiment::Unknown => ProposalOutcome::Rejected { proposal },
        })
        .collect();

    let mut contribution = FxHashMap::default();
    contribution.insert(
        CONTRIB_CONVERSATIONS.to_string(),
        serde_json::to_value(vec![sent, received])?,
    );
    contribution.insert(
        CONTRIB_OUTCOMES.to_string(),
        serde_json::to_value(outcomes)?,
    );
    Ok(contribution)
}

fn finish_fanout(mut report: FanoutReport) -> Result<StepPartial, StepError> {
    let mut conversations = ConversationLog::default();
    for (key, value) in report.merged.remove(CONTRIB_CONVERSATIONS).unwrap_or_default() {
        let entries: Vec<ConversationMessage> = serde_json::from_value(value)?;
        let mut update = ConversationLog::default();
        update.insert(key, entries);
        merge_conversations(&mut conversations, update);
    }
    let mut outcomes = serde_json::Map::new();
    for (key, value) in report.merged.remove(CONTRIB_OUTCOMES).unwrap_or_default() {
        outcomes.insert(key.to_string(), value);
    }
    let mut failures = serde_json::Map::new();
    for (key, message) in report.failures {
        failures.insert(key.to_string(), Value::String(message));
    }

    Ok(StepPartial::advance(Stage::WithInviteeMessages)
        .with_field(fields::CONVERSATIONS, serde_json::to_value(&conversations)?)
        .with_field(fields::PROPOSAL_OUTCOMES, Value::Object(outcomes))
        .with_field(fields::OUTREACH_FAILURES, Value::Object(failures)))
}

/// The fan-out edge carried by the main graph: one outreach branch per
/// invitee, rejoining at apply_outcomes.
pub fn outreach_fanout() -> Result<FanoutEdge, GraphValidationError> {
    Ok(FanoutEdge {
        from: CONFIRM_PROPOSALS.to_string(),
        subflow: Arc::new(outreach_subflow()?),
        planner: Arc::new(plan_branches),
        collector: Arc::new(collect_branch),
        finisher: Arc::new(finish_fanout),
        produces: Stage::WithInviteeMessages,
        rejoin: APPLY_OUTCOMES.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    #[test]
    fn subflow_compiles() {
        let graph = outreach_subflow().unwrap();
        assert_eq!(graph.entry(), SEND_PROPOSAL);
        assert_eq!(graph.terminal(), CLASSIFY_REPLY);
    }

    #[test]
    fn finisher_decodes_conversations_through_the_typed_log() {
        let user = UserId::random();
        let a = UserId::random();
        let entries = vec![
            ConversationMessage::outgoing(user, a, "can we move?"),
            ConversationMessage::incoming(a, user, "sure"),
        ];
        let mut report = FanoutReport::default();
        report
            .merged
            .entry(CONTRIB_CONVERSATIONS.to_string())
            .or_default()
            .insert(a, serde_json::to_value(&entries).unwrap());

        let partial = finish_fanout(report).unwrap();
        let log: ConversationLog =
            serde_json::from_value(partial.fields[fields::CONVERSATIONS].clone()).unwrap();
        assert_eq!(log[&a].len(), 2);
        assert_eq!(log[&a][0].sender, user);
        assert_eq!(log[&a][1].sender, a);
    }

    #[test]
    fn finisher_keys_every_field_by_invitee() {
        let a = UserId::random();
        let b = UserId::random();
        let mut report = FanoutReport::default();
        report
            .merged
            .entry(CONTRIB_OUTCOMES.to_string())
            .or_default()
            .insert(a, serde_json::json!([]));
        report.failures.insert(b, "timed out".to_string());

        let partial = finish_fanout(report).unwrap();
        assert_eq!(partial.advance_to, Some(Stage::WithInviteeMessages));
        let outcomes = &partial.fields[fields::PROPOSAL_OUTCOMES];
        assert!(outcomes.get(a.to_string()).is_some());
        let failures = &partial.fields[fields::OUTREACH_FAILURES];
        assert_eq!(
            failures.get(b.to_string()).and_then(Value::as_str),
            Some("timed out")
        );
    }
}
