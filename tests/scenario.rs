//! Full session walkthrough: both confirmations, concurrent outreach to two
//! invitees, and the calendar mutation that follows.

use std::sync::Arc;

use rebook::protocol::ClientRecord;
use rebook::reschedule::{self, CONFIRMATION, names};
use rebook::runtime::{InMemoryCheckpointer, RunOutcome};
use rebook::service::{ServiceError, WorkflowService};
use rebook::state::Stage;
use serde_json::json;

mod common;

#[tokio::test]
async fn accepted_proposals_move_events_and_rejected_ones_do_not() {
    let fixture = common::Fixture::new();
    // Alice agrees, Bob declines.
    fixture
        .messenger
        .script_reply(fixture.alice.id, "Sure, that works for me.");
    fixture
        .messenger
        .script_reply(fixture.bob.id, "No, I can't make that time unfortunately.");

    let service = WorkflowService::new(
        Arc::new(reschedule::build_graph().unwrap()),
        Arc::clone(&fixture.collaborators),
        Arc::new(InMemoryCheckpointer::new()),
    );

    let (records, outcome) = common::drain(service.start("demo", fixture.seed())).await;
    assert!(matches!(outcome.unwrap(), RunOutcome::Suspended(_)));
    assert_eq!(
        common::last_interrupt(&records).unwrap().0,
        names::CONFIRM_START
    );

    let session = service
        .resume("demo", names::CONFIRM_START, json!(CONFIRMATION))
        .await
        .unwrap();
    let (records, outcome) = common::drain(session).await;
    assert!(matches!(outcome.unwrap(), RunOutcome::Suspended(_)));
    assert_eq!(
        common::last_interrupt(&records).unwrap().0,
        names::CONFIRM_PROPOSALS
    );
    // Proposal reasoning is private; only the user-facing proposal text may
    // appear on the wire.
    assert!(records.iter().all(|r| match r {
        ClientRecord::MessageChunk { id, .. } => id != "proposal_reasoning",
        _ => true,
    }));

    let session = service
        .resume("demo", names::CONFIRM_PROPOSALS, json!(CONFIRMATION))
        .await
        .unwrap();
    let (records, outcome) = common::drain(session).await;
    let final_state = match outcome.unwrap() {
        RunOutcome::Completed(state) => state,
        RunOutcome::Suspended(i) => panic!("unexpected suspension at {}", i.id),
    };
    assert_eq!(final_state.stage(), Stage::Completed);

    // Outcomes keyed per invitee: Alice accepted hers, Bob rejected his.
    let outcomes = final_state.proposal_outcomes().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[&fixture.alice.id].iter().all(|o| o.is_accepted()));
    assert!(outcomes[&fixture.bob.id].iter().all(|o| !o.is_accepted()));
    assert!(final_state.outreach_failures().unwrap().is_empty());

    // Both conversations were recorded in full, each entry naming its parties.
    let conversations = final_state.conversations_by_invitee().unwrap();
    for invitee in [&fixture.alice, &fixture.bob] {
        let entries = &conversations[&invitee.id];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sender, fixture.user.id);
        assert_eq!(entries[0].recipient, invitee.id);
        assert_eq!(entries[1].sender, invitee.id);
        assert_eq!(entries[1].recipient, fixture.user.id);
    }

    // Only Alice's event moved.
    let applied = final_state.completed_proposals().unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].event.title, "Design review");
    let events = fixture.calendar.events();
    let design = events.iter().find(|e| e.title == "Design review").unwrap();
    let budget = events.iter().find(|e| e.title == "Budget sync").unwrap();
    assert_eq!(design.start_time, common::at(fixture.date, 10));
    assert_eq!(budget.start_time, common::at(fixture.date, 13));

    // Classification traces stay private too.
    assert!(records.iter().all(|r| match r {
        ClientRecord::MessageChunk { id, .. } => id != "reply_classification",
        _ => true,
    }));
    // Wrap-up summary reaches the client.
    assert!(records.iter().any(|r| matches!(
        r,
        ClientRecord::MessageChunk { id, content } if id == "wrap_up" && content.contains("moved")
    )));

    // The completed thread left no checkpoint behind.
    let err = service
        .resume("demo", names::CONFIRM_PROPOSALS, json!(CONFIRMATION))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ThreadNotFound { .. }));
}

#[tokio::test]
async fn unresponsive_invitee_is_reported_but_does_not_block_completion() {
    let fixture = common::Fixture::new();
    fixture
        .messenger
        .script_reply(fixture.alice.id, "Sounds good, thanks for checking first!");
    fixture.messenger.mark_unresponsive(fixture.bob.id);

    let service = WorkflowService::new(
        Arc::new(reschedule::build_graph().unwrap()),
        Arc::clone(&fixture.collaborators),
        Arc::new(InMemoryCheckpointer::new()),
    );

    common::drain(service.start("partial", fixture.seed())).await;
    let session = service
        .resume("partial", names::CONFIRM_START, json!(CONFIRMATION))
        .await
        .unwrap();
    common::drain(session).await;
    let session = service
        .resume("partial", names::CONFIRM_PROPOSALS, json!(CONFIRMATION))
        .await
        .unwrap();
    let (records, outcome) = common::drain(session).await;

    let final_state = match outcome.unwrap() {
        RunOutcome::Completed(state) => state,
        RunOutcome::Suspended(i) => panic!("unexpected suspension at {}", i.id),
    };

    // Bob's branch timed out; Alice's went through.
    let failures = final_state.outreach_failures().unwrap();
    assert!(failures.contains_key(&fixture.bob.id));
    let outcomes = final_state.proposal_outcomes().unwrap();
    assert!(outcomes.contains_key(&fixture.alice.id));
    assert!(!outcomes.contains_key(&fixture.bob.id));

    // Alice's accepted reschedule was still applied.
    let events = fixture.calendar.events();
    let design = events.iter().find(|e| e.title == "Design review").unwrap();
    assert_eq!(design.start_time, common::at(fixture.date, 10));

    // The wrap-up mentions the unreachable invitee count.
    assert!(records.iter().any(|r| matches!(
        r,
        ClientRecord::MessageChunk { id, content }
            if id == "wrap_up" && content.contains("could not be reached")
    )));
}
