use std::sync::Arc;

use rebook::protocol::ClientRecord;
use rebook::reschedule::{self, CONFIRMATION, names};
use rebook::runtime::{InMemoryCheckpointer, RunOutcome};
use rebook::service::{ServiceError, WorkflowService};
use serde_json::json;

mod common;

fn service(fixture: &common::Fixture) -> WorkflowService {
    WorkflowService::new(
        Arc::new(reschedule::build_graph().unwrap()),
        Arc::clone(&fixture.collaborators),
        Arc::new(InMemoryCheckpointer::new()),
    )
}

#[tokio::test]
async fn fresh_run_suspends_at_the_first_confirmation() {
    let fixture = common::Fixture::new();
    let service = service(&fixture);

    let (records, outcome) = common::drain(service.start("t1", fixture.seed())).await;
    match outcome.unwrap() {
        RunOutcome::Suspended(interrupt) => assert_eq!(interrupt.id, names::CONFIRM_START),
        RunOutcome::Completed(_) => panic!("run should have suspended"),
    }
    let (id, prompt) = common::last_interrupt(&records).unwrap();
    assert_eq!(id, names::CONFIRM_START);
    assert!(prompt.contains("start the rescheduling process"));
}

#[tokio::test]
async fn resume_of_unknown_thread_is_an_error() {
    let fixture = common::Fixture::new();
    let service = service(&fixture);

    let err = service
        .resume("nobody", names::CONFIRM_START, json!(CONFIRMATION))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ThreadNotFound { thread_id } if thread_id == "nobody"
    ));
}

#[tokio::test]
async fn resume_with_wrong_interrupt_id_leaves_the_checkpoint_alone() {
    let fixture = common::Fixture::new();
    let service = service(&fixture);
    common::drain(service.start("t2", fixture.seed())).await;

    let err = service
        .resume("t2", "some_other_interrupt", json!(CONFIRMATION))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidResumeTarget { expected, got }
            if expected == names::CONFIRM_START && got == "some_other_interrupt"
    ));

    // The original interrupt still resumes.
    let session = service
        .resume("t2", names::CONFIRM_START, json!(CONFIRMATION))
        .await
        .unwrap();
    let (_, outcome) = common::drain(session).await;
    match outcome.unwrap() {
        RunOutcome::Suspended(interrupt) => assert_eq!(interrupt.id, names::CONFIRM_PROPOSALS),
        RunOutcome::Completed(_) => panic!("run should pause at the proposals confirmation"),
    }
}

#[tokio::test]
async fn rejected_resume_value_reissues_the_same_interrupt() {
    let fixture = common::Fixture::new();
    let service = service(&fixture);
    common::drain(service.start("t3", fixture.seed())).await;

    let session = service
        .resume("t3", names::CONFIRM_START, json!("MAYBE"))
        .await
        .unwrap();
    let (records, outcome) = common::drain(session).await;

    let err = outcome.unwrap_err();
    assert!(matches!(
        &err,
        ServiceError::Runner(runner) if runner.is_invalid_resume_value()
    ));
    // The pending interrupt is streamed again so the client can retry.
    let (id, _) = common::last_interrupt(&records).unwrap();
    assert_eq!(id, names::CONFIRM_START);

    // And the retry goes through.
    let session = service
        .resume("t3", names::CONFIRM_START, json!(CONFIRMATION))
        .await
        .unwrap();
    let (_, outcome) = common::drain(session).await;
    assert!(matches!(outcome.unwrap(), RunOutcome::Suspended(_)));
}

#[tokio::test]
async fn state_records_stream_after_a_successful_resume() {
    let fixture = common::Fixture::new();
    let service = service(&fixture);
    common::drain(service.start("t4", fixture.seed())).await;

    let session = service
        .resume("t4", names::CONFIRM_START, json!(CONFIRMATION))
        .await
        .unwrap();
    let (records, _) = common::drain(session).await;
    assert!(
        records
            .iter()
            .any(|r| matches!(r, ClientRecord::State { .. })),
        "resumed session should stream state snapshots"
    );
    assert!(
        records
            .iter()
            .any(|r| matches!(r, ClientRecord::Loading { .. })),
        "calendar loading indicator expected"
    );
}
