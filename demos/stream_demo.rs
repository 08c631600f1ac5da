//! End-to-end NDJSON session over the rescheduling workflow.
//!
//! Runs the whole demo in-process with mock collaborators: streams every
//! client record as one JSON line, answers both confirmation interrupts, and
//! prints the calendar before and after.
//!
//! ```bash
//! cargo run --example stream_demo
//! ```

use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use rebook::domain::mock::{self, MockCalendar, MockDirectory, MockMessenger};
use rebook::domain::{CalendarEvent, CalendarEventId, EventInvitee, User};
use rebook::protocol::ClientSignal;
use rebook::reschedule::{self, CONFIRMATION};
use rebook::runtime::RuntimeConfig;
use rebook::service::{SessionStream, WorkflowService};
use rebook::state::StateRecord;

fn event(
    date: chrono::NaiveDate,
    hour: u32,
    title: &str,
    owner: &User,
    invitee: &User,
) -> CalendarEvent {
    let start = date.and_hms_opt(hour, 0, 0).unwrap().and_utc();
    CalendarEvent {
        id: CalendarEventId::random(),
        title: title.to_string(),
        description: String::new(),
        owner: owner.id,
        invitees: vec![EventInvitee::required(invitee.id)],
        start_time: start,
        end_time: start + chrono::Duration::hours(1),
    }
}

async fn print_session(session: SessionStream) -> Result<()> {
    while let Ok(record) = session.records.recv_async().await {
        print!("{}", record.ndjson_line().into_diagnostic()?);
    }
    session
        .outcome
        .await
        .into_diagnostic()?
        .map_err(miette::Report::from)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    rebook::telemetry::init();

    let user = User::new("Dana", "Europe/Berlin");
    let alice = User::new("Alice", "Europe/London");
    let bob = User::new("Bob", "America/New_York");
    let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

    let calendar = Arc::new(MockCalendar::new(vec![
        event(date, 9, "Design review", &user, &alice),
        event(date, 13, "Budget sync", &user, &bob),
    ]));
    let directory = Arc::new(MockDirectory::new([
        user.clone(),
        alice.clone(),
        bob.clone(),
    ]));
    let messenger = Arc::new(MockMessenger::new());
    messenger.script_reply(alice.id, "Sure, that works for me.");
    messenger.script_reply(bob.id, "That doesn't work for me, sorry.");

    let service = WorkflowService::new(
        Arc::new(reschedule::build_graph().map_err(miette::Report::from)?),
        mock::collaborators(Arc::clone(&calendar), directory, messenger),
        RuntimeConfig::from_env().checkpointer().await?,
    );

    let thread_id = uuid::Uuid::new_v4().to_string();
    eprintln!("-- session {thread_id}");
    for event in calendar.events() {
        eprintln!("   {} at {}", event.title, event.start_time.format("%H:%M"));
    }

    let seed = StateRecord::initial(date, &user).map_err(miette::Report::from)?;
    print_session(service.start(&thread_id, seed)).await?;

    // Answer each pending confirmation the way a client would, as a resume
    // signal line bound to the interrupt id.
    for id in [
        reschedule::names::CONFIRM_START,
        reschedule::names::CONFIRM_PROPOSALS,
    ] {
        let signal = ClientSignal::Resume {
            id: id.to_string(),
            value: serde_json::json!(CONFIRMATION),
        };
        eprintln!("-> {}", serde_json::to_string(&signal).into_diagnostic()?);
        let session = service
            .resume(&thread_id, id, serde_json::json!(CONFIRMATION))
            .await?;
        print_session(session).await?;
    }

    eprintln!("-- calendar after the run");
    for event in calendar.events() {
        eprintln!("   {} at {}", event.title, event.start_time.format("%H:%M"));
    }
    Ok(())
}
