//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rebook::domain::mock::{self, MockCalendar, MockDirectory, MockMessenger};
use rebook::domain::{
    CalendarEvent, CalendarEventId, Collaborators, EventInvitee, ProposedReschedule, User, UserId,
};
use rebook::protocol::ClientRecord;
use rebook::service::SessionStream;
use rebook::state::{Stage, StateRecord, fields};
use rustc_hash::FxHashMap;

pub const DEMO_DATE: &str = "2025-06-02";

pub fn demo_date() -> NaiveDate {
    DEMO_DATE.parse().unwrap()
}

pub fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
}

pub fn event_on(
    date: NaiveDate,
    hour: u32,
    title: &str,
    owner: UserId,
    invitees: &[UserId],
) -> CalendarEvent {
    CalendarEvent {
        id: CalendarEventId::random(),
        title: title.to_string(),
        description: format!("{title} on {date}"),
        owner,
        invitees: invitees.iter().copied().map(EventInvitee::required).collect(),
        start_time: at(date, hour),
        end_time: at(date, hour + 1),
    }
}

/// A user with two invitees, each on one event of the day.
pub struct Fixture {
    pub user: User,
    pub alice: User,
    pub bob: User,
    pub date: NaiveDate,
    pub calendar: Arc<MockCalendar>,
    pub messenger: Arc<MockMessenger>,
    pub collaborators: Arc<Collaborators>,
}

impl Fixture {
    pub fn new() -> Self {
        let user = User::new("Dana", "Europe/Berlin");
        let alice = User::new("Alice", "Europe/London");
        let bob = User::new("Bob", "America/New_York");
        let date = demo_date();
        let events = vec![
            event_on(date, 9, "Design review", user.id, &[alice.id]),
            event_on(date, 13, "Budget sync", user.id, &[bob.id]),
        ];
        let calendar = Arc::new(MockCalendar::new(events));
        let directory = Arc::new(MockDirectory::new([
            user.clone(),
            alice.clone(),
            bob.clone(),
        ]));
        let messenger = Arc::new(MockMessenger::new());
        let collaborators = mock::collaborators(
            Arc::clone(&calendar),
            Arc::clone(&directory),
            Arc::clone(&messenger),
        );
        Self {
            user,
            alice,
            bob,
            date,
            calendar,
            messenger,
            collaborators,
        }
    }

    pub fn seed(&self) -> StateRecord {
        StateRecord::initial(self.date, &self.user).unwrap()
    }

    /// Hand-built proposals shifting every event one hour later.
    pub fn proposals(&self) -> Vec<ProposedReschedule> {
        self.calendar
            .events()
            .iter()
            .map(|event| ProposedReschedule {
                event: event.clone(),
                new_start_time: event.start_time + chrono::Duration::hours(1),
                new_end_time: event.end_time + chrono::Duration::hours(1),
                explanation: format!("Shift \"{}\" by one hour.", event.title),
            })
            .collect()
    }

    /// A record advanced to the point where the fan-out triggers.
    pub fn pending_state(&self) -> StateRecord {
        let events = self.calendar.events();
        let invitee_calendars: FxHashMap<UserId, Vec<CalendarEvent>> =
            [&self.alice, &self.bob]
                .into_iter()
                .map(|invitee| {
                    let theirs = events
                        .iter()
                        .filter(|e| e.involves(invitee.id))
                        .cloned()
                        .collect();
                    (invitee.id, theirs)
                })
                .collect();

        let mut calendar = FxHashMap::default();
        calendar.insert(
            fields::CALENDAR.to_string(),
            serde_json::to_value(&events).unwrap(),
        );
        let mut invitees = FxHashMap::default();
        invitees.insert(
            fields::INVITEES.to_string(),
            serde_json::to_value(vec![self.alice.clone(), self.bob.clone()]).unwrap(),
        );
        invitees.insert(
            fields::INVITEE_CALENDARS.to_string(),
            serde_json::to_value(&invitee_calendars).unwrap(),
        );
        let mut pending = FxHashMap::default();
        pending.insert(
            fields::PENDING_PROPOSALS.to_string(),
            serde_json::to_value(self.proposals()).unwrap(),
        );

        self.seed()
            .extend(Stage::WithCalendar, calendar)
            .unwrap()
            .extend(Stage::WithInvitees, invitees)
            .unwrap()
            .extend(Stage::WithPendingProposals, pending)
            .unwrap()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain every record of a session, then resolve its outcome.
pub async fn drain(
    session: SessionStream,
) -> (
    Vec<ClientRecord>,
    Result<rebook::runtime::RunOutcome, rebook::service::ServiceError>,
) {
    let mut records = Vec::new();
    while let Ok(record) = session.records.recv_async().await {
        records.push(record);
    }
    let outcome = session.outcome.await.expect("session task panicked");
    (records, outcome)
}

/// The interrupt a drained session ended on.
pub fn last_interrupt(records: &[ClientRecord]) -> Option<(&str, &str)> {
    records.iter().rev().find_map(|record| match record {
        ClientRecord::Interrupt { id, value } => Some((id.as_str(), value.as_str())),
        _ => None,
    })
}
