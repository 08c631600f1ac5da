use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Identity of a calendar event, stable across reschedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarEventId(Uuid);

impl CalendarEventId {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CalendarEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A person invited to an event. Optional invitees do not block a reschedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInvitee {
    pub user_id: UserId,
    pub optional: bool,
}

impl EventInvitee {
    #[must_use]
    pub fn required(user_id: UserId) -> Self {
        Self {
            user_id,
            optional: false,
        }
    }
}

/// One entry in a calendar, as returned by the calendar provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: CalendarEventId,
    pub title: String,
    pub description: String,
    pub owner: UserId,
    pub invitees: Vec<EventInvitee>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Whether `user` is the owner or an invitee of this event.
    pub fn involves(&self, user: UserId) -> bool {
        self.owner == user || self.invitees.iter().any(|i| i.user_id == user)
    }

    /// Whether this event's time window overlaps `other`'s.
    pub fn overlaps(&self, other: &CalendarEvent) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}
