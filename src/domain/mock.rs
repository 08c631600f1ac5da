//! In-process collaborator implementations for the demo workflow and tests.
//!
//! These are ordinary injected objects, not global registries: each instance
//! owns its own data, so concurrent executions never observe each other.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use rand::Rng;
use rand::seq::IndexedRandom;
use rustc_hash::{FxHashMap, FxHashSet};
use uuid::Uuid;

use super::calendar::{CalendarEvent, CalendarEventId};
use super::messaging::{MessageReceipt, MessagingPlatform, Sentiment};
use super::proposal::ProposedReschedule;
use super::providers::{
    CalendarProvider, Collaborators, Messenger, ProposalGenerator, ProviderError,
    SentimentClassifier, UserDirectory,
};
use super::user::{User, UserId};
use crate::message::ConversationMessage;

/// Canned invitee replies agreeing to a reschedule.
pub const POSITIVE_REPLIES: &[&str] = &[
    "Sure, that works for me.",
    "Sounds good, thanks for checking first!",
    "Yes, the new time is fine on my end.",
];

/// Canned invitee replies declining a reschedule.
pub const NEGATIVE_REPLIES: &[&str] = &[
    "No, I can't make that time unfortunately.",
    "That doesn't work for me, sorry.",
    "Unable to move it on my side, I'm afraid.",
];

/// Calendar backed by an in-memory event list.
#[derive(Default)]
pub struct MockCalendar {
    events: Mutex<Vec<CalendarEvent>>,
}

impl MockCalendar {
    #[must_use]
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    /// Current event list, for assertions on applied reschedules.
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    async fn get_events_on(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, ProviderError> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.start_time.date_naive() == date)
            .cloned()
            .collect())
    }

    async fn change_event_time(
        &self,
        event_id: CalendarEventId,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(ProviderError::EventNotFound(event_id))?;
        event.start_time = new_start;
        event.end_time = new_end;
        Ok(())
    }
}

/// User directory backed by a fixed map.
#[derive(Default)]
pub struct MockDirectory {
    users: FxHashMap<UserId, User>,
}

impl MockDirectory {
    #[must_use]
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn get_user(&self, id: UserId) -> Result<User, ProviderError> {
        self.users
            .get(&id)
            .cloned()
            .ok_or(ProviderError::UserNotFound(id))
    }
}

/// Messenger that answers from scripted replies when present, otherwise from
/// a random canned pool. Recipients marked unresponsive never answer.
#[derive(Default)]
pub struct MockMessenger {
    receipts: Mutex<FxHashMap<Uuid, UserId>>,
    scripted: Mutex<FxHashMap<UserId, VecDeque<String>>>,
    unresponsive: Mutex<FxHashSet<UserId>>,
}

impl MockMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply `recipient` will give to the next message.
    pub fn script_reply(&self, recipient: UserId, reply: &str) {
        self.scripted
            .lock()
            .entry(recipient)
            .or_default()
            .push_back(reply.to_string());
    }

    /// `recipient` will never reply; polling yields `None` forever.
    pub fn mark_unresponsive(&self, recipient: UserId) {
        self.unresponsive.lock().insert(recipient);
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_message(
        &self,
        recipient: &User,
        _text: &str,
    ) -> Result<MessageReceipt, ProviderError> {
        let receipt = MessageReceipt {
            id: Uuid::new_v4(),
            platform: MessagingPlatform::Slack,
            recipient: recipient.id,
        };
        self.receipts.lock().insert(receipt.id, recipient.id);
        Ok(receipt)
    }

    async fn get_response(
        &self,
        receipt: &MessageReceipt,
    ) -> Result<Option<String>, ProviderError> {
        let recipient = *self
            .receipts
            .lock()
            .get(&receipt.id)
            .ok_or(ProviderError::ReceiptNotFound(receipt.id))?;
        if self.unresponsive.lock().contains(&recipient) {
            return Ok(None);
        }
        if let Some(reply) = self
            .scripted
            .lock()
            .get_mut(&recipient)
            .and_then(VecDeque::pop_front)
        {
            return Ok(Some(reply));
        }
        let mut rng = rand::rng();
        let pool = if rng.random_bool(0.5) {
            POSITIVE_REPLIES
        } else {
            NEGATIVE_REPLIES
        };
        Ok(pool.choose(&mut rng).map(|r| (*r).to_string()))
    }
}

/// Drafts one-hour shifts for every event on the requested date.
#[derive(Default)]
pub struct ShiftProposalGenerator;

#[async_trait]
impl ProposalGenerator for ShiftProposalGenerator {
    async fn propose(
        &self,
        _date: NaiveDate,
        _user: &User,
        calendar: &[CalendarEvent],
        invitee_calendars: &FxHashMap<UserId, Vec<CalendarEvent>>,
    ) -> Result<Vec<ProposedReschedule>, ProviderError> {
        let shift = Duration::hours(1);
        Ok(calendar
            .iter()
            .map(|event| {
                let clashes = invitee_calendars
                    .values()
                    .flatten()
                    .filter(|other| other.id != event.id && other.overlaps(event))
                    .count();
                ProposedReschedule {
                    event: event.clone(),
                    new_start_time: event.start_time + shift,
                    new_end_time: event.end_time + shift,
                    explanation: format!(
                        "Moving \"{}\" one hour later clears {clashes} conflicting slot(s) \
                         across the invitees' calendars.",
                        event.title
                    ),
                }
            })
            .collect())
    }
}

/// Keyword heuristic standing in for an LLM classifier.
#[derive(Default)]
pub struct KeywordSentimentClassifier;

const POSITIVE_MARKERS: &[&str] = &["yes", "sure", "works", "sounds good", "fine", "perfect"];
const NEGATIVE_MARKERS: &[&str] = &["no", "can't", "cannot", "unable", "doesn't work", "sorry"];

#[async_trait]
impl SentimentClassifier for KeywordSentimentClassifier {
    async fn classify(
        &self,
        _proposals: &[ProposedReschedule],
        _sent: &ConversationMessage,
        received: &ConversationMessage,
    ) -> Result<Sentiment, ProviderError> {
        let reply = received.content.to_lowercase();
        if POSITIVE_MARKERS.iter().any(|m| reply.contains(m)) {
            Ok(Sentiment::Positive)
        } else if NEGATIVE_MARKERS.iter().any(|m| reply.contains(m)) {
            Ok(Sentiment::Negative)
        } else {
            Ok(Sentiment::Unknown)
        }
    }
}

/// Wire the standard mock set into a [`Collaborators`] bundle.
#[must_use]
pub fn collaborators(
    calendar: Arc<MockCalendar>,
    directory: Arc<MockDirectory>,
    messenger: Arc<MockMessenger>,
) -> Arc<Collaborators> {
    Arc::new(Collaborators {
        calendar,
        directory,
        messenger,
        proposals: Arc::new(ShiftProposalGenerator),
        sentiment: Arc::new(KeywordSentimentClassifier),
    })
}
