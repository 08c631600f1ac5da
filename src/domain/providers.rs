//! Collaborator contracts the workflow engine consumes.
//!
//! Implementations are injected through [`Collaborators`], never looked up
//! through process-wide registries, so concurrent executions and test runs
//! cannot interfere with each other. Retry policy belongs behind these seams;
//! the engine itself never retries a provider call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use uuid::Uuid;

use super::calendar::{CalendarEvent, CalendarEventId};
use super::messaging::{MessageReceipt, Sentiment};
use super::proposal::ProposedReschedule;
use super::user::{User, UserId};
use crate::message::ConversationMessage;

/// Failure raised by a collaborator. Propagates out of the running step and
/// aborts that step's branch only; the fan-out coordinator contains it.
#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    #[error("no user with id {0}")]
    #[diagnostic(code(rebook::provider::user_not_found))]
    UserNotFound(UserId),

    #[error("no calendar event with id {0}")]
    #[diagnostic(code(rebook::provider::event_not_found))]
    EventNotFound(CalendarEventId),

    #[error("no delivery receipt {0}")]
    #[diagnostic(
        code(rebook::provider::receipt_not_found),
        help("Receipts are only valid for messages sent through the same messenger instance.")
    )]
    ReceiptNotFound(Uuid),

    #[error("{what} timed out")]
    #[diagnostic(code(rebook::provider::timeout))]
    Timeout { what: String },
}

/// Read and reschedule calendar events.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn get_events_on(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, ProviderError>;

    async fn change_event_time(
        &self,
        event_id: CalendarEventId,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<(), ProviderError>;
}

/// Resolve user identities to directory records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<User, ProviderError>;
}

/// Send messages to invitees and poll for replies.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        recipient: &User,
        text: &str,
    ) -> Result<MessageReceipt, ProviderError>;

    /// `Ok(None)` means no reply yet; callers poll.
    async fn get_response(
        &self,
        receipt: &MessageReceipt,
    ) -> Result<Option<String>, ProviderError>;
}

/// LLM-backed proposal drafting.
#[async_trait]
pub trait ProposalGenerator: Send + Sync {
    async fn propose(
        &self,
        date: NaiveDate,
        user: &User,
        calendar: &[CalendarEvent],
        invitee_calendars: &FxHashMap<UserId, Vec<CalendarEvent>>,
    ) -> Result<Vec<ProposedReschedule>, ProviderError>;
}

/// LLM-backed classification of an invitee's reply.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(
        &self,
        proposals: &[ProposedReschedule],
        sent: &ConversationMessage,
        received: &ConversationMessage,
    ) -> Result<Sentiment, ProviderError>;
}

/// The full set of collaborators one execution runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub calendar: Arc<dyn CalendarProvider>,
    pub directory: Arc<dyn UserDirectory>,
    pub messenger: Arc<dyn Messenger>,
    pub proposals: Arc<dyn ProposalGenerator>,
    pub sentiment: Arc<dyn SentimentClassifier>,
}
