//! Domain records and the collaborator seams the workflow engine calls
//! through.
//!
//! Everything external — calendars, user lookup, messaging, LLM-backed
//! proposal drafting and sentiment classification — is reached via the traits
//! in [`providers`], injected explicitly into the execution context. The
//! [`mock`] module carries the in-process implementations the demo workflow
//! and test suites run against.

mod calendar;
mod messaging;
pub mod mock;
mod proposal;
mod providers;
mod user;

pub use calendar::{CalendarEvent, CalendarEventId, EventInvitee};
pub use messaging::{MessageReceipt, MessagingPlatform, Sentiment};
pub use proposal::{ProposalOutcome, ProposedReschedule};
pub use providers::{
    CalendarProvider, Collaborators, Messenger, ProposalGenerator, ProviderError,
    SentimentClassifier, UserDirectory,
};
pub use user::{User, UserId};
