//! Conversation entries exchanged with invitees, and the per-invitee
//! conversation log the fan-out phase merges into parent state.
//!
//! Merge semantics follow the accumulator contract: entries for distinct
//! invitee keys are unioned, entries for the same key are concatenated in
//! arrival order, never overwritten.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Direction of a conversation entry relative to the workflow's user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// One message exchanged with an invitee during the outreach phase.
///
/// Every entry carries its own sender and recipient, so a serialized
/// conversation identifies its parties without relying on the map key it is
/// stored under.
///
/// # Examples
///
/// ```
/// use rebook::domain::UserId;
/// use rebook::message::{ConversationMessage, Direction};
///
/// let user = UserId::random();
/// let invitee = UserId::random();
/// let sent = ConversationMessage::outgoing(user, invitee, "Could we move our 10:00 sync?");
/// assert_eq!(sent.direction, Direction::Outgoing);
/// assert_eq!(sent.sender, user);
/// assert_eq!(sent.recipient, invitee);
///
/// let json = serde_json::to_string(&sent).unwrap();
/// let parsed: ConversationMessage = serde_json::from_str(&json).unwrap();
/// assert_eq!(sent, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub direction: Direction,
    pub sender: UserId,
    pub recipient: UserId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ConversationMessage {
    #[must_use]
    pub fn new(direction: Direction, sender: UserId, recipient: UserId, content: &str) -> Self {
        Self {
            direction,
            sender,
            recipient,
            content: content.to_string(),
            sent_at: Utc::now(),
        }
    }

    /// Message sent from the workflow's user to an invitee.
    #[must_use]
    pub fn outgoing(sender: UserId, recipient: UserId, content: &str) -> Self {
        Self::new(Direction::Outgoing, sender, recipient, content)
    }

    /// Message received back from an invitee.
    #[must_use]
    pub fn incoming(sender: UserId, recipient: UserId, content: &str) -> Self {
        Self::new(Direction::Incoming, sender, recipient, content)
    }
}

/// Conversation history accumulated per invitee identity.
pub type ConversationLog = FxHashMap<UserId, Vec<ConversationMessage>>;

/// Merge `update` into `log`, concatenating entries per key.
///
/// Keys present only in `update` are inserted; keys present in both have the
/// update's entries appended after the existing ones, preserving order within
/// each invitee's conversation. Nothing is ever dropped or overwritten.
pub fn merge_conversations(log: &mut ConversationLog, update: ConversationLog) {
    for (invitee, entries) in update {
        log.entry(invitee).or_default().extend(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same-key merges concatenate and preserve order.
    #[test]
    fn merge_concatenates_same_key() {
        let user = UserId::random();
        let invitee = UserId::random();
        let mut log = ConversationLog::default();
        log.insert(
            invitee,
            vec![ConversationMessage::outgoing(user, invitee, "first")],
        );

        let mut update = ConversationLog::default();
        update.insert(
            invitee,
            vec![ConversationMessage::incoming(invitee, user, "second")],
        );
        merge_conversations(&mut log, update);

        let entries = &log[&invitee];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "first");
        assert_eq!(entries[1].content, "second");
    }

    /// Distinct keys union without loss.
    #[test]
    fn merge_unions_distinct_keys() {
        let user = UserId::random();
        let a = UserId::random();
        let b = UserId::random();
        let mut log = ConversationLog::default();
        log.insert(a, vec![ConversationMessage::outgoing(user, a, "to a")]);

        let mut update = ConversationLog::default();
        update.insert(b, vec![ConversationMessage::outgoing(user, b, "to b")]);
        merge_conversations(&mut log, update);

        assert_eq!(log.len(), 2);
        assert_eq!(log[&a][0].content, "to a");
        assert_eq!(log[&b][0].content, "to b");
    }

    /// Sender and recipient survive a serde round trip alongside the payload.
    #[test]
    fn entries_round_trip_with_their_parties() {
        let user = UserId::random();
        let invitee = UserId::random();
        let sent = ConversationMessage::outgoing(user, invitee, "proposal text");
        let received = ConversationMessage::incoming(invitee, user, "works for me");

        for message in [&sent, &received] {
            let json = serde_json::to_value(message).unwrap();
            let back: ConversationMessage = serde_json::from_value(json).unwrap();
            assert_eq!(&back, message);
        }
        assert_eq!(sent.sender, user);
        assert_eq!(sent.recipient, invitee);
        assert_eq!(received.sender, invitee);
        assert_eq!(received.recipient, user);
    }
}
