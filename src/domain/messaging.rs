use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Messaging platform an invitee is reachable on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagingPlatform {
    #[serde(rename = "slack")]
    Slack,
    #[serde(rename = "microsoft-teams")]
    MicrosoftTeams,
}

/// Delivery receipt returned by [`Messenger::send_message`], used to poll for
/// the invitee's reply.
///
/// [`Messenger::send_message`]: super::Messenger::send_message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub id: Uuid,
    pub platform: MessagingPlatform,
    pub recipient: UserId,
}

/// Classification of an invitee's reply to a rescheduling proposal.
///
/// `Unknown` is treated like `Negative` when resolving proposals: only an
/// unambiguously positive reply accepts a reschedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Unknown,
}
