use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::CalendarEvent;

/// A proposed new time for one calendar event, with the natural-language
/// justification the proposal generator produced for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedReschedule {
    pub event: CalendarEvent,
    pub new_start_time: DateTime<Utc>,
    pub new_end_time: DateTime<Utc>,
    pub explanation: String,
}

/// Terminal resolution of a [`ProposedReschedule`] after an invitee's reply
/// has been classified. Outcomes are never re-opened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProposalOutcome {
    Accepted { proposal: ProposedReschedule },
    Rejected { proposal: ProposedReschedule },
}

impl ProposalOutcome {
    pub fn proposal(&self) -> &ProposedReschedule {
        match self {
            ProposalOutcome::Accepted { proposal } | ProposalOutcome::Rejected { proposal } => {
                proposal
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ProposalOutcome::Accepted { .. })
    }
}
