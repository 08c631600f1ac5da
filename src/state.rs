//! Staged workflow state: a progressively-extended record with a fresh tag
//! per stage.
//!
//! A [`StateRecord`] is an immutable snapshot of workflow progress. Each
//! pipeline stage owns a strict superset of the previous stage's fields, and
//! the record carries a [`Stage`] discriminant set at construction time so
//! serializers and branch logic can dispatch without reflection. Stages are
//! modeled as a flat tagged enum plus a field map rather than a type
//! hierarchy, so the tag can never go stale when a later stage is built from
//! an earlier one.
//!
//! The only way to move between stages is [`StateRecord::extend`], which
//! validates that the caller supplies *exactly* the fields the next stage
//! declares beyond the current one. Anything else is a [`SchemaViolation`]
//! and treated as a programmer error.
//!
//! # Examples
//!
//! ```rust
//! use rebook::domain::{User, UserId};
//! use rebook::state::{fields, Stage, StateRecord};
//! use rustc_hash::FxHashMap;
//!
//! let user = User {
//!     id: UserId::random(),
//!     given_name: "Dana".to_string(),
//!     timezone: "Europe/Berlin".to_string(),
//! };
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
//! let initial = StateRecord::initial(date, &user).unwrap();
//!
//! let mut calendar = FxHashMap::default();
//! calendar.insert(fields::CALENDAR.to_string(), serde_json::json!([]));
//! let next = initial.extend(Stage::WithCalendar, calendar).unwrap();
//! assert_eq!(next.stage(), Stage::WithCalendar);
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CalendarEvent, ProposalOutcome, ProposedReschedule, Sentiment, User, UserId};
use crate::message::{ConversationLog, ConversationMessage};

/// Field name constants shared by stages, steps, and graph validation.
pub mod fields {
    pub const DATE: &str = "date";
    pub const USER: &str = "user";
    pub const CALENDAR: &str = "calendar";
    pub const INVITEES: &str = "invitees";
    pub const INVITEE_CALENDARS: &str = "invitee_calendars";
    pub const PENDING_PROPOSALS: &str = "pending_proposals";
    pub const CONVERSATIONS: &str = "conversations_by_invitee";
    pub const PROPOSAL_OUTCOMES: &str = "proposal_outcomes";
    pub const OUTREACH_FAILURES: &str = "outreach_failures";
    pub const COMPLETED_PROPOSALS: &str = "completed_proposals";

    // Per-invitee branch fields.
    pub const INVITEE: &str = "invitee";
    pub const SENT_MESSAGE: &str = "sent_message";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIVED_MESSAGE: &str = "received_message";
    pub const SENTIMENT: &str = "sentiment";
}

use fields::*;

/// Stage discriminant for [`StateRecord`].
///
/// The first six variants belong to the main rescheduling workflow; the
/// `Outreach*` variants belong to the per-invitee sub-workflow, whose seed is
/// a projection of the parent state rather than the full record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    WithCalendar,
    WithInvitees,
    WithPendingProposals,
    WithInviteeMessages,
    Completed,
    Outreach,
    OutreachSent,
    OutreachAnswered,
    OutreachClassified,
}

impl Stage {
    /// Cumulative field list this stage guarantees to carry.
    pub const fn declared_fields(self) -> &'static [&'static str] {
        match self {
            Stage::Initial => &[DATE, USER],
            Stage::WithCalendar => &[DATE, USER, CALENDAR],
            Stage::WithInvitees => &[DATE, USER, CALENDAR, INVITEES, INVITEE_CALENDARS],
            Stage::WithPendingProposals => &[
                DATE,
                USER,
                CALENDAR,
                INVITEES,
                INVITEE_CALENDARS,
                PENDING_PROPOSALS,
            ],
            Stage::WithInviteeMessages => &[
                DATE,
                USER,
                CALENDAR,
                INVITEES,
                INVITEE_CALENDARS,
                PENDING_PROPOSALS,
                CONVERSATIONS,
                PROPOSAL_OUTCOMES,
                OUTREACH_FAILURES,
            ],
            Stage::Completed => &[
                DATE,
                USER,
                CALENDAR,
                INVITEES,
                INVITEE_CALENDARS,
                PENDING_PROPOSALS,
                CONVERSATIONS,
                PROPOSAL_OUTCOMES,
                OUTREACH_FAILURES,
                COMPLETED_PROPOSALS,
            ],
            Stage::Outreach => &[USER, INVITEE, PENDING_PROPOSALS],
            Stage::OutreachSent => &[USER, INVITEE, PENDING_PROPOSALS, SENT_MESSAGE, RECEIPT],
            Stage::OutreachAnswered => &[
                USER,
                INVITEE,
                PENDING_PROPOSALS,
                SENT_MESSAGE,
                RECEIPT,
                RECEIVED_MESSAGE,
            ],
            Stage::OutreachClassified => &[
                USER,
                INVITEE,
                PENDING_PROPOSALS,
                SENT_MESSAGE,
                RECEIPT,
                RECEIVED_MESSAGE,
                SENTIMENT,
            ],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::WithCalendar => "with_calendar",
            Stage::WithInvitees => "with_invitees",
            Stage::WithPendingProposals => "with_pending_proposals",
            Stage::WithInviteeMessages => "with_invitee_messages",
            Stage::Completed => "completed",
            Stage::Outreach => "outreach",
            Stage::OutreachSent => "outreach_sent",
            Stage::OutreachAnswered => "outreach_answered",
            Stage::OutreachClassified => "outreach_classified",
        }
    }

    pub fn declares(self, field: &str) -> bool {
        self.declared_fields().contains(&field)
    }

    /// True when `self` carries every field `base` carries.
    pub fn extends(self, base: Stage) -> bool {
        base.declared_fields().iter().all(|f| self.declares(f))
    }

    /// Fields `self` adds on top of `base`.
    pub fn new_fields_over(self, base: Stage) -> Vec<&'static str> {
        self.declared_fields()
            .iter()
            .copied()
            .filter(|f| !base.declares(f))
            .collect()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable snapshot of workflow progress, tagged with its [`Stage`].
///
/// Serializes flat: `{"stage": "with_calendar", "date": ..., "user": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    stage: Stage,
    #[serde(flatten)]
    fields: FxHashMap<String, serde_json::Value>,
}

impl StateRecord {
    /// Construct a record at `stage` from exactly its declared fields.
    ///
    /// Used for workflow seeds: the main graph's `Initial` record, or a
    /// branch's `Outreach` projection. Fails with [`SchemaViolation`] when
    /// the field set does not match the stage declaration exactly.
    pub fn new(
        stage: Stage,
        fields: FxHashMap<String, serde_json::Value>,
    ) -> Result<Self, SchemaViolation> {
        for required in stage.declared_fields() {
            if !fields.contains_key(*required) {
                return Err(SchemaViolation::MissingField {
                    stage,
                    field: required,
                });
            }
        }
        for key in fields.keys() {
            if !stage.declares(key) {
                return Err(SchemaViolation::UnexpectedField {
                    stage,
                    field: key.clone(),
                });
            }
        }
        Ok(Self { stage, fields })
    }

    /// Convenience seed for the main workflow.
    pub fn initial(date: chrono::NaiveDate, user: &User) -> Result<Self, SchemaViolation> {
        let mut fields = FxHashMap::default();
        fields.insert(DATE.to_owned(), serde_json::to_value(date)?);
        fields.insert(USER.to_owned(), serde_json::to_value(user)?);
        Self::new(Stage::Initial, fields)
    }

    /// Extend this record to `next`, supplying exactly the fields `next`
    /// declares beyond the current stage.
    ///
    /// The returned record gets its tag set fresh from `next`; the source
    /// record is untouched. Missing or unexpected fields fail with
    /// [`SchemaViolation`], as does a `next` stage that is not a superset of
    /// the current one.
    pub fn extend(
        &self,
        next: Stage,
        new_fields: FxHashMap<String, serde_json::Value>,
    ) -> Result<Self, SchemaViolation> {
        if !next.extends(self.stage) {
            return Err(SchemaViolation::NotAnExtension {
                from: self.stage,
                to: next,
            });
        }
        let expected = next.new_fields_over(self.stage);
        for required in &expected {
            if !new_fields.contains_key(*required) {
                return Err(SchemaViolation::MissingField {
                    stage: next,
                    field: required,
                });
            }
        }
        for key in new_fields.keys() {
            if !expected.contains(&key.as_str()) {
                return Err(SchemaViolation::UnexpectedField {
                    stage: next,
                    field: key.clone(),
                });
            }
        }
        let mut fields = self.fields.clone();
        fields.extend(new_fields);
        Ok(Self {
            stage: next,
            fields,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Decode a field into a concrete domain type.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<T, SchemaViolation> {
        let value = self
            .fields
            .get(name)
            .ok_or_else(|| SchemaViolation::FieldAbsent {
                stage: self.stage,
                field: name.to_owned(),
            })?;
        serde_json::from_value(value.clone()).map_err(|source| SchemaViolation::Decode {
            field: name.to_owned(),
            source,
        })
    }

    pub fn date(&self) -> Result<chrono::NaiveDate, SchemaViolation> {
        self.field(DATE)
    }

    pub fn user(&self) -> Result<User, SchemaViolation> {
        self.field(USER)
    }

    pub fn calendar(&self) -> Result<Vec<CalendarEvent>, SchemaViolation> {
        self.field(CALENDAR)
    }

    pub fn invitees(&self) -> Result<Vec<User>, SchemaViolation> {
        self.field(INVITEES)
    }

    pub fn invitee_calendars(
        &self,
    ) -> Result<FxHashMap<UserId, Vec<CalendarEvent>>, SchemaViolation> {
        self.field(INVITEE_CALENDARS)
    }

    pub fn pending_proposals(&self) -> Result<Vec<ProposedReschedule>, SchemaViolation> {
        self.field(PENDING_PROPOSALS)
    }

    pub fn conversations_by_invitee(&self) -> Result<ConversationLog, SchemaViolation> {
        self.field(CONVERSATIONS)
    }

    pub fn proposal_outcomes(
        &self,
    ) -> Result<FxHashMap<UserId, Vec<ProposalOutcome>>, SchemaViolation> {
        self.field(PROPOSAL_OUTCOMES)
    }

    pub fn outreach_failures(&self) -> Result<FxHashMap<UserId, String>, SchemaViolation> {
        self.field(OUTREACH_FAILURES)
    }

    pub fn completed_proposals(&self) -> Result<Vec<ProposedReschedule>, SchemaViolation> {
        self.field(COMPLETED_PROPOSALS)
    }

    pub fn invitee(&self) -> Result<User, SchemaViolation> {
        self.field(INVITEE)
    }

    pub fn sent_message(&self) -> Result<ConversationMessage, SchemaViolation> {
        self.field(SENT_MESSAGE)
    }

    pub fn received_message(&self) -> Result<ConversationMessage, SchemaViolation> {
        self.field(RECEIVED_MESSAGE)
    }

    pub fn sentiment(&self) -> Result<Sentiment, SchemaViolation> {
        self.field(SENTIMENT)
    }
}

/// State shape invariant broken. Programmer error, never recovered at runtime.
#[derive(Debug, Error, Diagnostic)]
pub enum SchemaViolation {
    #[error("stage {to} is not an extension of {from}")]
    #[diagnostic(
        code(rebook::state::not_an_extension),
        help("A step may only advance the record to a stage declaring a superset of its fields.")
    )]
    NotAnExtension { from: Stage, to: Stage },

    #[error("stage {stage} requires field `{field}`")]
    #[diagnostic(code(rebook::state::missing_field))]
    MissingField { stage: Stage, field: &'static str },

    #[error("field `{field}` is not declared by stage {stage}")]
    #[diagnostic(
        code(rebook::state::unexpected_field),
        help("Steps must contribute exactly the fields the next stage declares beyond the current one.")
    )]
    UnexpectedField { stage: Stage, field: String },

    #[error("field `{field}` is absent from this {stage} record")]
    #[diagnostic(
        code(rebook::state::field_absent),
        help("Reads may only touch fields a prior step has written; check the step's requires() list.")
    )]
    FieldAbsent { stage: Stage, field: String },

    #[error("field `{field}` failed to decode: {source}")]
    #[diagnostic(code(rebook::state::decode))]
    Decode {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(rebook::state::serde_json))]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn dana() -> User {
        User {
            id: UserId::random(),
            given_name: "Dana".to_owned(),
            timezone: "Europe/Berlin".to_owned(),
        }
    }

    #[test]
    fn stage_field_sets_are_cumulative() {
        assert!(Stage::WithCalendar.extends(Stage::Initial));
        assert!(Stage::Completed.extends(Stage::WithInviteeMessages));
        assert!(!Stage::Initial.extends(Stage::WithCalendar));
        assert_eq!(
            Stage::WithCalendar.new_fields_over(Stage::Initial),
            vec![CALENDAR]
        );
    }

    #[test]
    fn branch_stages_do_not_extend_main_stages() {
        assert!(!Stage::Outreach.extends(Stage::Initial));
        assert!(Stage::OutreachClassified.extends(Stage::Outreach));
    }

    #[test]
    fn tag_is_set_fresh_on_extend() {
        let initial =
            StateRecord::initial(chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), &dana())
                .unwrap();
        let mut extra = FxHashMap::default();
        extra.insert(CALENDAR.to_owned(), serde_json::json!([]));
        let next = initial.extend(Stage::WithCalendar, extra).unwrap();
        assert_eq!(initial.stage(), Stage::Initial);
        assert_eq!(next.stage(), Stage::WithCalendar);
    }

    #[test]
    fn serializes_with_flat_stage_tag() {
        let record =
            StateRecord::initial(chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), &dana())
                .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "initial");
        assert_eq!(json["date"], "2025-06-02");
        let back: StateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
