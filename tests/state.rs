use chrono::Days;
use proptest::prelude::*;
use rustc_hash::FxHashMap;

use rebook::domain::User;
use rebook::state::{SchemaViolation, Stage, StateRecord, fields};

mod common;

fn initial() -> StateRecord {
    let fixture = common::Fixture::new();
    fixture.seed()
}

#[test]
fn extend_rejects_missing_fields() {
    let err = initial()
        .extend(Stage::WithCalendar, FxHashMap::default())
        .unwrap_err();
    assert!(matches!(
        err,
        SchemaViolation::MissingField {
            stage: Stage::WithCalendar,
            field: fields::CALENDAR,
        }
    ));
}

#[test]
fn extend_rejects_undeclared_fields() {
    let mut extra = FxHashMap::default();
    extra.insert(fields::CALENDAR.to_string(), serde_json::json!([]));
    extra.insert("surprise".to_string(), serde_json::json!(1));
    let err = initial().extend(Stage::WithCalendar, extra).unwrap_err();
    assert!(matches!(
        err,
        SchemaViolation::UnexpectedField { field, .. } if field == "surprise"
    ));
}

#[test]
fn extend_rejects_stage_that_drops_fields() {
    let mut extra = FxHashMap::default();
    extra.insert(fields::CALENDAR.to_string(), serde_json::json!([]));
    let with_calendar = initial().extend(Stage::WithCalendar, extra).unwrap();
    let err = with_calendar
        .extend(Stage::Outreach, FxHashMap::default())
        .unwrap_err();
    assert!(matches!(err, SchemaViolation::NotAnExtension { .. }));
}

#[test]
fn extend_may_skip_intermediate_stages() {
    let mut extra = FxHashMap::default();
    extra.insert(fields::CALENDAR.to_string(), serde_json::json!([]));
    extra.insert(fields::INVITEES.to_string(), serde_json::json!([]));
    extra.insert(fields::INVITEE_CALENDARS.to_string(), serde_json::json!({}));
    let jumped = initial().extend(Stage::WithInvitees, extra).unwrap();
    assert_eq!(jumped.stage(), Stage::WithInvitees);
}

#[test]
fn typed_accessors_decode_written_fields() {
    let fixture = common::Fixture::new();
    let record = fixture.seed();
    assert_eq!(record.date().unwrap(), fixture.date);
    assert_eq!(record.user().unwrap(), fixture.user);
}

#[test]
fn accessor_fails_on_absent_field() {
    let err = initial().calendar().unwrap_err();
    assert!(matches!(
        err,
        SchemaViolation::FieldAbsent {
            stage: Stage::Initial,
            ref field,
        } if field == fields::CALENDAR
    ));
    assert!(err.to_string().contains("absent"));
}

proptest! {
    /// Any seed record survives a serde round trip with its tag intact.
    #[test]
    fn seed_round_trips(given_name in "[A-Za-z]{1,12}", offset in 0u64..3650) {
        let user = User::new(&given_name, "Europe/Berlin");
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(offset))
            .unwrap();
        let record = StateRecord::initial(date, &user).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: StateRecord = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.stage(), Stage::Initial);
        prop_assert_eq!(back, record);
    }
}
