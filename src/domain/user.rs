use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identity, shared by calendar owners, invitees, and message
/// recipients. Serializes as a UUID string, so it is usable as a JSON map key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A person known to the user directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub given_name: String,
    /// IANA timezone name, e.g. `Europe/Berlin`.
    pub timezone: String,
}

impl User {
    #[must_use]
    pub fn new(given_name: &str, timezone: &str) -> Self {
        Self {
            id: UserId::random(),
            given_name: given_name.to_string(),
            timezone: timezone.to_string(),
        }
    }
}
