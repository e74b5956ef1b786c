use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::location::Location;

// --- Contact ---

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: Uuid,
    pub phone: String,
    pub dob: NaiveDate,
    pub is_redlisted: bool,
    pub tos_agreed: bool,
}

/// Age in whole years as of `now`. Never stored; always derived from the
/// contact's date of birth at read time.
pub fn derive_age(dob: NaiveDate, now: DateTime<Utc>) -> i32 {
    let days = (now.date_naive() - dob).num_days();
    (days as f64 / 365.25).floor() as i32
}

// --- Profile ---

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub uid: Uuid,
    pub name: String,
    pub age: i32,
    pub bio: String,
    pub gender: String,
    pub photo_urls: Vec<String>,
    pub relationship_interests: Vec<String>,
    pub neurodiversities: Vec<String>,
    pub interests: Vec<String>,
    pub city: String,
    pub pronouns: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub bio: String,
    pub gender: String,
    pub is_transgender: bool,
    pub photo_urls: Vec<String>,
    pub relationship_interests: Vec<String>,
    pub neurodiversities: Vec<String>,
    pub interests: Vec<String>,
    pub pronouns: Option<String>,
    pub location: Location,
    pub city: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfile {
    pub name: String,
    pub bio: String,
    pub gender: String,
    pub relationship_interests: Vec<String>,
    pub neurodiversities: Vec<String>,
    pub interests: Vec<String>,
    pub pronouns: Option<String>,
}

// --- Interactions ---

/// The fixed set of interaction tags a contact can attach when expressing
/// interest in another contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Flings,
    Friends,
    Romance,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flings => "flings",
            Self::Friends => "friends",
            Self::Romance => "romance",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "flings" => Some(Self::Flings),
            "friends" => Some(Self::Friends),
            "romance" => Some(Self::Romance),
            _ => None,
        }
    }
}

// --- Messages ---

/// Direction of a message relative to the contact who asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFrom {
    /// Sent by the requesting contact.
    Local = 0,
    /// Sent by the other party.
    Remote = 1,
}

impl Serialize for MessageFrom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub from: MessageFrom,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

// --- Matches ---

#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub profile: Profile,
    pub last_message: Option<Message>,
    pub num_unread: i64,
    /// Interaction tags both sides declared for each other.
    pub shared_kinds: Vec<InteractionKind>,
}

// --- Preferences ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderInterest {
    Men,
    Nonbinary,
    Women,
}

impl GenderInterest {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Nonbinary => "nonbinary",
            Self::Women => "women",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "men" => Some(Self::Men),
            "nonbinary" => Some(Self::Nonbinary),
            "women" => Some(Self::Women),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Men, Self::Nonbinary, Self::Women]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Preferences {
    pub allow_notifications: bool,
    pub show_transgender: bool,
    pub gender_interests: Vec<GenderInterest>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            allow_notifications: true,
            show_transgender: true,
            gender_interests: GenderInterest::all(),
        }
    }
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize)]
pub struct NotificationConfig {
    pub contact: Uuid,
    pub token: String,
    pub token_last_updated: DateTime<Utc>,
    /// Notification kinds already delivered and not yet acknowledged by the
    /// client; used to suppress repeats of the same kind.
    pub pending_kinds: Vec<String>,
}

// --- Extras ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneGreenlistEntry {
    pub phone: String,
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientVersion {
    pub semver: String,
    pub is_update_required: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn age_derives_from_dob() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        assert_eq!(derive_age(dob, now), 34);

        // A later stored birth date changes every subsequent read.
        let dob = NaiveDate::from_ymd_opt(1994, 1, 1).unwrap();
        assert_eq!(derive_age(dob, now), 30);
    }

    #[test]
    fn age_day_before_birthday() {
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        let dob = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(derive_age(dob, now), 23);
    }

    #[test]
    fn interaction_kind_tags_roundtrip() {
        for kind in [
            InteractionKind::Flings,
            InteractionKind::Friends,
            InteractionKind::Romance,
        ] {
            assert_eq!(InteractionKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(InteractionKind::from_tag("enemies"), None);
    }

    #[test]
    fn message_from_serializes_as_flag() {
        let json = serde_json::to_value(MessageFrom::Local).unwrap();
        assert_eq!(json, serde_json::json!(0));
        let json = serde_json::to_value(MessageFrom::Remote).unwrap();
        assert_eq!(json, serde_json::json!(1));
    }
}
