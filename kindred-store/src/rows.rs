//! Named row shapes. Every query result is mapped into one of these at the
//! repository boundary; untyped rows never travel further up.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use kindred_shared::errors::{StoreError, StoreResult};

use crate::dbi::Row;

#[derive(Debug, Deserialize)]
pub struct ContactRow {
    pub id: Uuid,
    pub phone: String,
    pub dob: NaiveDate,
    pub is_redlisted: bool,
    pub tos_agreed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRow {
    pub contact: Uuid,
    pub name: String,
    pub dob: NaiveDate,
    pub bio: String,
    pub gender: String,
    pub photo_urls: Vec<String>,
    pub relationship_interests: Vec<String>,
    pub neurodiversities: Vec<String>,
    pub interests: Vec<String>,
    pub last_location_name: String,
    pub pronouns: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreferencesRow {
    pub contact: Uuid,
    pub allow_notifications: bool,
    pub show_transgender: bool,
    pub gender_interests: Vec<String>,
}

/// Requester's own row for the discovery query; preferences may not exist
/// yet, hence the nullable side of the join.
#[derive(Debug, Deserialize)]
pub struct ExplorePrefsRow {
    pub dob: NaiveDate,
    pub show_transgender: Option<bool>,
    pub gender_interests: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CountRow {
    pub n: i64,
}

#[derive(Debug, Deserialize)]
pub struct MatchCheckRow {
    pub is_match: bool,
}

#[derive(Debug, Deserialize)]
pub struct MessageRow {
    pub id: i64,
    pub from_contact: Uuid,
    pub to_contact: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreatedRow {
    pub id: i64,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionTargetRow {
    pub target: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ContactIdRow {
    pub contact: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CandidateRow {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InteractionKindsRow {
    pub contact: Uuid,
    pub kinds: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationConfigRow {
    pub token: String,
    pub token_last_updated: DateTime<Utc>,
    pub pending_kinds: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GreenlistRow {
    pub phone: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct ClientVersionRow {
    pub semver: String,
    pub is_update_required: bool,
    pub created_at: DateTime<Utc>,
}

/// Decode a raw row into its named shape. Failure here is an internal
/// invariant error: the query and the shape no longer agree.
pub(crate) fn decode<T: DeserializeOwned>(row: Row) -> StoreResult<T> {
    serde_json::from_value(row)
        .map_err(|err| StoreError::Internal(anyhow::anyhow!("row decode failed: {err}")))
}
