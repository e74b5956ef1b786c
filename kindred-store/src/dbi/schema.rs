use serde::de::DeserializeOwned;

use kindred_shared::errors::{StoreError, StoreResult};

use crate::dbi::Row;
use crate::rows::{ContactRow, CountRow, PreferencesRow, ProfileRow};

/// Named shapes a cached payload may take. Payloads are checked against
/// their shape both before being trusted from the cache and before being
/// written into it; a mismatch in either direction is fatal, never a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheShape {
    Contact,
    Profile,
    Preferences,
    CanMessage,
}

impl CacheShape {
    pub fn name(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Profile => "profile",
            Self::Preferences => "preferences",
            Self::CanMessage => "can-message",
        }
    }

    /// Check `value` against the shape, reporting the first violation.
    pub fn validate(self, value: &Row) -> StoreResult<()> {
        match self {
            Self::Contact => check::<ContactRow>(self, value),
            Self::Profile => check::<ProfileRow>(self, value),
            Self::Preferences => check::<PreferencesRow>(self, value),
            Self::CanMessage => check::<CountRow>(self, value),
        }
    }
}

fn check<T: DeserializeOwned>(shape: CacheShape, value: &Row) -> StoreResult<()> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(_) => Ok(()),
        Err(err) => Err(StoreError::Schema {
            shape: shape.name(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_value() -> Row {
        json!({
            "id": "7f8ad1f4-3b3c-4be2-9621-0d6b86b0f8f1",
            "phone": "+15551234567",
            "dob": "1990-01-01",
            "is_redlisted": false,
            "tos_agreed": true,
        })
    }

    #[test]
    fn accepts_matching_payload() {
        assert!(CacheShape::Contact.validate(&contact_value()).is_ok());
    }

    #[test]
    fn rejects_missing_field() {
        let mut value = contact_value();
        value.as_object_mut().unwrap().remove("phone");

        let err = CacheShape::Contact.validate(&value).unwrap_err();
        assert!(matches!(err, StoreError::Schema { shape: "contact", .. }));
    }

    #[test]
    fn rejects_wrong_type() {
        let mut value = contact_value();
        value["is_redlisted"] = json!("yes");
        assert!(CacheShape::Contact.validate(&value).is_err());
    }

    #[test]
    fn can_message_expects_count() {
        assert!(CacheShape::CanMessage.validate(&json!({ "n": 2 })).is_ok());
        assert!(CacheShape::CanMessage.validate(&json!({ "n": "2" })).is_err());
    }

    #[test]
    fn tolerates_extra_fields() {
        let mut value = contact_value();
        value["unrelated"] = json!(1);
        assert!(CacheShape::Contact.validate(&value).is_ok());
    }
}
