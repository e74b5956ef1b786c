use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::{CacheShape, CacheSpec, DatabaseInterface, Param};
use crate::models::{GenderInterest, Preferences};
use crate::rows::{self, PreferencesRow};
use crate::store::{cache_key, ttl, Store};

fn preferences_from_row(row: PreferencesRow) -> Preferences {
    Preferences {
        allow_notifications: row.allow_notifications,
        show_transgender: row.show_transgender,
        gender_interests: row
            .gender_interests
            .iter()
            .filter_map(|tag| GenderInterest::from_tag(tag))
            .collect(),
    }
}

fn preferences_spec(contact: Uuid) -> CacheSpec {
    CacheSpec::ttl(
        cache_key::preferences(contact),
        CacheShape::Preferences,
        ttl::PREFERENCES_SECS,
    )
}

impl<I: DatabaseInterface> Store<I> {
    /// Preferences always exist from the caller's point of view: a contact
    /// without a row gets permissive defaults created on first read.
    pub async fn preferences_get(&self, contact: Uuid) -> StoreResult<Preferences> {
        let spec = preferences_spec(contact);
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT contact, allow_notifications, show_transgender, gender_interests
                FROM preferences
                WHERE contact = $1
                "#,
                &[Param::Uuid(contact)],
                Some(&spec),
            )
            .await?;

        let row = match row {
            Some(row) => row,
            None => self
                .dbi()
                .write_one(
                    r#"
                    INSERT INTO preferences (
                        contact, allow_notifications, show_transgender,
                        gender_interests
                    ) VALUES ($1, true, true, $2)
                    RETURNING contact, allow_notifications, show_transgender, gender_interests
                    "#,
                    &[
                        Param::Uuid(contact),
                        Param::TextArray(
                            GenderInterest::all()
                                .into_iter()
                                .map(|g| g.as_str().to_string())
                                .collect(),
                        ),
                    ],
                    Some(&spec),
                )
                .await?
                .ok_or_else(|| {
                    kindred_shared::errors::StoreError::Internal(anyhow::anyhow!(
                        "preferences insert returned no row"
                    ))
                })?,
        };

        Ok(preferences_from_row(rows::decode(row)?))
    }

    pub async fn preferences_set(
        &self,
        contact: Uuid,
        preferences: &Preferences,
    ) -> StoreResult<()> {
        let interests: Vec<String> = preferences
            .gender_interests
            .iter()
            .map(|g| g.as_str().to_string())
            .collect();

        self.dbi()
            .write_one(
                r#"
                INSERT INTO preferences (contact, allow_notifications, show_transgender, gender_interests)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (contact) DO UPDATE
                SET allow_notifications = $2,
                    show_transgender = $3,
                    gender_interests = $4
                RETURNING contact, allow_notifications, show_transgender, gender_interests
                "#,
                &[
                    Param::Uuid(contact),
                    Param::Bool(preferences.allow_notifications),
                    Param::Bool(preferences.show_transgender),
                    Param::TextArray(interests),
                ],
                Some(&preferences_spec(contact)),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dbi::testing::FakeDb;

    const ME: &str = "11111111-1111-4111-8111-111111111111";

    #[tokio::test]
    async fn absent_preferences_are_created_with_defaults() {
        let dbi = FakeDb::new();
        dbi.push_one(None);
        dbi.push_one(Some(json!({
            "contact": ME,
            "allow_notifications": true,
            "show_transgender": true,
            "gender_interests": ["men", "nonbinary", "women"],
        })));

        let store = Store::new(dbi);
        let prefs = store.preferences_get(ME.parse().unwrap()).await.unwrap();

        assert!(prefs.allow_notifications);
        assert_eq!(prefs.gender_interests, GenderInterest::all());
        assert_eq!(store.dbi().calls(), vec!["read_one", "write_one"]);
    }

    #[tokio::test]
    async fn unknown_interest_tags_are_dropped() {
        let dbi = FakeDb::new();
        dbi.push_one(Some(json!({
            "contact": ME,
            "allow_notifications": false,
            "show_transgender": false,
            "gender_interests": ["women", "robots"],
        })));

        let store = Store::new(dbi);
        let prefs = store.preferences_get(ME.parse().unwrap()).await.unwrap();
        assert_eq!(prefs.gender_interests, vec![GenderInterest::Women]);
    }
}
