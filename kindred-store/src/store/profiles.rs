use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::{CacheShape, CacheSpec, DatabaseInterface, Param};
use crate::models::{self, NewProfile, Profile, UpdateProfile};
use crate::rows::{self, ProfileRow};
use crate::store::{cache_key, ttl, Store};

/// RETURNING list shared by every profile write. The caller's dob parameter
/// is spliced in so the cached row always carries the date the age is
/// derived from.
fn profile_returning(dob_param: &str) -> String {
    format!(
        r#"contact, name, {dob_param}::date AS dob, bio,
        gender, photo_urls, relationship_interests,
        neurodiversities, interests, last_location_name,
        pronouns"#
    )
}

/// Map a profile row into the public entity, deriving the age from the
/// contact's date of birth at read time. Text fields are trimmed; legacy
/// rows carry padded values.
pub(crate) fn profile_from_row(row: ProfileRow) -> Profile {
    Profile {
        uid: row.contact,
        name: row.name.trim().to_string(),
        age: models::derive_age(row.dob, Utc::now()),
        bio: row.bio.trim().to_string(),
        gender: row.gender.trim().to_string(),
        photo_urls: row.photo_urls,
        relationship_interests: row.relationship_interests,
        neurodiversities: row
            .neurodiversities
            .into_iter()
            .map(|e| e.trim().to_string())
            .collect(),
        interests: row.interests,
        city: row.last_location_name.trim().to_string(),
        pronouns: row.pronouns.map(|p| p.trim().to_string()),
    }
}

fn profile_spec(contact: Uuid) -> CacheSpec {
    CacheSpec::ttl(
        cache_key::profile(contact),
        CacheShape::Profile,
        ttl::PROFILE_SECS,
    )
}

impl<I: DatabaseInterface> Store<I> {
    /// One profile per contact; a second create is a typed duplicate-key
    /// conflict. The new profile starts moderation review and stays hidden
    /// until review passes.
    pub async fn profile_create(
        &self,
        contact: Uuid,
        dob: NaiveDate,
        profile: NewProfile,
    ) -> StoreResult<Profile> {
        let returning = profile_returning("$13");
        let query = format!(
            r#"
            INSERT INTO profiles (
                contact, name, bio, gender, is_transgender, relationship_interests,
                last_location_name, neurodiversities,
                interests, pronouns, last_location, photo_urls
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, ST_Point($12, $11, 4326), $14)
            RETURNING {returning}
            "#
        );

        let row = self
            .dbi()
            .write_one(
                &query,
                &[
                    Param::Uuid(contact),
                    Param::Text(profile.name),
                    Param::Text(profile.bio),
                    Param::Text(profile.gender),
                    Param::Bool(profile.is_transgender),
                    Param::TextArray(profile.relationship_interests),
                    Param::Text(profile.city),
                    Param::TextArray(profile.neurodiversities),
                    Param::TextArray(profile.interests),
                    Param::OptText(profile.pronouns),
                    Param::Float(profile.location.latitude),
                    Param::Float(profile.location.longitude),
                    Param::Date(dob),
                    Param::TextArray(profile.photo_urls),
                ],
                Some(&profile_spec(contact)),
            )
            .await?
            .ok_or_else(|| {
                kindred_shared::errors::StoreError::Internal(anyhow::anyhow!(
                    "profile insert returned no row"
                ))
            })?;

        self.enqueue_profile_review(contact).await?;
        Ok(profile_from_row(rows::decode(row)?))
    }

    pub async fn profile_get(&self, contact: Uuid) -> StoreResult<Option<Profile>> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT co.id AS contact, pr.name, co.dob, pr.bio,
                    pr.gender, pr.photo_urls, pr.relationship_interests,
                    pr.neurodiversities, pr.interests, pr.last_location_name,
                    pr.pronouns
                FROM contacts co
                INNER JOIN profiles pr
                    ON co.id = pr.contact
                WHERE co.id = $1
                "#,
                &[Param::Uuid(contact)],
                Some(&profile_spec(contact)),
            )
            .await?;

        row.map(rows::decode::<ProfileRow>)
            .transpose()
            .map(|row| row.map(profile_from_row))
    }

    /// Any successful update suppresses visibility and re-enters moderation
    /// review.
    pub async fn profile_update(
        &self,
        contact: Uuid,
        dob: NaiveDate,
        update: UpdateProfile,
    ) -> StoreResult<Option<Profile>> {
        let returning = profile_returning("$9");
        let query = format!(
            r#"
            UPDATE profiles
            SET name = $2,
                bio = $3,
                gender = $4,
                relationship_interests = $5,
                is_visible = false,
                neurodiversities = $6,
                interests = $7,
                pronouns = $8
            WHERE contact = $1
            RETURNING {returning}
            "#
        );

        let row = self
            .dbi()
            .write_one(
                &query,
                &[
                    Param::Uuid(contact),
                    Param::Text(update.name),
                    Param::Text(update.bio),
                    Param::Text(update.gender),
                    Param::TextArray(update.relationship_interests),
                    Param::TextArray(update.neurodiversities),
                    Param::TextArray(update.interests),
                    Param::OptText(update.pronouns),
                    Param::Date(dob),
                ],
                Some(&profile_spec(contact)),
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        self.enqueue_profile_review(contact).await?;
        Ok(Some(profile_from_row(rows::decode(row)?)))
    }

    pub async fn photo_add(&self, contact: Uuid, dob: NaiveDate, url: &str) -> StoreResult<()> {
        let returning = profile_returning("$3");
        let query = format!(
            r#"
            UPDATE profiles
            SET photo_urls = array_append(photo_urls, $1),
                is_visible = false
            WHERE contact = $2
            RETURNING {returning}
            "#
        );

        self.dbi()
            .write_one(
                &query,
                &[
                    Param::Text(url.to_string()),
                    Param::Uuid(contact),
                    Param::Date(dob),
                ],
                Some(&profile_spec(contact)),
            )
            .await?;

        self.enqueue_profile_review(contact).await?;
        Ok(())
    }

    pub async fn photo_remove(&self, contact: Uuid, dob: NaiveDate, url: &str) -> StoreResult<()> {
        let returning = profile_returning("$3");
        let query = format!(
            r#"
            UPDATE profiles
            SET photo_urls = array_remove(photo_urls, $1)
            WHERE contact = $2
            RETURNING {returning}
            "#
        );

        self.dbi()
            .write_one(
                &query,
                &[
                    Param::Text(url.to_string()),
                    Param::Uuid(contact),
                    Param::Date(dob),
                ],
                Some(&profile_spec(contact)),
            )
            .await?;
        Ok(())
    }

    /// Remove a profile and everything hanging off it: interactions in both
    /// directions, the message history, any pending review entry, and
    /// finally the profile row itself (evicting its cache entry first).
    pub async fn profile_delete(&self, contact: Uuid) -> StoreResult<()> {
        self.dbi()
            .delete_many(
                r#"
                DELETE FROM interactions
                WHERE contact = $1
                    OR target = $1
                "#,
                &[Param::Uuid(contact)],
            )
            .await?;

        self.dbi()
            .delete_many(
                r#"
                DELETE FROM messages
                WHERE from_contact = $1
                    OR to_contact = $1
                "#,
                &[Param::Uuid(contact)],
            )
            .await?;

        self.dbi()
            .delete_many(
                r#"
                DELETE FROM review_queue
                WHERE kind = 'profile'
                    AND item = $1
                "#,
                &[Param::Uuid(contact)],
            )
            .await?;

        self.dbi()
            .delete_one(
                r#"
                DELETE FROM profiles
                WHERE contact = $1
                "#,
                &[Param::Uuid(contact)],
                Some(&profile_spec(contact)),
            )
            .await?;
        Ok(())
    }

    /// Conflicts are ignored: the contact may already be queued, e.g. after
    /// deleting a profile and creating a new one before review ran.
    async fn enqueue_profile_review(&self, contact: Uuid) -> StoreResult<()> {
        self.dbi()
            .write_one(
                r#"
                INSERT INTO review_queue (kind, item)
                VALUES ('profile', $1)
                ON CONFLICT DO NOTHING
                "#,
                &[Param::Uuid(contact)],
                None,
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
    use crate::dbi::Row;

    fn profile_row(contact: &str, dob: &str) -> Row {
        json!({
            "contact": contact,
            "name": " Ada ",
            "dob": dob,
            "bio": "hi",
            "gender": "woman",
            "photo_urls": ["https://img.example/1.jpg"],
            "relationship_interests": ["romance"],
            "neurodiversities": [" adhd "],
            "interests": ["climbing"],
            "last_location_name": "Kelowna",
            "pronouns": "she/her",
        })
    }

    #[tokio::test]
    async fn profile_get_derives_age_and_trims() {
        let dbi = FakeDb::new();
        let id = "7f8ad1f4-3b3c-4be2-9621-0d6b86b0f8f1";
        dbi.push_one(Some(profile_row(id, "1990-01-01")));

        let store = Store::new(dbi);
        let profile = store.profile_get(id.parse().unwrap()).await.unwrap().unwrap();

        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.neurodiversities, vec!["adhd"]);
        let expected = models::derive_age(
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            Utc::now(),
        );
        assert_eq!(profile.age, expected);
    }

    #[tokio::test]
    async fn update_missing_profile_is_none() {
        let dbi = FakeDb::new();
        dbi.push_one(None);

        let store = Store::new(dbi);
        let update = UpdateProfile {
            name: "Ada".into(),
            bio: "hi".into(),
            gender: "woman".into(),
            relationship_interests: vec![],
            neurodiversities: vec![],
            interests: vec![],
            pronouns: None,
        };
        let result = store
            .profile_update(
                Uuid::new_v4(),
                NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                update,
            )
            .await
            .unwrap();

        assert!(result.is_none());
        // No review entry is queued for a profile that does not exist.
        assert_eq!(store.dbi().calls(), vec!["write_one"]);
    }
}
