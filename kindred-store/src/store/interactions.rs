use futures::future::try_join_all;
use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::{CacheShape, CacheSpec, DatabaseInterface, Param};
use crate::models::{InteractionKind, Match, Profile};
use crate::rows::{self, CountRow, InteractionKindsRow, MatchCheckRow};
use crate::store::{cache_key, ttl, Store};

/// Interactions older than this drop out of "recent" listings and the
/// discovery exclusion set. Matches never expire.
pub(crate) const RECENT_WINDOW: &str = "24 hours";

/// Tags both sides declared for each other, in the requester's order.
fn shared_kinds(mine: &[String], theirs: &[String]) -> Vec<InteractionKind> {
    mine.iter()
        .filter(|tag| theirs.contains(tag))
        .filter_map(|tag| InteractionKind::from_tag(tag))
        .collect()
}

impl<I: DatabaseInterface> Store<I> {
    /// Re-interacting with the same target replaces the kind set and
    /// refreshes the timestamp.
    pub async fn interaction_upsert(
        &self,
        contact: Uuid,
        target: Uuid,
        kinds: &[InteractionKind],
    ) -> StoreResult<()> {
        let tags: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
        self.dbi()
            .write_one(
                r#"
                INSERT INTO interactions (contact, target, kinds)
                VALUES ($1, $2, $3)
                ON CONFLICT (contact, target) DO UPDATE
                SET kinds = $3,
                    created_at = now()
                "#,
                &[
                    Param::Uuid(contact),
                    Param::Uuid(target),
                    Param::TextArray(tags),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    /// Profiles this contact has interacted with inside the recent window.
    pub async fn interactions_recent(&self, contact: Uuid) -> StoreResult<Vec<Profile>> {
        let targets = self.recent_interaction_targets(contact).await?;
        let profiles = try_join_all(targets.iter().map(|&id| self.profile_get(id))).await?;
        Ok(profiles.into_iter().flatten().collect())
    }

    pub async fn interaction_delete(&self, contact: Uuid, target: Uuid) -> StoreResult<()> {
        self.dbi()
            .delete_one(
                r#"
                DELETE FROM interactions
                WHERE contact = $1
                    AND target = $2
                "#,
                &[Param::Uuid(contact), Param::Uuid(target)],
                None,
            )
            .await?;
        Ok(())
    }

    /// Whether a mutual interaction exists, i.e. the pair may message each
    /// other. A single self-joined count avoids a torn read between the two
    /// directions. The result is cached under the sorted pair key with a
    /// short TTL; it is not invalidated on interaction-create, so a new
    /// match can take up to the TTL to become visible here.
    pub async fn can_message(&self, from: Uuid, to: Uuid) -> StoreResult<bool> {
        let spec = CacheSpec::ttl(
            cache_key::can_message(from, to),
            CacheShape::CanMessage,
            ttl::CAN_MESSAGE_SECS,
        );
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT COUNT(*) AS n
                FROM interactions i1
                INNER JOIN interactions i2
                    ON i1.contact = i2.target
                    AND i1.target = i2.contact
                WHERE i1.contact = $1
                    AND i1.target = $2
                "#,
                &[Param::Uuid(from), Param::Uuid(to)],
                Some(&spec),
            )
            .await?;

        let n = row
            .map(rows::decode::<CountRow>)
            .transpose()?
            .map(|row| row.n)
            .unwrap_or(0);
        Ok(n > 0)
    }

    /// The match between `contact` and `target`, if one exists. Requires
    /// mutual interactions and a surviving target profile; derived fields
    /// are computed relative to `contact`.
    pub async fn match_get(&self, contact: Uuid, target: Uuid) -> StoreResult<Option<Match>> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT COUNT(*) = 2 AS is_match
                FROM interactions
                WHERE (contact = $1 AND target = $2)
                    OR (contact = $2 AND target = $1)
                "#,
                &[Param::Uuid(contact), Param::Uuid(target)],
                None,
            )
            .await?;

        let is_match = row
            .map(rows::decode::<MatchCheckRow>)
            .transpose()?
            .map(|row| row.is_match)
            .unwrap_or(false);
        if !is_match {
            return Ok(None);
        }

        let Some(profile) = self.profile_get(target).await? else {
            // A match is only as valid as both profiles existing.
            return Ok(None);
        };

        let last_message = self.last_message_between(contact, target).await?;
        let num_unread = self.unread_count(contact, target).await?;
        let shared_kinds = self.kinds_between(contact, target).await?;

        Ok(Some(Match {
            profile,
            last_message,
            num_unread,
            shared_kinds,
        }))
    }

    /// All matches for `contact`. Per-match derivations run concurrently,
    /// one batch per field, reassembled by input index; matched contacts
    /// whose profile has been deleted are dropped.
    pub async fn matches_get(&self, contact: Uuid) -> StoreResult<Vec<Match>> {
        let others = self.match_contact_ids(contact).await?;

        let profiles = try_join_all(others.iter().map(|&id| self.profile_get(id))).await?;
        let last_messages =
            try_join_all(others.iter().map(|&id| self.last_message_between(contact, id))).await?;
        let unreads =
            try_join_all(others.iter().map(|&id| self.unread_count(contact, id))).await?;
        let kinds =
            try_join_all(others.iter().map(|&id| self.kinds_between(contact, id))).await?;

        let mut matches = Vec::with_capacity(others.len());
        for (((profile, last_message), num_unread), shared_kinds) in profiles
            .into_iter()
            .zip(last_messages)
            .zip(unreads)
            .zip(kinds)
        {
            let Some(profile) = profile else { continue };
            matches.push(Match {
                profile,
                last_message,
                num_unread,
                shared_kinds,
            });
        }

        Ok(matches)
    }

    /// Contacts with a mutual interaction, regardless of age.
    pub(crate) async fn match_contact_ids(&self, contact: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows = self
            .dbi()
            .read_many(
                r#"
                SELECT i2.contact
                FROM interactions i1
                INNER JOIN interactions i2
                    ON i2.contact = i1.target
                    AND i2.target = i1.contact
                WHERE i1.contact = $1
                "#,
                &[Param::Uuid(contact)],
            )
            .await?;

        rows.into_iter()
            .map(|row| rows::decode::<rows::ContactIdRow>(row).map(|r| r.contact))
            .collect()
    }

    pub(crate) async fn recent_interaction_targets(
        &self,
        contact: Uuid,
    ) -> StoreResult<Vec<Uuid>> {
        let query = format!(
            r#"
            SELECT target
            FROM interactions
            WHERE contact = $1
                AND created_at > now() - INTERVAL '{RECENT_WINDOW}'
            "#
        );
        let rows = self.dbi().read_many(&query, &[Param::Uuid(contact)]).await?;

        rows.into_iter()
            .map(|row| rows::decode::<rows::InteractionTargetRow>(row).map(|r| r.target))
            .collect()
    }

    /// Intersection of the two directed kind sets for this pair.
    async fn kinds_between(&self, contact: Uuid, other: Uuid) -> StoreResult<Vec<InteractionKind>> {
        let rows = self
            .dbi()
            .read_many(
                r#"
                SELECT contact, kinds
                FROM interactions
                WHERE (contact = $1 AND target = $2)
                    OR (contact = $2 AND target = $1)
                "#,
                &[Param::Uuid(contact), Param::Uuid(other)],
            )
            .await?;

        let mut mine: Vec<String> = Vec::new();
        let mut theirs: Vec<String> = Vec::new();
        for row in rows {
            let row: InteractionKindsRow = rows::decode(row)?;
            if row.contact == contact {
                mine = row.kinds;
            } else {
                theirs = row.kinds;
            }
        }

        Ok(shared_kinds(&mine, &theirs))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dbi::testing::FakeDb;
    use crate::dbi::Row;

    const ME: &str = "11111111-1111-4111-8111-111111111111";
    const THEM: &str = "22222222-2222-4222-8222-222222222222";

    fn profile_row(contact: &str) -> Row {
        json!({
            "contact": contact,
            "name": "Ada",
            "dob": "1990-01-01",
            "bio": "hi",
            "gender": "woman",
            "photo_urls": [],
            "relationship_interests": [],
            "neurodiversities": [],
            "interests": [],
            "last_location_name": "Kelowna",
            "pronouns": null,
        })
    }

    #[test]
    fn shared_kinds_intersects() {
        let mine = vec!["flings".to_string(), "friends".to_string()];
        let theirs = vec!["friends".to_string(), "romance".to_string()];
        assert_eq!(shared_kinds(&mine, &theirs), vec![InteractionKind::Friends]);
        assert!(shared_kinds(&mine, &[]).is_empty());
    }

    #[test]
    fn shared_kinds_ignores_unknown_tags() {
        let mine = vec!["friends".to_string(), "enemies".to_string()];
        let theirs = mine.clone();
        assert_eq!(shared_kinds(&mine, &theirs), vec![InteractionKind::Friends]);
    }

    #[tokio::test]
    async fn one_sided_interaction_is_no_match() {
        let dbi = FakeDb::new();
        dbi.push_one(Some(json!({ "is_match": false })));

        let store = Store::new(dbi);
        let result = store
            .match_get(ME.parse().unwrap(), THEM.parse().unwrap())
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.dbi().calls(), vec!["read_one"]);
    }

    #[tokio::test]
    async fn match_get_assembles_derived_fields() {
        let dbi = FakeDb::new();
        dbi.push_one(Some(json!({ "is_match": true })));
        dbi.push_one(Some(profile_row(THEM)));
        // Last message was sent by the other party.
        dbi.push_one(Some(json!({
            "id": 41,
            "from_contact": THEM,
            "to_contact": ME,
            "content": "hey",
            "sent_at": "2024-06-01T12:00:00Z",
        })));
        dbi.push_one(Some(json!({ "n": 1 })));
        dbi.push_many(vec![
            json!({ "contact": ME, "kinds": ["romance", "friends"] }),
            json!({ "contact": THEM, "kinds": ["romance"] }),
        ]);

        let store = Store::new(dbi);
        let result = store
            .match_get(ME.parse().unwrap(), THEM.parse().unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.num_unread, 1);
        assert_eq!(result.shared_kinds, vec![InteractionKind::Romance]);
        let last = result.last_message.unwrap();
        assert_eq!(last.id, 41);
        assert_eq!(last.from, crate::models::MessageFrom::Remote);
    }

    #[tokio::test]
    async fn match_with_deleted_profile_is_gone() {
        let dbi = FakeDb::new();
        dbi.push_one(Some(json!({ "is_match": true })));
        dbi.push_one(None);

        let store = Store::new(dbi);
        let result = store
            .match_get(ME.parse().unwrap(), THEM.parse().unwrap())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn matches_get_drops_deleted_profiles() {
        let dbi = FakeDb::new();
        // Two matched contacts...
        dbi.push_many(vec![
            json!({ "contact": THEM }),
            json!({ "contact": "33333333-3333-4333-8333-333333333333" }),
        ]);
        // ...but only the first profile still exists.
        dbi.push_one(Some(profile_row(THEM)));
        dbi.push_one(None);
        // Last messages, unread counts, kinds per contact.
        dbi.push_one(None);
        dbi.push_one(None);
        dbi.push_one(Some(json!({ "n": 0 })));
        dbi.push_one(Some(json!({ "n": 0 })));
        dbi.push_many(vec![]);
        dbi.push_many(vec![]);

        let store = Store::new(dbi);
        let matches = store.matches_get(ME.parse().unwrap()).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].num_unread, 0);
        assert!(matches[0].last_message.is_none());
    }
}
