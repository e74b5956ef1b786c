use futures::future::try_join_all;
use uuid::Uuid;

use kindred_shared::errors::{StoreError, StoreResult};

use crate::dbi::{DatabaseInterface, Param};
use crate::location::Location;
use crate::models::{GenderInterest, Profile};
use crate::rows::{self, CandidateRow, ExplorePrefsRow};
use crate::store::Store;

/// Absent preferences mean "show everyone": all gender interests, include
/// transgender profiles.
fn interest_tags(stored: Option<Vec<String>>) -> Vec<String> {
    match stored {
        Some(tags) if !tags.is_empty() => tags,
        _ => GenderInterest::all()
            .into_iter()
            .map(|g| g.as_str().to_string())
            .collect(),
    }
}

/// {self} ∪ {recently interacted} ∪ {matched, unbounded by time}.
fn exclusion_set(requester: Uuid, recent: Vec<Uuid>, matched: Vec<Uuid>) -> Vec<Uuid> {
    let mut exclude = Vec::with_capacity(1 + recent.len() + matched.len());
    exclude.push(requester);
    exclude.extend(recent);
    exclude.extend(matched);
    exclude
}

impl<I: DatabaseInterface> Store<I> {
    /// Candidate profiles for discovery, closest in age first, then closest
    /// in space. Doubles as a location check-in: the requester's location
    /// and label are persisted before the candidate query runs.
    pub async fn explore_profiles(
        &self,
        contact: Uuid,
        location: Location,
        location_name: &str,
        max_distance_metres: f64,
    ) -> StoreResult<Vec<Profile>> {
        let prefs = self
            .dbi()
            .read_one(
                r#"
                SELECT co.dob, pr.show_transgender, pr.gender_interests
                FROM contacts co
                LEFT JOIN preferences pr
                    ON pr.contact = co.id
                WHERE co.id = $1
                "#,
                &[Param::Uuid(contact)],
                None,
            )
            .await?
            .ok_or_else(|| StoreError::Internal(anyhow::anyhow!("unknown contact {contact}")))?;
        let prefs: ExplorePrefsRow = rows::decode(prefs)?;

        let recent = self.recent_interaction_targets(contact).await?;
        let matched = self.match_contact_ids(contact).await?;
        let exclude = exclusion_set(contact, recent, matched);

        // The check-in must commit before the candidate query observes it.
        self.dbi()
            .write_one(
                r#"
                UPDATE profiles
                SET last_location = ST_Point($3, $2, 4326),
                    last_location_name = $1
                WHERE contact = $4
                "#,
                &[
                    Param::Text(location_name.to_string()),
                    Param::Float(location.latitude),
                    Param::Float(location.longitude),
                    Param::Uuid(contact),
                ],
                None,
            )
            .await?;

        let candidates = self
            .dbi()
            .read_many(
                r#"
                SELECT co.id
                FROM profiles pr
                INNER JOIN contacts co
                    ON co.id = pr.contact
                WHERE co.id <> ALL($1)
                    AND NOT co.is_redlisted
                    AND (
                        (pr.gender = 'man' AND 'men' = ANY($2))
                        OR (pr.gender = 'woman' AND 'women' = ANY($2))
                        OR (pr.gender <> 'man' AND pr.gender <> 'woman'
                            AND 'nonbinary' = ANY($2))
                    )
                    AND (NOT pr.is_transgender OR $3)
                    AND pr.is_visible = true
                    AND ST_DWithin(pr.last_location, ST_Point($5, $4, 4326), $6)
                ORDER BY abs(co.dob - $7) ASC,
                    ST_Distance(pr.last_location, ST_Point($5, $4, 4326)) ASC
                "#,
                &[
                    Param::UuidArray(exclude),
                    Param::TextArray(interest_tags(prefs.gender_interests)),
                    Param::Bool(prefs.show_transgender.unwrap_or(true)),
                    Param::Float(location.latitude),
                    Param::Float(location.longitude),
                    Param::Float(max_distance_metres),
                    Param::Date(prefs.dob),
                ],
            )
            .await?;

        let ids = candidates
            .into_iter()
            .map(|row| rows::decode::<CandidateRow>(row).map(|r| r.id))
            .collect::<StoreResult<Vec<_>>>()?;

        // Each candidate resolves through the cached single-profile read;
        // order of completion is irrelevant, result order is not.
        let profiles = try_join_all(ids.iter().map(|&id| self.profile_get(id))).await?;
        Ok(profiles.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dbi::testing::FakeDb;

    const ME: &str = "11111111-1111-4111-8111-111111111111";
    const CANDIDATE: &str = "22222222-2222-4222-8222-222222222222";

    #[test]
    fn missing_interests_default_to_everyone() {
        assert_eq!(
            interest_tags(None),
            vec!["men", "nonbinary", "women"]
        );
        assert_eq!(interest_tags(Some(vec![])).len(), 3);
        assert_eq!(
            interest_tags(Some(vec!["women".into()])),
            vec!["women"]
        );
    }

    #[test]
    fn exclusion_covers_self_recent_and_matched() {
        let me: Uuid = ME.parse().unwrap();
        let recent = vec![Uuid::new_v4()];
        let matched = vec![Uuid::new_v4(), Uuid::new_v4()];

        let exclude = exclusion_set(me, recent.clone(), matched.clone());
        assert!(exclude.contains(&me));
        assert!(recent.iter().all(|id| exclude.contains(id)));
        assert!(matched.iter().all(|id| exclude.contains(id)));
    }

    #[tokio::test]
    async fn check_in_happens_before_candidate_query() {
        let dbi = FakeDb::new();
        dbi.push_one(Some(json!({
            "dob": "1990-01-01",
            "show_transgender": null,
            "gender_interests": null,
        })));
        dbi.push_many(vec![]); // recent interactions
        dbi.push_many(vec![]); // matched contacts
        dbi.push_one(None); // location check-in
        dbi.push_many(vec![json!({ "id": CANDIDATE })]);
        dbi.push_one(Some(json!({
            "contact": CANDIDATE,
            "name": "Ada",
            "dob": "1992-03-04",
            "bio": "hi",
            "gender": "woman",
            "photo_urls": [],
            "relationship_interests": [],
            "neurodiversities": [],
            "interests": [],
            "last_location_name": "Kelowna",
            "pronouns": null,
        })));

        let store = Store::new(dbi);
        let profiles = store
            .explore_profiles(
                ME.parse().unwrap(),
                Location::new(49.88, -119.49),
                "Kelowna",
                25_000.0,
            )
            .await
            .unwrap();

        assert_eq!(profiles.len(), 1);
        assert_eq!(
            store.dbi().calls(),
            vec![
                "read_one",  // requester dob + preferences
                "read_many", // recent interactions
                "read_many", // matches
                "write_one", // location check-in, sequenced first
                "read_many", // candidate query
                "read_one",  // profile resolve
            ]
        );
    }
}
