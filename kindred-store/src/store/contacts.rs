use chrono::NaiveDate;
use uuid::Uuid;

use kindred_shared::errors::{StoreError, StoreResult};

use crate::dbi::{CacheShape, CacheSpec, DatabaseInterface, Param};
use crate::models::Contact;
use crate::rows::{self, ContactRow};
use crate::store::{cache_key, ttl, Store};

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Self {
            id: row.id,
            phone: row.phone,
            dob: row.dob,
            is_redlisted: row.is_redlisted,
            tos_agreed: row.tos_agreed,
        }
    }
}

impl<I: DatabaseInterface> Store<I> {
    /// A duplicate phone number surfaces as a typed conflict
    /// ([`StoreError::is_duplicate`]), not an internal error.
    pub async fn contact_create(
        &self,
        phone: &str,
        dob: NaiveDate,
        is_redlisted: bool,
    ) -> StoreResult<Contact> {
        let row = self
            .dbi()
            .write_one(
                r#"
                INSERT INTO contacts (phone, dob, is_redlisted)
                VALUES ($1, $2, $3)
                RETURNING id, phone, dob, is_redlisted, tos_agreed
                "#,
                &[
                    Param::Text(phone.to_string()),
                    Param::Date(dob),
                    Param::Bool(is_redlisted),
                ],
                None,
            )
            .await?
            .ok_or_else(|| {
                StoreError::Internal(anyhow::anyhow!("contact insert returned no row"))
            })?;

        Ok(rows::decode::<ContactRow>(row)?.into())
    }

    pub async fn contact_get(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        let spec = CacheSpec::ttl(cache_key::contact(id), CacheShape::Contact, ttl::CONTACT_SECS);
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT id, phone, dob, is_redlisted, tos_agreed
                FROM contacts
                WHERE id = $1
                "#,
                &[Param::Uuid(id)],
                Some(&spec),
            )
            .await?;

        row.map(rows::decode::<ContactRow>)
            .transpose()
            .map(|row| row.map(Contact::from))
    }

    pub async fn contact_get_by_phone(&self, phone: &str) -> StoreResult<Option<Contact>> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT id, phone, dob, is_redlisted, tos_agreed
                FROM contacts
                WHERE phone = $1
                "#,
                &[Param::Text(phone.to_string())],
                None,
            )
            .await?;

        row.map(rows::decode::<ContactRow>)
            .transpose()
            .map(|row| row.map(Contact::from))
    }

    pub async fn contact_set_tos_agreed(&self, id: Uuid, tos_agreed: bool) -> StoreResult<()> {
        let spec = CacheSpec::ttl(cache_key::contact(id), CacheShape::Contact, ttl::CONTACT_SECS);
        self.dbi()
            .write_one(
                r#"
                UPDATE contacts
                SET tos_agreed = $2
                WHERE id = $1
                RETURNING id, phone, dob, is_redlisted, tos_agreed
                "#,
                &[Param::Uuid(id), Param::Bool(tos_agreed)],
                Some(&spec),
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

    #[tokio::test]
    async fn contact_get_maps_row() {
        let dbi = FakeDb::new();
        dbi.push_one(Some(json!({
            "id": "7f8ad1f4-3b3c-4be2-9621-0d6b86b0f8f1",
            "phone": "+15551234567",
            "dob": "1990-01-01",
            "is_redlisted": false,
            "tos_agreed": true,
        })));

        let store = Store::new(dbi);
        let contact = store
            .contact_get("7f8ad1f4-3b3c-4be2-9621-0d6b86b0f8f1".parse().unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(contact.phone, "+15551234567");
        assert!(!contact.is_redlisted);
    }

    #[tokio::test]
    async fn missing_contact_is_none() {
        let dbi = FakeDb::new();
        dbi.push_one(None);

        let store = Store::new(dbi);
        let contact = store.contact_get(Uuid::new_v4()).await.unwrap();
        assert!(contact.is_none());
    }
}
