use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::{DatabaseInterface, Param};
use crate::models::{ClientVersion, PhoneGreenlistEntry};
use crate::rows::{self, ClientVersionRow, GreenlistRow};
use crate::store::Store;

impl<I: DatabaseInterface> Store<I> {
    pub async fn report_create(
        &self,
        contact: Uuid,
        reason: &str,
        reporter: Uuid,
    ) -> StoreResult<()> {
        self.dbi()
            .write_one(
                r#"
                INSERT INTO reports (contact, reason, reporter)
                VALUES ($1, $2, $3)
                "#,
                &[
                    Param::Uuid(contact),
                    Param::Text(reason.to_string()),
                    Param::Uuid(reporter),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    /// Signup interest from outside the service area, keyed by phone.
    pub async fn waiting_list_add(
        &self,
        phone: &str,
        iso_country: &str,
        administrative_area: &str,
        locality: &str,
    ) -> StoreResult<()> {
        self.dbi()
            .write_one(
                r#"
                INSERT INTO waiting_list (phone, iso_country, administrative_area, locality)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (phone) DO UPDATE
                SET iso_country = $2,
                    administrative_area = $3,
                    locality = $4
                "#,
                &[
                    Param::Text(phone.to_string()),
                    Param::Text(iso_country.to_string()),
                    Param::Text(administrative_area.to_string()),
                    Param::Text(locality.to_string()),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    /// Phones allowed in regardless of the service area.
    pub async fn phone_greenlist(&self) -> StoreResult<Vec<PhoneGreenlistEntry>> {
        let rows = self
            .dbi()
            .read_many(
                r#"
                SELECT phone, nickname
                FROM phone_greenlist
                "#,
                &[],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                rows::decode::<GreenlistRow>(row).map(|r| PhoneGreenlistEntry {
                    phone: r.phone,
                    nickname: r.nickname,
                })
            })
            .collect()
    }

    pub async fn client_version_latest(&self) -> StoreResult<Option<ClientVersion>> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT semver, is_update_required, created_at
                FROM client_versions
                ORDER BY created_at DESC
                LIMIT 1
                "#,
                &[],
                None,
            )
            .await?;

        row.map(rows::decode::<ClientVersionRow>)
            .transpose()
            .map(|row| {
                row.map(|r| ClientVersion {
                    semver: r.semver,
                    is_update_required: r.is_update_required,
                    created_at: r.created_at,
                })
            })
    }
}
