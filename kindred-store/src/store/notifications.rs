use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::{DatabaseInterface, Param};
use crate::models::NotificationConfig;
use crate::rows::{self, NotificationConfigRow};
use crate::store::Store;

impl<I: DatabaseInterface> Store<I> {
    pub async fn notification_config_get(
        &self,
        contact: Uuid,
    ) -> StoreResult<Option<NotificationConfig>> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT token, token_last_updated, pending_kinds
                FROM notification_config
                WHERE contact = $1
                "#,
                &[Param::Uuid(contact)],
                None,
            )
            .await?;

        row.map(rows::decode::<NotificationConfigRow>)
            .transpose()
            .map(|row| {
                row.map(|r| NotificationConfig {
                    contact,
                    token: r.token,
                    token_last_updated: r.token_last_updated,
                    pending_kinds: r.pending_kinds,
                })
            })
    }

    /// Upsert the delivery config. `token_last_updated` only advances when
    /// the token actually changed; the pending set is replaced with whatever
    /// the client reports, which is how delivered kinds get acknowledged.
    pub async fn notification_config_update(
        &self,
        contact: Uuid,
        token: &str,
        pending_kinds: &[String],
    ) -> StoreResult<()> {
        self.dbi()
            .write_one(
                r#"
                INSERT INTO notification_config (
                    contact, token, token_last_updated, pending_kinds
                ) VALUES ($1, $2, now(), $3)
                ON CONFLICT (contact) DO UPDATE
                SET token = $2,
                    token_last_updated = CASE notification_config.token
                        WHEN $2 THEN notification_config.token_last_updated
                        ELSE now()
                    END,
                    pending_kinds = $3
                "#,
                &[
                    Param::Uuid(contact),
                    Param::Text(token.to_string()),
                    Param::TextArray(pending_kinds.to_vec()),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    /// Record a delivered notification kind so repeats are suppressed until
    /// the client acknowledges.
    pub async fn notification_config_mark_pending(
        &self,
        contact: Uuid,
        kind: &str,
    ) -> StoreResult<()> {
        self.dbi()
            .write_one(
                r#"
                UPDATE notification_config
                SET pending_kinds = array_append(pending_kinds, $2)
                WHERE contact = $1
                    AND NOT ($2 = ANY(pending_kinds))
                "#,
                &[Param::Uuid(contact), Param::Text(kind.to_string())],
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn notification_config_delete(&self, contact: Uuid) -> StoreResult<()> {
        self.dbi()
            .delete_one(
                r#"
                DELETE FROM notification_config
                WHERE contact = $1
                "#,
                &[Param::Uuid(contact)],
                None,
            )
            .await?;
        Ok(())
    }
}
