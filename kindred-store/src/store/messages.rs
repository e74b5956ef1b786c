use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::{DatabaseInterface, Param};
use crate::models::{Message, MessageFrom};
use crate::rows::{self, CountRow, MessageCreatedRow, MessageRow};
use crate::store::Store;

fn message_from_row(row: MessageRow, requester: Uuid) -> Message {
    let from = if row.from_contact == requester {
        MessageFrom::Local
    } else {
        MessageFrom::Remote
    };
    Message {
        id: row.id,
        from,
        content: row.content,
        sent_at: row.sent_at,
    }
}

impl<I: DatabaseInterface> Store<I> {
    /// Eligibility (mutual interaction) is the caller's check; see
    /// [`Store::can_message`].
    pub async fn message_create(
        &self,
        from: Uuid,
        to: Uuid,
        content: &str,
    ) -> StoreResult<Message> {
        let row = self
            .dbi()
            .write_one(
                r#"
                INSERT INTO messages (from_contact, to_contact, content)
                VALUES ($1, $2, $3)
                RETURNING id, sent_at
                "#,
                &[
                    Param::Uuid(from),
                    Param::Uuid(to),
                    Param::Text(content.to_string()),
                ],
                None,
            )
            .await?
            .ok_or_else(|| {
                kindred_shared::errors::StoreError::Internal(anyhow::anyhow!(
                    "message insert returned no row"
                ))
            })?;

        let row: MessageCreatedRow = rows::decode(row)?;
        Ok(Message {
            id: row.id,
            from: MessageFrom::Local,
            content: content.to_string(),
            sent_at: row.sent_at,
        })
    }

    /// Latest `limit` messages between the pair, newest first.
    pub async fn messages_get(
        &self,
        local: Uuid,
        remote: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let rows = self
            .dbi()
            .read_many(
                r#"
                SELECT id, from_contact, to_contact, content, sent_at
                FROM messages
                WHERE (from_contact = $1 AND to_contact = $2)
                    OR (from_contact = $2 AND to_contact = $1)
                ORDER BY id DESC
                LIMIT $3
                "#,
                &[Param::Uuid(local), Param::Uuid(remote), Param::Int(limit)],
            )
            .await?;

        rows.into_iter()
            .map(|row| rows::decode::<MessageRow>(row).map(|r| message_from_row(r, local)))
            .collect()
    }

    /// Page older history: messages with an id below `max_id`.
    pub async fn messages_get_older(
        &self,
        local: Uuid,
        remote: Uuid,
        limit: i64,
        max_id: i64,
    ) -> StoreResult<Vec<Message>> {
        let rows = self
            .dbi()
            .read_many(
                r#"
                SELECT id, from_contact, to_contact, content, sent_at
                FROM messages
                WHERE ((from_contact = $1 AND to_contact = $2)
                    OR (from_contact = $2 AND to_contact = $1))
                    AND id < $4
                ORDER BY id DESC
                LIMIT $3
                "#,
                &[
                    Param::Uuid(local),
                    Param::Uuid(remote),
                    Param::Int(limit),
                    Param::Int(max_id),
                ],
            )
            .await?;

        rows.into_iter()
            .map(|row| rows::decode::<MessageRow>(row).map(|r| message_from_row(r, local)))
            .collect()
    }

    /// Mark exactly the given message ids as read.
    pub async fn messages_mark_read(&self, message_ids: &[i64]) -> StoreResult<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        self.dbi()
            .write_many(
                r#"
                UPDATE messages
                SET read_at = now()
                WHERE id = ANY($1)
                "#,
                &[Param::IntArray(message_ids.to_vec())],
            )
            .await?;
        Ok(())
    }

    pub async fn messages_delete_between(&self, a: Uuid, b: Uuid) -> StoreResult<()> {
        self.dbi()
            .delete_many(
                r#"
                DELETE FROM messages
                WHERE (from_contact = $1 AND to_contact = $2)
                    OR (from_contact = $2 AND to_contact = $1)
                "#,
                &[Param::Uuid(a), Param::Uuid(b)],
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn last_message_between(
        &self,
        requester: Uuid,
        other: Uuid,
    ) -> StoreResult<Option<Message>> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT id, from_contact, to_contact, content, sent_at
                FROM messages
                WHERE (from_contact = $1 AND to_contact = $2)
                    OR (from_contact = $2 AND to_contact = $1)
                ORDER BY id DESC
                LIMIT 1
                "#,
                &[Param::Uuid(requester), Param::Uuid(other)],
                None,
            )
            .await?;

        row.map(rows::decode::<MessageRow>)
            .transpose()
            .map(|row| row.map(|r| message_from_row(r, requester)))
    }

    /// Messages addressed to `requester` that have no read timestamp.
    pub(crate) async fn unread_count(&self, requester: Uuid, other: Uuid) -> StoreResult<i64> {
        let row = self
            .dbi()
            .read_one(
                r#"
                SELECT COUNT(*) AS n
                FROM messages
                WHERE from_contact = $2 AND to_contact = $1
                    AND read_at IS NULL
                "#,
                &[Param::Uuid(requester), Param::Uuid(other)],
                None,
            )
            .await?;

        Ok(row
            .map(rows::decode::<CountRow>)
            .transpose()?
            .map(|row| row.n)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dbi::testing::FakeDb;

    const ME: &str = "11111111-1111-4111-8111-111111111111";
    const THEM: &str = "22222222-2222-4222-8222-222222222222";

    fn message_row(id: i64, from: &str, to: &str) -> serde_json::Value {
        json!({
            "id": id,
            "from_contact": from,
            "to_contact": to,
            "content": "hey",
            "sent_at": "2024-06-01T12:00:00Z",
        })
    }

    #[tokio::test]
    async fn direction_is_relative_to_requester() {
        let dbi = FakeDb::new();
        dbi.push_many(vec![message_row(2, THEM, ME), message_row(1, ME, THEM)]);

        let store = Store::new(dbi);
        let messages = store
            .messages_get(ME.parse().unwrap(), THEM.parse().unwrap(), 10)
            .await
            .unwrap();

        assert_eq!(messages[0].from, MessageFrom::Remote);
        assert_eq!(messages[1].from, MessageFrom::Local);
    }

    #[tokio::test]
    async fn mark_read_with_no_ids_is_a_no_op() {
        let dbi = FakeDb::new();
        let store = Store::new(dbi);
        store.messages_mark_read(&[]).await.unwrap();
        assert!(store.dbi().calls().is_empty());
    }

    #[tokio::test]
    async fn unread_count_defaults_to_zero() {
        let dbi = FakeDb::new();
        dbi.push_one(None);

        let store = Store::new(dbi);
        let n = store
            .unread_count(ME.parse().unwrap(), THEM.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
