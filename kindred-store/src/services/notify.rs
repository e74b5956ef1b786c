use async_trait::async_trait;
use uuid::Uuid;

use kindred_shared::errors::StoreResult;

use crate::dbi::DatabaseInterface;
use crate::store::Store;

/// Semantic kinds of push notification. A kind stays "pending" on the
/// contact's config until the client acknowledges it, suppressing repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Match,
    Message,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Message => "message",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Note {
    pub title: String,
    pub body: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    TokenInvalid,
    Unsupported,
}

/// Delivery itself is an external collaborator; this crate only decides
/// whether and what to send.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send(&self, token: &str, note: &Note) -> StoreResult<SendOutcome>;
}

/// Gates notification sends on config presence, preferences, and the
/// pending-kind dedup set.
pub struct Notifier<'a, I, P> {
    store: &'a Store<I>,
    provider: P,
}

impl<'a, I: DatabaseInterface, P: NotificationProvider> Notifier<'a, I, P> {
    pub fn new(store: &'a Store<I>, provider: P) -> Self {
        Self { store, provider }
    }

    /// Returns whether a notification was delivered.
    pub async fn notify(
        &self,
        contact: Uuid,
        kind: NotificationKind,
        note: &Note,
    ) -> StoreResult<bool> {
        let Some(config) = self.store.notification_config_get(contact).await? else {
            return Ok(false);
        };

        if config.pending_kinds.iter().any(|k| k == kind.as_str()) {
            tracing::debug!(contact = %contact, kind = kind.as_str(), "notification suppressed, already pending");
            return Ok(false);
        }

        let preferences = self.store.preferences_get(contact).await?;
        if !preferences.allow_notifications {
            return Ok(false);
        }

        match self.provider.send(&config.token, note).await? {
            SendOutcome::Delivered => {
                self.store
                    .notification_config_mark_pending(contact, kind.as_str())
                    .await?;
                Ok(true)
            }
            SendOutcome::TokenInvalid => {
                tracing::warn!(contact = %contact, "delivery token invalid, dropping config");
                self.store.notification_config_delete(contact).await?;
                Ok(false)
            }
            SendOutcome::Unsupported => {
                tracing::warn!(contact = %contact, "notification unsupported by provider");
                Ok(false)
            }
        }
    }
}
