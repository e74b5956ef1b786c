//! The domain repository. Owns all entity construction and mutation logic
//! plus the cache-key policy; raw rows never leave this layer.

mod contacts;
mod discovery;
mod extras;
mod interactions;
mod messages;
mod notifications;
mod preferences;
mod profiles;

use kindred_shared::cache::CacheStore;
use kindred_shared::errors::StoreResult;

use crate::dbi::{CachedInterface, DatabaseInterface, PgInterface};

pub struct Store<I> {
    dbi: I,
}

impl Store<PgInterface> {
    /// Open a disposable direct interface for one unit of work.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Ok(Self::new(PgInterface::connect(database_url).await?))
    }
}

impl<C, I> Store<CachedInterface<C, I>>
where
    C: CacheStore,
    I: DatabaseInterface,
{
    /// Wrap an existing interface with the cache-coherent layer.
    pub fn cached(cache: C, inner: I) -> Self {
        Self::new(CachedInterface::new(cache, inner))
    }
}

impl<C: CacheStore> Store<CachedInterface<C, PgInterface>> {
    pub async fn connect_cached(database_url: &str, cache: C) -> StoreResult<Self> {
        let inner = PgInterface::connect(database_url).await?;
        Ok(Self::cached(cache, inner))
    }
}

impl<I: DatabaseInterface> Store<I> {
    pub fn new(dbi: I) -> Self {
        Self { dbi }
    }

    pub(crate) fn dbi(&self) -> &I {
        &self.dbi
    }

    /// Release the unit of work's resources; safe on every exit path.
    pub fn close(&self) {
        self.dbi.close();
    }
}

/// Cache keys are namespaced by entity kind and identifier. Symmetric
/// relations sort the pair first so both orderings share one entry.
pub(crate) mod cache_key {
    use uuid::Uuid;

    pub fn contact(id: Uuid) -> String {
        format!("contact.{id}")
    }

    pub fn profile(id: Uuid) -> String {
        format!("profile.{id}")
    }

    pub fn preferences(id: Uuid) -> String {
        format!("preferences.{id}")
    }

    pub fn can_message(a: Uuid, b: Uuid) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("can-message.{lo}.{hi}")
    }
}

pub(crate) mod ttl {
    pub const CONTACT_SECS: u64 = 500;
    pub const PROFILE_SECS: u64 = 3600;
    pub const PREFERENCES_SECS: u64 = 300;
    /// Short on purpose: `can_message` is not invalidated on
    /// interaction-create, so fresh matches become visible within this
    /// window.
    pub const CAN_MESSAGE_SECS: u64 = 300;
}

#[cfg(test)]
mod tests {
    use super::cache_key;
    use uuid::Uuid;

    #[test]
    fn can_message_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(cache_key::can_message(a, b), cache_key::can_message(b, a));
        assert_ne!(cache_key::can_message(a, b), cache_key::can_message(a, a));
    }

    #[test]
    fn keys_are_namespaced_by_kind() {
        let id = Uuid::new_v4();
        assert_eq!(cache_key::contact(id), format!("contact.{id}"));
        assert_eq!(cache_key::profile(id), format!("profile.{id}"));
        assert_eq!(cache_key::preferences(id), format!("preferences.{id}"));
    }
}
