use async_trait::async_trait;

use kindred_shared::cache::CacheStore;
use kindred_shared::errors::{StoreError, StoreResult};

use crate::dbi::{CacheSpec, DatabaseInterface, Param, Row};

/// Cache-coherent wrapper around any other [`DatabaseInterface`].
///
/// Reads are served from the cache when a validated entry exists; writes go
/// to the wrapped implementation first and then overwrite the cache entry;
/// deletes evict the entry *before* delegating, so a crash mid-delete can
/// only leave the cache cold, never stale.
pub struct CachedInterface<C, I> {
    cache: C,
    inner: I,
}

impl<C: CacheStore, I: DatabaseInterface> CachedInterface<C, I> {
    pub fn new(cache: C, inner: I) -> Self {
        Self { cache, inner }
    }

    async fn cached_value(&self, spec: &CacheSpec) -> StoreResult<Option<Row>> {
        let Some(raw) = self.cache.get(&spec.key).await? else {
            tracing::debug!(key = %spec.key, "cache miss");
            return Ok(None);
        };

        let value: Row = serde_json::from_str(&raw).map_err(|err| StoreError::Schema {
            shape: spec.shape.name(),
            reason: format!("cached payload is not JSON: {err}"),
        })?;
        spec.shape.validate(&value)?;

        tracing::debug!(key = %spec.key, "cache hit");
        Ok(Some(value))
    }

    async fn store_value(&self, value: &Row, spec: &CacheSpec) -> StoreResult<()> {
        spec.shape.validate(value)?;
        let raw = serde_json::to_string(value)
            .map_err(|err| StoreError::Internal(anyhow::anyhow!("cache encode failed: {err}")))?;
        self.cache.put(&spec.key, &raw, spec.expiration).await
    }
}

#[async_trait]
impl<C: CacheStore, I: DatabaseInterface> DatabaseInterface for CachedInterface<C, I> {
    async fn read_one(
        &self,
        query: &str,
        params: &[Param],
        cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>> {
        let Some(spec) = cache else {
            return self.inner.read_one(query, params, None).await;
        };

        if let Some(hit) = self.cached_value(spec).await? {
            return Ok(Some(hit));
        }

        let value = self.inner.read_one(query, params, None).await?;
        if let Some(row) = &value {
            self.store_value(row, spec).await?;
        }
        Ok(value)
    }

    async fn read_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        self.inner.read_many(query, params).await
    }

    async fn write_one(
        &self,
        query: &str,
        params: &[Param],
        cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>> {
        // The source of truth is updated unconditionally; only then does the
        // cache entry get replaced with the fresh result.
        let value = self.inner.write_one(query, params, None).await?;
        let Some(spec) = cache else {
            return Ok(value);
        };

        if let Some(row) = &value {
            self.store_value(row, spec).await?;
        }
        Ok(value)
    }

    async fn write_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        self.inner.write_many(query, params).await
    }

    async fn delete_one(
        &self,
        query: &str,
        params: &[Param],
        cache: Option<&CacheSpec>,
    ) -> StoreResult<Option<Row>> {
        if let Some(spec) = cache {
            self.cache.delete(&spec.key).await?;
            tracing::debug!(key = %spec.key, "cache evicted");
        }
        self.inner.delete_one(query, params, None).await
    }

    async fn delete_many(&self, query: &str, params: &[Param]) -> StoreResult<Vec<Row>> {
        self.inner.delete_many(query, params).await
    }

    fn close(&self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use kindred_shared::cache::{Expiration, MemoryCache};
    use kindred_shared::errors::DbErrorKind;

    use super::*;
    use crate::dbi::testing::FakeDb;
    use crate::dbi::CacheShape;

    fn contact_row(phone: &str) -> Row {
        json!({
            "id": "7f8ad1f4-3b3c-4be2-9621-0d6b86b0f8f1",
            "phone": phone,
            "dob": "1990-01-01",
            "is_redlisted": false,
            "tos_agreed": true,
        })
    }

    fn spec() -> CacheSpec {
        CacheSpec::ttl("contact.test".into(), CacheShape::Contact, 60)
    }

    #[tokio::test]
    async fn read_through_populates_cache() {
        let inner = FakeDb::new();
        inner.push_one(Some(contact_row("+15550001111")));
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        let first = dbi.read_one("q", &[], Some(&spec())).await.unwrap();
        assert_eq!(first, Some(contact_row("+15550001111")));

        // Second read is served from the cache; the fake has no more rows
        // queued, so delegation would panic.
        let second = dbi.read_one("q", &[], Some(&spec())).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(dbi.inner.calls(), vec!["read_one"]);
    }

    #[tokio::test]
    async fn read_without_spec_passes_through() {
        let inner = FakeDb::new();
        inner.push_one(Some(contact_row("+15550001111")));
        inner.push_one(Some(contact_row("+15550001111")));
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        dbi.read_one("q", &[], None).await.unwrap();
        dbi.read_one("q", &[], None).await.unwrap();
        assert_eq!(dbi.inner.calls(), vec!["read_one", "read_one"]);
    }

    #[tokio::test]
    async fn null_result_is_not_cached() {
        let inner = FakeDb::new();
        inner.push_one(None);
        inner.push_one(Some(contact_row("+15550001111")));
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        assert_eq!(dbi.read_one("q", &[], Some(&spec())).await.unwrap(), None);
        // Still a miss: the next read delegates again.
        let row = dbi.read_one("q", &[], Some(&spec())).await.unwrap();
        assert!(row.is_some());
        assert_eq!(dbi.inner.calls(), vec!["read_one", "read_one"]);
    }

    #[tokio::test]
    async fn write_overwrites_cached_value() {
        let inner = FakeDb::new();
        inner.push_one(Some(contact_row("+15550002222")));
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        // Warm the cache with a pre-write value.
        dbi.store_value(&contact_row("+15550001111"), &spec())
            .await
            .unwrap();

        dbi.write_one("q", &[], Some(&spec())).await.unwrap();
        let read = dbi.read_one("q", &[], Some(&spec())).await.unwrap();
        assert_eq!(read, Some(contact_row("+15550002222")));
        assert_eq!(dbi.inner.calls(), vec!["write_one"]);
    }

    #[tokio::test]
    async fn rowless_write_leaves_cache_alone() {
        let inner = FakeDb::new();
        inner.push_one(None);
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        dbi.store_value(&contact_row("+15550001111"), &spec())
            .await
            .unwrap();
        dbi.write_one("q", &[], Some(&spec())).await.unwrap();

        let read = dbi.read_one("q", &[], Some(&spec())).await.unwrap();
        assert_eq!(read, Some(contact_row("+15550001111")));
    }

    #[tokio::test]
    async fn delete_evicts_before_delegating() {
        let inner = FakeDb::new();
        inner.push_one_err(StoreError::Database {
            kind: DbErrorKind::Other,
            message: "connection reset".into(),
        });
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        dbi.store_value(&contact_row("+15550001111"), &spec())
            .await
            .unwrap();

        // Even though the delete itself fails, the entry is already gone:
        // cold is safe, stale is not.
        let result = dbi.delete_one("q", &[], Some(&spec())).await;
        assert!(result.is_err());
        assert_eq!(dbi.cache.get("contact.test").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_cached_payload_is_fatal() {
        let inner = FakeDb::new();
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        dbi.cache
            .put(
                "contact.test",
                r#"{"id": "not-a-uuid"}"#,
                Expiration::ttl_secs(60),
            )
            .await
            .unwrap();

        let err = dbi.read_one("q", &[], Some(&spec())).await.unwrap_err();
        assert!(matches!(err, StoreError::Schema { shape: "contact", .. }));
        // It must not fall through to the inner interface.
        assert!(dbi.inner.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_write_result_is_rejected() {
        let inner = FakeDb::new();
        inner.push_one(Some(json!({ "id": 42 })));
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        let err = dbi.write_one("q", &[], Some(&spec())).await.unwrap_err();
        assert!(matches!(err, StoreError::Schema { .. }));
        // The write itself reached the source of truth before validation.
        assert_eq!(dbi.inner.calls(), vec!["write_one"]);
        // Nothing malformed was stored.
        assert_eq!(dbi.cache.get("contact.test").await.unwrap(), None);
    }

    #[tokio::test]
    async fn many_operations_never_touch_the_cache() {
        let inner = FakeDb::new();
        inner.push_many(vec![contact_row("+15550001111")]);
        inner.push_many(vec![]);
        inner.push_many(vec![]);
        let dbi = CachedInterface::new(MemoryCache::new(), inner);

        dbi.read_many("q", &[]).await.unwrap();
        dbi.write_many("q", &[]).await.unwrap();
        dbi.delete_many("q", &[]).await.unwrap();
        assert_eq!(
            dbi.inner.calls(),
            vec!["read_many", "write_many", "delete_many"]
        );
    }
}
