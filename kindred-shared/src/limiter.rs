use chrono::Utc;

use crate::cache::{CacheStore, Expiration};
use crate::errors::{StoreError, StoreResult};

const INITIAL_LOCKOUT_SECS: u64 = 1;
const MAX_LOCKOUT_SECS: u64 = 3600;

/// Exponential lockout for a flaky external dependency, with state held in
/// the shared cache store rather than process statics. Each failure locks
/// the dependency for the current backoff step and doubles the step; a
/// success (or an hour of quiet) resets it.
pub struct DependencyLimiter<C> {
    cache: C,
    dependency: String,
}

impl<C: CacheStore> DependencyLimiter<C> {
    pub fn new(cache: C, dependency: impl Into<String>) -> Self {
        Self {
            cache,
            dependency: dependency.into(),
        }
    }

    /// Fails with [`StoreError::Locked`] while the dependency is locked out.
    pub async fn check(&self) -> StoreResult<()> {
        let Some(raw) = self.cache.get(&self.lock_key()).await? else {
            return Ok(());
        };

        let locked_until_ms: i64 = raw.parse().unwrap_or(0);
        let remaining_ms = locked_until_ms - Utc::now().timestamp_millis();
        if remaining_ms > 0 {
            return Err(StoreError::Locked {
                dependency: self.dependency.clone(),
                retry_after_secs: (remaining_ms as u64).div_ceil(1000),
            });
        }

        Ok(())
    }

    pub async fn record_failure(&self) -> StoreResult<()> {
        let step = match self.cache.get(&self.step_key()).await? {
            Some(raw) => raw.parse().unwrap_or(INITIAL_LOCKOUT_SECS),
            None => INITIAL_LOCKOUT_SECS,
        };

        let locked_until_ms = Utc::now().timestamp_millis() + (step as i64) * 1000;
        self.cache
            .put(
                &self.lock_key(),
                &locked_until_ms.to_string(),
                Expiration::ttl_secs(step),
            )
            .await?;

        let next = (step * 2).min(MAX_LOCKOUT_SECS);
        self.cache
            .put(
                &self.step_key(),
                &next.to_string(),
                Expiration::ttl_secs(MAX_LOCKOUT_SECS),
            )
            .await?;

        tracing::warn!(
            dependency = %self.dependency,
            lockout_secs = step,
            "dependency failure, locking out"
        );
        Ok(())
    }

    pub async fn record_success(&self) -> StoreResult<()> {
        self.cache.delete(&self.lock_key()).await?;
        self.cache.delete(&self.step_key()).await?;
        Ok(())
    }

    fn lock_key(&self) -> String {
        format!("cooldown.{}", self.dependency)
    }

    fn step_key(&self) -> String {
        format!("cooldown.{}.step", self.dependency)
    }
}
