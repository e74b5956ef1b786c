use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::cache::{CacheStore, Expiration};
use crate::errors::StoreResult;

/// Redis-backed cache store. Connections are multiplexed through a
/// connection manager, so the client is cheap to clone per unit of work.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisClient {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, expiration: Expiration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        match expiration {
            Expiration::Ttl(ttl) => {
                // Redis rejects a zero expiry; clamp up to one second.
                let secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, secs).await?;
            }
            Expiration::At(at) => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EXAT")
                    .arg(at.timestamp())
                    .query_async::<_, ()>(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
