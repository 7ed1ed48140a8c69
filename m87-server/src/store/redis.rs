use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use super::{Store, StoreError};

/// Shared store backend for multi-process deployments.
///
/// Built on `redis::aio::ConnectionManager`, which reconnects transparently
/// on connection loss — callers still see a `StoreError::Backend` on a
/// failed round trip and fail open per spec §5.
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| StoreError::Backend(e.to_string()))?;
        value.ok_or(StoreError::NotFound)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(d) => conn
                .set_ex::<_, _, ()>(key, value, d.as_secs().max(1))
                .await
                .map_err(|e| StoreError::Backend(e.to_string())),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| StoreError::Backend(e.to_string())),
        }
    }

    async fn del(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await.map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn sadd(&self, set: &str, members: &[&str]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set, members)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn spopn(&self, set: &str, n: usize) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.spop_multiple(set, n)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn llen(&self, list_key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.llen(list_key).await.map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn lpush(&self, list_key: &str, items: &[&str]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(list_key, items)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
