use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use std::future::Future;
use std::time::Duration;

const INCREMENT_WITH_TTL: &str = include_str!("increment_with_ttl.lua");

/// Redis-backed side store. Every call is bounded by `op_timeout`; an elapsed
/// deadline surfaces as [`StoreError::Timeout`] instead of stalling the request.
pub struct RedisRevocationStore {
    conn: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
    increment_script: Script,
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, op_timeout: Duration) -> Self {
        RedisRevocationStore {
            conn,
            prefix: prefix.into(),
            op_timeout,
            increment_script: Script::new(INCREMENT_WITH_TTL),
        }
    }

    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = self.bounded(conn.set_ex(&key, value, ttl_secs)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        self.bounded(conn.get(&key)).await
    }

    async fn atomic_delete(&self, key: &str) -> Result<bool, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let removed: u64 = self.bounded(conn.del(&key)).await?;
        Ok(removed > 0)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        self.bounded(conn.get_del(&key)).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: u64 = self.bounded(conn.sadd(&key, member)).await?;
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: u64 = self.bounded(conn.srem(&key, member)).await?;
        Ok(())
    }

    async fn members_of(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        self.bounded(conn.smembers(&key)).await
    }

    async fn increment_with_ttl_on_first(
        &self,
        key: &str,
        ttl_secs: u64,
    ) -> Result<u64, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let count: u64 = self
            .bounded(
                self.increment_script
                    .key(&key)
                    .arg(ttl_secs)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(count)
    }
}
