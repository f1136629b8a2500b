use crate::counter_store::CounterStore;
use crate::error::StoreError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

/// Counter store backed by Redis. The connection manager reconnects on its
/// own; each command clones the cheap handle.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis at {}", url);
        Ok(Self { connection })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self.conn().get(key).await?;
        Ok(value)
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let value: i64 = self.conn().incr(key, delta).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let _: bool = self.conn().expire(key, seconds).await?;
        Ok(())
    }

    async fn pfadd(&self, key: &str, element: &str) -> Result<bool, StoreError> {
        let changed: bool = self.conn().pfadd(key, element).await?;
        Ok(changed)
    }

    async fn pfcount(&self, key: &str) -> Result<u64, StoreError> {
        let count: u64 = self.conn().pfcount(key).await?;
        Ok(count)
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError> {
        let score: f64 = self.conn().zincr(key, member, delta).await?;
        Ok(score)
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let members: Vec<(String, f64)> =
            self.conn().zrevrange_withscores(key, start, stop).await?;
        Ok(members)
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let size: u64 = self.conn().zcard(key).await?;
        Ok(size)
    }

    async fn zremrangebyrank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<u64, StoreError> {
        let removed: u64 = self.conn().zremrangebyrank(key, start, stop).await?;
        Ok(removed)
    }

    async fn del(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let _: u64 = self.conn().del(keys).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
