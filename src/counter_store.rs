use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// The fast counter store: atomic counters, expiring keys, HyperLogLog and
/// sorted sets. Every method is a single atomic command on the backing store;
/// callers never read-modify-write through this interface.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Increment an integer counter, creating it at zero first.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Returns true when the cardinality estimate changed.
    async fn pfadd(&self, key: &str, element: &str) -> Result<bool, StoreError>;

    async fn pfcount(&self, key: &str) -> Result<u64, StoreError>;

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError>;

    /// Members by descending score, `start..=stop` ranks, Redis index rules.
    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    /// Remove ranks `start..=stop` in ascending score order; returns the count removed.
    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize)
        -> Result<u64, StoreError>;

    /// Delete all `keys` in one command, so either all or none are removed.
    async fn del(&self, keys: &[&str]) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;
}
