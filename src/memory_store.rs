//! In-process counter store used as the test double for Redis.
//!
//! Commands are serialised behind one async mutex, giving the same
//! per-command atomicity as a single Redis instance. It is compiled only
//! for tests; the service itself always counts in Redis.

use crate::counter_store::CounterStore;
use crate::error::StoreError;
use crate::hyperloglog::HyperLogLog;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug)]
enum Value {
    Text(String),
    Hll(HyperLogLog),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    /// Lazy expiry: an expired key is dropped the first time it is touched.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn live_or_insert_with(&mut self, key: &str, init: impl FnOnce() -> Value) -> &mut Entry {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(init()))
    }

    fn sorted_set(&mut self, key: &str) -> Result<Option<&mut HashMap<String, f64>>, StoreError> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(StoreError::Corrupt(WRONG_TYPE.to_string())),
        }
    }
}

/// Ascending Redis order: score, then member bytes.
fn ascending(set: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    members
}

/// Normalise a Redis rank range; `None` when it selects nothing.
fn rank_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    keyspace: Mutex<Keyspace>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a key with a raw string, as `SET` would.
    pub async fn set(&self, key: &str, value: &str) {
        let mut keyspace = self.keyspace.lock().await;
        keyspace
            .entries
            .insert(key.to_string(), Entry::new(Value::Text(value.to_string())));
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.keyspace.lock().await.live(key).is_some()
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut keyspace = self.keyspace.lock().await;
        keyspace
            .live(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        match keyspace.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::Corrupt(WRONG_TYPE.to_string())),
        }
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        let entry = keyspace.live_or_insert_with(key, || Value::Text("0".to_string()));

        let Value::Text(text) = &mut entry.value else {
            return Err(StoreError::Corrupt(WRONG_TYPE.to_string()));
        };

        let current: i64 = text.parse().map_err(|_| {
            StoreError::Corrupt("ERR value is not an integer or out of range".to_string())
        })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::Corrupt("ERR increment or decrement would overflow".to_string())
        })?;

        *text = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        if let Some(entry) = keyspace.live(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn pfadd(&self, key: &str, element: &str) -> Result<bool, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        let entry = keyspace.live_or_insert_with(key, || Value::Hll(HyperLogLog::new()));

        match &mut entry.value {
            Value::Hll(hll) => Ok(hll.add(element.as_bytes())),
            _ => Err(StoreError::Corrupt(WRONG_TYPE.to_string())),
        }
    }

    async fn pfcount(&self, key: &str) -> Result<u64, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        match keyspace.live(key) {
            None => Ok(0),
            Some(Entry {
                value: Value::Hll(hll),
                ..
            }) => Ok(hll.count()),
            Some(_) => Err(StoreError::Corrupt(WRONG_TYPE.to_string())),
        }
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        let entry = keyspace.live_or_insert_with(key, || Value::SortedSet(HashMap::new()));

        let Value::SortedSet(set) = &mut entry.value else {
            return Err(StoreError::Corrupt(WRONG_TYPE.to_string()));
        };
        let score = set.entry(member.to_string()).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        let Some(set) = keyspace.sorted_set(key)? else {
            return Ok(Vec::new());
        };

        let mut members = ascending(set);
        members.reverse();

        Ok(match rank_range(members.len(), start, stop) {
            Some((from, to)) => members[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace.sorted_set(key)?.map_or(0, |set| set.len() as u64))
    }

    async fn zremrangebyrank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<u64, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        let Some(set) = keyspace.sorted_set(key)? else {
            return Ok(0);
        };

        let members = ascending(set);
        let Some((from, to)) = rank_range(members.len(), start, stop) else {
            return Ok(0);
        };

        for (member, _) in &members[from..=to] {
            set.remove(member);
        }
        let removed = (to - from + 1) as u64;

        if set.is_empty() {
            keyspace.entries.remove(key);
        }
        Ok(removed)
    }

    async fn del(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        for key in keys {
            keyspace.entries.remove(*key);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_creates_and_counts() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.incr("pv", 1).await.unwrap(), 1);
        assert_eq!(store.incr("pv", 1).await.unwrap(), 2);
        assert_eq!(store.get("pv").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_incr_rejects_garbage() {
        let store = MemoryCounterStore::new();
        store.set("pv", "garbage").await;
        assert!(store.incr("pv", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_key_disappears() {
        let store = MemoryCounterStore::new();
        store.incr("pv", 1).await.unwrap();
        store.expire("pv", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("pv").await.unwrap(), None);
        assert!(!store.exists("pv").await);
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        let store = MemoryCounterStore::new();
        store.zincrby("board", "1", 1.0).await.unwrap();
        assert!(store.get("board").await.is_err());
        assert!(store.pfadd("board", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_zrevrange_orders_by_score() {
        let store = MemoryCounterStore::new();
        store.zincrby("board", "1", 3.0).await.unwrap();
        store.zincrby("board", "2", 5.0).await.unwrap();
        store.zincrby("board", "3", 1.0).await.unwrap();

        let top = store.zrevrange_with_scores("board", 0, 1).await.unwrap();
        assert_eq!(
            top,
            vec![("2".to_string(), 5.0), ("1".to_string(), 3.0)]
        );

        let all = store.zrevrange_with_scores("board", 0, -1).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(store.zrevrange_with_scores("missing", 0, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zremrangebyrank_drops_lowest() {
        let store = MemoryCounterStore::new();
        for i in 1..=5 {
            store.zincrby("board", &i.to_string(), i as f64).await.unwrap();
        }

        assert_eq!(store.zremrangebyrank("board", 0, 1).await.unwrap(), 2);
        assert_eq!(store.zcard("board").await.unwrap(), 3);

        let remaining: Vec<String> = store
            .zrevrange_with_scores("board", 0, -1)
            .await
            .unwrap()
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(remaining, vec!["5", "4", "3"]);
    }

    #[test]
    fn test_rank_range_rules() {
        assert_eq!(rank_range(5, 0, 4), Some((0, 4)));
        assert_eq!(rank_range(5, 0, 10), Some((0, 4)));
        assert_eq!(rank_range(5, 0, -1), Some((0, 4)));
        assert_eq!(rank_range(5, -2, -1), Some((3, 4)));
        assert_eq!(rank_range(5, 3, 1), None);
        assert_eq!(rank_range(0, 0, -1), None);
        assert_eq!(rank_range(5, 7, 9), None);
    }
}
