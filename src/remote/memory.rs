//! In-memory remote store.
//!
//! Backs the cache node and stands in for a networked store in tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::cache::{CacheStats, StatsRecorder};
use crate::error::StoreError;
use crate::remote::{RemoteStore, SetCondition};
use crate::tasks::Sweep;

#[derive(Debug, Clone)]
struct StoredValue {
    payload: Bytes,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

// == Memory Remote ==
/// Unbounded TTL-aware map implementing [`RemoteStore`].
#[derive(Debug, Default)]
pub struct MemoryRemote {
    entries: RwLock<HashMap<String, StoredValue>>,
    stats: StatsRecorder,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_payload(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|value| value.is_live(now))
            .map(|value| value.payload.clone())
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry whose TTL has elapsed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, value| value.is_live(now));
        let removed = before - entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let payload = self.live_payload(key);
        match payload {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        Ok(payload)
    }

    async fn set(
        &self,
        key: &str,
        payload: Bytes,
        ttl: Duration,
        condition: SetCondition,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let exists = entries.get(key).is_some_and(|value| value.is_live(now));
        if !condition.allows(exists) {
            return Ok(false);
        }

        let expires_at = if ttl.is_zero() { None } else { now.checked_add(ttl) };
        entries.insert(key.to_owned(), StoredValue { payload, expires_at });
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .remove(key)
            .is_some_and(|value| value.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_payload(key).is_some())
    }
}

impl Sweep for MemoryRemote {
    fn purge_expired(&self) -> usize {
        MemoryRemote::purge_expired(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let remote = MemoryRemote::new();
        assert_eq!(remote.get("k").await.unwrap(), None);

        let stored = remote
            .set("k", Bytes::from_static(b"v"), Duration::ZERO, SetCondition::Always)
            .await
            .unwrap();
        assert!(stored);
        assert_eq!(remote.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
        assert!(remote.exists("k").await.unwrap());

        assert!(remote.delete("k").await.unwrap());
        assert!(!remote.delete("k").await.unwrap());
        assert!(!remote.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let remote = MemoryRemote::new();
        remote
            .set("k", Bytes::from_static(b"v"), Duration::from_millis(30), SetCondition::Always)
            .await
            .unwrap();
        assert!(remote.exists("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(remote.get("k").await.unwrap(), None);
        assert_eq!(remote.len(), 1);
        assert_eq!(remote.purge_expired(), 1);
        assert!(remote.is_empty());
    }

    #[tokio::test]
    async fn test_conditional_writes() {
        let remote = MemoryRemote::new();
        let v1 = Bytes::from_static(b"v1");
        let v2 = Bytes::from_static(b"v2");

        assert!(!remote.set("k", v1.clone(), Duration::ZERO, SetCondition::IfPresent).await.unwrap());
        assert!(remote.set("k", v1.clone(), Duration::ZERO, SetCondition::IfAbsent).await.unwrap());
        assert!(!remote.set("k", v2.clone(), Duration::ZERO, SetCondition::IfAbsent).await.unwrap());
        assert_eq!(remote.get("k").await.unwrap(), Some(v1));
        assert!(remote.set("k", v2.clone(), Duration::ZERO, SetCondition::IfPresent).await.unwrap());
        assert_eq!(remote.get("k").await.unwrap(), Some(v2));
    }

    #[tokio::test]
    async fn test_stats() {
        let remote = MemoryRemote::new();
        remote
            .set("k", Bytes::new(), Duration::ZERO, SetCondition::Always)
            .await
            .unwrap();
        remote.get("k").await.unwrap();
        remote.get("missing").await.unwrap();

        let stats = remote.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }
}
