//! In-memory key-value store using moka

use std::future::ready;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};

use crate::domain::store::{Counter, KeyValueStore};
use crate::domain::DomainError;

/// Keys under this prefix hold escalating rate-limit blocks
pub const BLOCK_KEY_PREFIX: &str = "rl:block:";

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of evictable entries
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime, regardless of its own TTL
    pub max_ttl: Duration,
    /// Keys with these prefixes live in a tier exempt from capacity
    /// eviction and leave only by expiry or deletion
    pub pinned_prefixes: Vec<String>,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            max_ttl: Duration::from_secs(86_400),
            pinned_prefixes: vec![BLOCK_KEY_PREFIX.to_string()],
        }
    }
}

impl InMemoryStoreConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    pub fn with_pinned_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pinned_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

/// Entry stored in moka
#[derive(Debug, Clone)]
struct StoreEntry {
    /// Serialized value
    data: String,
    /// Expiration timestamp (millis since epoch)
    expires_at: u64,
}

impl StoreEntry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at > now
    }
}

/// Single-process store. Every read-modify-write goes through moka's
/// per-key entry API, so increments and conditional removals are atomic
/// with respect to each other. Not shared across processes.
#[derive(Debug)]
pub struct InMemoryStore {
    cache: MokaCache<String, StoreEntry>,
    /// Unbounded tier for pinned prefixes
    pinned: MokaCache<String, StoreEntry>,
    config: InMemoryStoreConfig,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_ttl)
            .build();
        let pinned = MokaCache::builder().time_to_live(config.max_ttl).build();

        Self {
            cache,
            pinned,
            config,
        }
    }

    fn tier(&self, key: &str) -> &MokaCache<String, StoreEntry> {
        let pinned = self
            .config
            .pinned_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()));

        if pinned { &self.pinned } else { &self.cache }
    }

    pub fn config(&self) -> &InMemoryStoreConfig {
        &self.config
    }

    /// Approximate number of entries, expired ones included until purged
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.pinned.run_pending_tasks().await;
        self.cache.entry_count() + self.pinned.entry_count()
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
    }

    /// Removes `key` only if it is still expired at removal time, so a
    /// concurrent fresh write is never lost
    async fn remove_if_expired(&self, key: &str) -> bool {
        let now = Self::current_time_millis();

        let result = self
            .tier(key)
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) if !entry.value().is_live(now) => Op::Remove,
                    _ => Op::Nop,
                };
                ready(op)
            })
            .await;

        matches!(result, CompResult::Removed(_))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.tier(key).get(key).await {
            Some(entry) if entry.is_live(Self::current_time_millis()) => Ok(Some(entry.data)),
            Some(_) => {
                self.remove_if_expired(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = StoreEntry {
            data: value.to_string(),
            expires_at: Self::current_time_millis().saturating_add(Self::ttl_millis(ttl)),
        };

        self.tier(key).insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let removed = self.tier(key).remove(key).await;
        Ok(removed.is_some_and(|entry| entry.is_live(Self::current_time_millis())))
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<Counter, DomainError> {
        let now = Self::current_time_millis();
        let window = Self::ttl_millis(ttl);

        let entry = self
            .tier(key)
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                let next = match existing.map(|entry| entry.into_value()) {
                    Some(current) if current.is_live(now) => {
                        let count = current.data.parse::<u64>().unwrap_or(0).saturating_add(1);
                        StoreEntry {
                            data: count.to_string(),
                            expires_at: current.expires_at,
                        }
                    }
                    _ => StoreEntry {
                        data: "1".to_string(),
                        expires_at: now.saturating_add(window),
                    },
                };
                ready(next)
            })
            .await
            .into_value();

        let count = entry.data.parse::<u64>().map_err(|_| {
            DomainError::store(format!("Key '{}' does not hold a counter", key))
        })?;

        Ok(Counter {
            count,
            reset_after: Duration::from_millis(entry.expires_at.saturating_sub(now)),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, DomainError> {
        let now = Self::current_time_millis();
        let expires_at = now.saturating_add(Self::ttl_millis(ttl));

        let result = self
            .tier(key)
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing.map(|entry| entry.into_value()) {
                    Some(current) if current.is_live(now) => Op::Put(StoreEntry {
                        data: current.data,
                        expires_at,
                    }),
                    Some(_) => Op::Remove,
                    None => Op::Nop,
                };
                ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        let now = Self::current_time_millis();

        match self.tier(key).get(key).await {
            Some(entry) if entry.is_live(now) => {
                Ok(Some(Duration::from_millis(entry.expires_at - now)))
            }
            Some(_) => {
                self.remove_if_expired(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        self.pinned.run_pending_tasks().await;

        let now = Self::current_time_millis();
        let tiers = [self.cache.clone(), self.pinned.clone()];

        // Use blocking task to iterate over cache entries
        let expired: Vec<String> = tokio::task::spawn_blocking(move || {
            tiers
                .iter()
                .flat_map(|tier| tier.iter())
                .filter(|(_, entry)| !entry.is_live(now))
                .map(|(key, _)| key.as_ref().clone())
                .collect()
        })
        .await
        .map_err(|e| DomainError::store(format!("Failed to iterate store: {}", e)))?;

        let mut purged = 0;

        for key in expired {
            if self.remove_if_expired(&key).await {
                purged += 1;
            }
        }

        Ok(purged)
    }

    fn backend(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::KeyValueStoreExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = store.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));

        let missing: Option<String> = store.get("missing").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_once() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.delete("key1").await.unwrap());
        assert!(!store.delete("key1").await.unwrap());
        assert!(!store.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_delete_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set_raw("once", "1", Duration::from_secs(60))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete("once").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_millis(50))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let result: Option<String> = store.get("key1").await.unwrap();
        assert!(result.is_none());
        assert!(!store.delete("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_keeps_window() {
        let store = InMemoryStore::new();
        let window = Duration::from_secs(60);

        let first = store.increment("counter", window).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(first.reset_after <= window);

        let second = store.increment("counter", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert!(second.reset_after <= first.reset_after);

        assert_eq!(store.get_counter("counter").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_increment_resets_after_window() {
        let store = InMemoryStore::new();
        let window = Duration::from_millis(50);

        store.increment("counter", window).await.unwrap();
        store.increment("counter", window).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let fresh = store.increment("counter", window).await.unwrap();
        assert_eq!(fresh.count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increment_is_atomic() {
        let store = Arc::new(InMemoryStore::new());

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .increment("hits", Duration::from_secs(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_counter("hits").await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let remaining = store.ttl("key1").await.unwrap().unwrap();
        assert!(remaining.as_secs() > 50 && remaining.as_secs() <= 60);

        assert!(store.expire("key1", Duration::from_secs(2)).await.unwrap());
        assert!(store.ttl("key1").await.unwrap().unwrap().as_secs() <= 2);

        assert!(!store.expire("missing", Duration::from_secs(2)).await.unwrap());
        assert!(store.ttl("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryStore::new();

        store
            .set_raw("short", "1", Duration::from_millis(20))
            .await
            .unwrap();
        store
            .set_raw("long", "1", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_raw("long").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_block_keys_survive_capacity_eviction() {
        let store = InMemoryStore::with_config(InMemoryStoreConfig::default().with_max_capacity(8));

        store
            .increment("rl:block:api:origin:10.0.0.1", Duration::from_secs(60))
            .await
            .unwrap();

        for i in 0..500 {
            store
                .increment(&format!("rl:api:origin:10.1.{}.{}", i / 256, i % 256), Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert_eq!(
            store.get_counter("rl:block:api:origin:10.0.0.1").await.unwrap(),
            Some(1)
        );
        assert!(store.ttl("rl:block:api:origin:10.0.0.1").await.unwrap().is_some());
        assert!(store.delete("rl:block:api:origin:10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_covers_pinned_tier() {
        let store = InMemoryStore::new();

        store
            .set_raw("rl:block:api:user:u1", "1", Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 0);
    }

    #[test]
    fn test_config() {
        let config = InMemoryStoreConfig::default()
            .with_max_capacity(100)
            .with_max_ttl(Duration::from_secs(300));

        let store = InMemoryStore::with_config(config);
        assert_eq!(store.config().max_capacity, 100);
        assert_eq!(store.config().max_ttl, Duration::from_secs(300));
        assert_eq!(store.config().pinned_prefixes, vec![BLOCK_KEY_PREFIX.to_string()]);

        let store = InMemoryStore::with_config(
            InMemoryStoreConfig::default().with_pinned_prefixes(["oauth:state:"]),
        );
        assert!(std::ptr::eq(store.tier("oauth:state:abc"), &store.pinned));
        assert!(std::ptr::eq(store.tier("rl:block:api:user:u1"), &store.cache));
    }
}
