//! API key verification cache
//!
//! Memoizes successful bcrypt verifications under a keyed index hash so the
//! adaptive hash only runs on a cache miss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::api_key::{ApiKeyId, ApiKeyRecord};
use crate::domain::store::{KeyValueStore, KeyValueStoreExt};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_cache_lookup;

const ENTRY_PREFIX: &str = "apikey:cache:";
const ID_INDEX_PREFIX: &str = "apikey:ids:";

/// Default lifetime of a cached verification
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1800);

/// A verified record snapshot keyed by the token's index hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedApiKeyEntry {
    pub index_hash: String,
    /// Record with its stored hash stripped
    pub record: ApiKeyRecord,
    pub inserted_at: DateTime<Utc>,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    invalidations: AtomicU64,
}

/// Verification cache backed by the shared key-value store
#[derive(Debug)]
pub struct ApiKeyVerificationCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    /// Serializes read-modify-write of the per-id index lists
    index_lock: Mutex<()>,
    counters: Counters,
}

impl ApiKeyVerificationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_CACHE_TTL,
            index_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry_key(index_hash: &str) -> String {
        format!("{}{}", ENTRY_PREFIX, index_hash)
    }

    fn id_index_key(id: &ApiKeyId) -> String {
        format!("{}{}", ID_INDEX_PREFIX, id)
    }

    pub async fn get(&self, index_hash: &str) -> Result<Option<CachedApiKeyEntry>, DomainError> {
        let entry: Option<CachedApiKeyEntry> = self.store.get(&Self::entry_key(index_hash)).await?;

        record_cache_lookup(entry.is_some());

        if entry.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }

        Ok(entry)
    }

    /// Cache a verified record. `ttl` defaults to the cache's configured TTL.
    pub async fn set(
        &self,
        index_hash: &str,
        record: &ApiKeyRecord,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let ttl = ttl.unwrap_or(self.ttl);
        let entry = CachedApiKeyEntry {
            index_hash: index_hash.to_string(),
            record: record.snapshot(),
            inserted_at: Utc::now(),
        };

        let _guard = self.index_lock.lock().await;

        self.store.set(&Self::entry_key(index_hash), &entry, ttl).await?;

        let index_key = Self::id_index_key(record.id());
        let mut hashes: Vec<String> = self.store.get(&index_key).await?.unwrap_or_default();

        if !hashes.iter().any(|h| h == index_hash) {
            hashes.push(index_hash.to_string());
        }

        // The index must outlive every entry it lists
        let index_ttl = match self.store.ttl(&index_key).await? {
            Some(existing) => existing.max(ttl),
            None => ttl,
        };
        self.store.set(&index_key, &hashes, index_ttl).await?;
        self.counters.sets.fetch_add(1, Ordering::Relaxed);

        debug!(api_key_id = %record.id(), "Cached API key verification");
        Ok(())
    }

    /// Purge every entry tied to a record. Returns how many were removed.
    pub async fn invalidate_by_api_key_id(&self, id: &ApiKeyId) -> Result<usize, DomainError> {
        let _guard = self.index_lock.lock().await;

        let index_key = Self::id_index_key(id);
        let hashes: Vec<String> = self.store.get(&index_key).await?.unwrap_or_default();

        let mut removed = 0;
        for hash in &hashes {
            if self.store.delete(&Self::entry_key(hash)).await? {
                removed += 1;
            }
        }

        self.store.delete(&index_key).await?;
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        debug!(api_key_id = %id, removed, "Invalidated cached API key verifications");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            hits,
            misses,
            sets: self.counters.sets.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::Scope;
    use crate::domain::store::MockStore;
    use crate::infrastructure::store::InMemoryStore;

    fn record() -> ApiKeyRecord {
        ApiKeyRecord::new(
            ApiKeyId::generate(),
            "team-1",
            "user-1",
            "key",
            [Scope::ReadData],
            "$2b$04$secret-hash",
        )
    }

    fn cache() -> ApiKeyVerificationCache {
        ApiKeyVerificationCache::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache();
        let record = record();

        assert!(cache.get("idx-1").await.unwrap().is_none());

        cache.set("idx-1", &record, None).await.unwrap();

        let entry = cache.get("idx-1").await.unwrap().unwrap();
        assert_eq!(entry.record.id(), record.id());
        assert_eq!(entry.index_hash, "idx-1");
        assert!(entry.record.stored_hash().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_purges_all_entries_for_id() {
        let cache = cache();
        let record = record();
        let other = self::record();

        cache.set("idx-1", &record, None).await.unwrap();
        cache.set("idx-2", &record, None).await.unwrap();
        cache.set("idx-other", &other, None).await.unwrap();

        let removed = cache.invalidate_by_api_key_id(record.id()).await.unwrap();
        assert_eq!(removed, 2);

        assert!(cache.get("idx-1").await.unwrap().is_none());
        assert!(cache.get("idx-2").await.unwrap().is_none());
        assert!(cache.get("idx-other").await.unwrap().is_some());

        assert_eq!(cache.invalidate_by_api_key_id(record.id()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_short_lived_set_keeps_longer_entries_invalidatable() {
        let cache = cache();
        let record = record();

        cache
            .set("idx-long", &record, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        cache
            .set("idx-short", &record, Some(Duration::from_millis(30)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.invalidate_by_api_key_id(record.id()).await.unwrap(), 1);
        assert!(cache.get("idx-long").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = cache();
        let record = record();

        cache
            .set("idx-1", &record, Some(Duration::from_millis(30)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("idx-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = cache();
        let record = record();

        cache.get("idx-1").await.unwrap();
        cache.set("idx-1", &record, None).await.unwrap();
        cache.get("idx-1").await.unwrap();
        cache.get("idx-1").await.unwrap();
        cache.invalidate_by_api_key_id(record.id()).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.invalidations, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let cache = ApiKeyVerificationCache::new(Arc::new(MockStore::failing("down")));

        assert!(cache.get("idx").await.is_err());
        assert!(cache.set("idx", &record(), None).await.is_err());
        assert!(cache.invalidate_by_api_key_id(&ApiKeyId::generate()).await.is_err());
    }
}
