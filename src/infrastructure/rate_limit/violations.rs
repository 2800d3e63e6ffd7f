//! Violation tracking with escalating blocks

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::rate_limit::{RateLimitConfig, ViolationRecord};
use crate::domain::store::{KeyValueStore, KeyValueStoreExt};
use crate::domain::DomainError;

/// Violation counters kept apart from the request counters. Each violation
/// pushes the record's expiry out to `block_duration * count`.
#[derive(Debug, Clone)]
pub struct ViolationTracker {
    store: Arc<dyn KeyValueStore>,
}

impl ViolationTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Record one violation against `key`
    pub async fn record(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<ViolationRecord, DomainError> {
        let counter = self
            .store
            .increment(key, config.block_duration_for(1))
            .await?;

        let block = config.block_duration_for(counter.count);
        self.store.expire(key, block).await?;

        let record = ViolationRecord {
            key: key.to_string(),
            violation_count: counter.count,
            block_expires_at: Utc::now() + to_chrono(block)?,
        };

        debug!(
            key = %key,
            violations = record.violation_count,
            block_secs = block.as_secs(),
            "Recorded rate limit violation"
        );

        Ok(record)
    }

    /// Current violations for `key`, if any are still live
    pub async fn get(&self, key: &str) -> Result<Option<ViolationRecord>, DomainError> {
        let Some(count) = self.store.get_counter(key).await? else {
            return Ok(None);
        };

        let Some(remaining) = self.store.ttl(key).await? else {
            return Ok(None);
        };

        Ok(Some(ViolationRecord {
            key: key.to_string(),
            violation_count: count,
            block_expires_at: Utc::now() + to_chrono(remaining)?,
        }))
    }

    /// The active block on `key` as of `now`
    pub async fn active_block(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<ViolationRecord>, DomainError> {
        Ok(self
            .get(key)
            .await?
            .filter(|record| record.is_blocked(config.max_violations, now)))
    }

    pub async fn clear(&self, key: &str) -> Result<bool, DomainError> {
        self.store.delete(key).await
    }
}

fn to_chrono(duration: std::time::Duration) -> Result<chrono::Duration, DomainError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| DomainError::internal(format!("Duration out of range: {}", e)))
}
