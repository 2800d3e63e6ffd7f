//! Key-value store trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// State of a fixed-window counter after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// Value after the increment, starting at 1 for a fresh window
    pub count: u64,
    /// Time left until the window (and the counter) expires
    pub reset_after: Duration,
}

/// Pluggable key-value store with TTL support
///
/// Every call site in the crate goes through this trait, so the in-memory
/// implementation can be swapped for a distributed one without changes.
/// Values are JSON strings to keep the trait dyn-compatible; use
/// [`KeyValueStoreExt`] for typed access.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Gets a raw JSON value
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Deletes a live value. Returns whether one existed.
    ///
    /// Must be atomic: when two callers delete the same key concurrently at
    /// most one of them observes `true`.
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Atomically increments a counter. A missing or expired key starts a
    /// new window of length `ttl` at 1; an existing key keeps its expiry.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<Counter, DomainError>;

    /// Resets the TTL of a live key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, DomainError>;

    /// Remaining TTL of a live key
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError>;

    /// Physically removes expired entries, returning how many were dropped.
    /// Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> Result<usize, DomainError> {
        Ok(0)
    }

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Extension trait providing typed get/set operations
pub trait KeyValueStoreExt: KeyValueStore {
    /// Gets a typed value
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::store(format!("Failed to deserialize value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value with a TTL
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value)
                .map_err(|e| DomainError::store(format!("Failed to serialize value: {}", e)))?;
            self.set_raw(key, &data, ttl).await
        }
    }

    /// Reads a counter written by [`KeyValueStore::increment`] without
    /// changing it
    fn get_counter<'a>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<u64>, DomainError>> + Send {
        async move {
            match self.get_raw(key).await? {
                Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
                    DomainError::store(format!("Key '{}' does not hold a counter", key))
                }),
                None => Ok(None),
            }
        }
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStoreExt for T {}
