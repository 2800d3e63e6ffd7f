//! Store factory for runtime backend selection

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::store::KeyValueStore;
use crate::domain::DomainError;

use super::in_memory::{InMemoryStore, InMemoryStoreConfig};
use super::redis::{RedisStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Single-process store using moka
    #[default]
    InMemory,
    /// Shared Redis store
    Redis,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::InMemory => write!(f, "in_memory"),
            StoreBackend::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(StoreBackend::InMemory),
            "redis" => Ok(StoreBackend::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown store backend: {}. Valid backends: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the store factory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Redis URL (required for the Redis backend)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing (Redis only)
    pub key_prefix: Option<String>,
    /// Maximum capacity (in-memory only)
    pub max_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: InMemoryStoreConfig::default().max_capacity,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Factory for creating store instances
#[derive(Debug, Default)]
pub struct StoreFactory;

impl StoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates a store based on configuration
    pub async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, DomainError> {
        match config.backend {
            StoreBackend::InMemory => {
                info!(max_capacity = config.max_capacity, "Using in-memory store");

                let store = InMemoryStore::with_config(
                    InMemoryStoreConfig::default().with_max_capacity(config.max_capacity),
                );
                Ok(Arc::new(store))
            }
            StoreBackend::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for the Redis store backend")
                })?;

                let mut redis_config = RedisStoreConfig::new(url);

                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }

                let store = RedisStore::new(redis_config).await?;
                info!("Using Redis store");
                Ok(Arc::new(store))
            }
        }
    }

    /// Creates an in-memory store with default settings
    pub fn create_in_memory(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::KeyValueStoreExt;
    use std::time::Duration;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("in_memory".parse::<StoreBackend>().unwrap(), StoreBackend::InMemory);
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::InMemory);
        assert_eq!("REDIS".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert!("memcached".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(StoreBackend::InMemory.to_string(), "in_memory");
        assert_eq!(StoreBackend::Redis.to_string(), "redis");
    }

    #[tokio::test]
    async fn test_factory_create_in_memory() {
        let factory = StoreFactory::new();
        let store = factory
            .create(&StoreConfig::in_memory().with_max_capacity(10))
            .await
            .unwrap();

        assert_eq!(store.backend(), "in_memory");

        store
            .set("test", &"value", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = store.get("test").await.unwrap();
        assert_eq!(result, Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_factory_redis_requires_url() {
        let factory = StoreFactory::new();
        let config = StoreConfig {
            backend: StoreBackend::Redis,
            redis_url: None,
            ..Default::default()
        };

        let result = factory.create(&config).await;
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
