//! Key-value store implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{StoreBackend, StoreConfig, StoreFactory};
pub use in_memory::{InMemoryStore, InMemoryStoreConfig};
pub use redis::{RedisStore, RedisStoreConfig};
