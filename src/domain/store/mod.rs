//! Key-value store domain - the shared backing for counters, violations,
//! authorization state and the verification cache

mod repository;

pub use repository::{Counter, KeyValueStore, KeyValueStoreExt};

#[cfg(test)]
pub use repository::mock::MockStore;
