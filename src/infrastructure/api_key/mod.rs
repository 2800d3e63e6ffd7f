//! API key infrastructure
//!
//! Issuance, verification caching, and the in-memory record store.

mod cache;
mod repository;
mod service;

pub use cache::{ApiKeyVerificationCache, CacheStats, CachedApiKeyEntry, DEFAULT_CACHE_TTL};
pub use repository::InMemoryApiKeyRepository;
pub use service::{
    ApiKeyService, CreateApiKeyRequest, CreatedApiKey, ScopeValidation, UpdateApiKeyRequest,
    DEFAULT_EXPIRY_DAYS,
};
