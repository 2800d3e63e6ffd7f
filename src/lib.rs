//! Credential Guard
//!
//! Credential security and abuse prevention for OAuth and API-key surfaces:
//! - Prefixed credential generation with peppered adaptive hashing
//! - Cached API key verification with explicit invalidation
//! - CSRF state, PKCE, and redirect URI checks for the authorize endpoint
//! - Fixed-window rate limiting with escalating blocks

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use api::state::AppState;
use domain::security_event::SecurityEventSink;
use domain::store::KeyValueStore;
use domain::DomainError;
use infrastructure::{
    api_key::{ApiKeyService, ApiKeyVerificationCache, InMemoryApiKeyRepository},
    credential::CredentialHasher,
    oauth::{AuthorizationGuard, CsrfStateStore, InMemoryClientRegistry, RedirectUriPolicy},
    rate_limit::RateLimitGuard,
    security_event::TracingEventSink,
    store::StoreFactory,
    sweeper::{BackgroundSweeper, SweeperHandle},
};

/// The wired security components and their background sweeper
pub struct SecurityRuntime {
    pub store: Arc<dyn KeyValueStore>,
    pub events: Arc<dyn SecurityEventSink>,
    pub hasher: CredentialHasher,
    pub api_key_repository: Arc<InMemoryApiKeyRepository>,
    pub api_keys: Arc<ApiKeyService>,
    pub clients: Arc<InMemoryClientRegistry>,
    pub states: Arc<CsrfStateStore>,
    pub authorization: Arc<AuthorizationGuard>,
    pub messaging_limiter: Arc<RateLimitGuard>,
    pub api_limiter: Arc<RateLimitGuard>,
    sweep_interval: Duration,
    sweeper: Option<SweeperHandle>,
}

impl SecurityRuntime {
    /// Build from configuration, connecting the configured store backend
    pub async fn from_config(config: &AppConfig) -> Result<Self, DomainError> {
        config.validate()?;

        let store = StoreFactory::new().create(&config.store).await?;
        Ok(Self::with_components(config, store, Arc::new(TracingEventSink)))
    }

    /// Build around an existing store and event sink
    pub fn with_components(
        config: &AppConfig,
        store: Arc<dyn KeyValueStore>,
        events: Arc<dyn SecurityEventSink>,
    ) -> Self {
        let security = &config.security;

        let hasher = CredentialHasher::new(security.pepper.clone())
            .with_bcrypt_cost(security.bcrypt_cost)
            .with_pbkdf2_iterations(security.pbkdf2_iterations);

        let api_key_repository = Arc::new(InMemoryApiKeyRepository::new());
        let cache = Arc::new(
            ApiKeyVerificationCache::new(store.clone())
                .with_ttl(Duration::from_secs(config.api_keys.cache_ttl_secs)),
        );
        let api_keys = Arc::new(
            ApiKeyService::new(
                api_key_repository.clone(),
                cache,
                hasher.clone(),
                events.clone(),
            )
            .with_default_expiry_days(config.api_keys.default_expiry_days),
        );

        let clients = Arc::new(InMemoryClientRegistry::new());
        let states = Arc::new(
            CsrfStateStore::new(store.clone())
                .with_ttl(Duration::from_secs(config.oauth.state_ttl_secs)),
        );
        let authorization = Arc::new(AuthorizationGuard::new(
            clients.clone(),
            states.clone(),
            RedirectUriPolicy::new(security.is_production()),
            events.clone(),
        ));

        let messaging_limiter = Arc::new(
            RateLimitGuard::new(store.clone(), config.rate_limit.messaging, events.clone())
                .with_namespace("messaging"),
        );
        let api_limiter = Arc::new(
            RateLimitGuard::new(store.clone(), config.rate_limit.api, events.clone())
                .with_namespace("api"),
        );

        Self {
            store,
            events,
            hasher,
            api_key_repository,
            api_keys,
            clients,
            states,
            authorization,
            messaging_limiter,
            api_limiter,
            sweep_interval: Duration::from_secs(config.oauth.sweep_interval_secs),
            sweeper: None,
        }
    }

    /// Start the periodic store sweep. Calling it again is a no-op.
    pub fn start_sweeper(&mut self) {
        if self.sweeper.is_none() {
            let handle = BackgroundSweeper::new(self.store.clone())
                .with_interval(self.sweep_interval)
                .spawn();
            self.sweeper = Some(handle);
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            api_keys: self.api_keys.clone(),
            authorization: self.authorization.clone(),
            messaging_limiter: self.messaging_limiter.clone(),
            api_limiter: self.api_limiter.clone(),
            events: self.events.clone(),
            store: self.store.clone(),
        }
    }

    /// Stop background work
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.shutdown().await;
        }
        info!("Security runtime stopped");
    }
}
