//! Shared handler state

use std::sync::Arc;

use crate::domain::security_event::SecurityEventSink;
use crate::domain::store::KeyValueStore;
use crate::infrastructure::api_key::ApiKeyService;
use crate::infrastructure::oauth::AuthorizationGuard;
use crate::infrastructure::rate_limit::RateLimitGuard;

/// Components the HTTP surface forwards to
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyService>,
    pub authorization: Arc<AuthorizationGuard>,
    /// Strict limiter for unauthenticated endpoints
    pub messaging_limiter: Arc<RateLimitGuard>,
    /// Limiter for API-key authenticated traffic
    pub api_limiter: Arc<RateLimitGuard>,
    pub events: Arc<dyn SecurityEventSink>,
    pub store: Arc<dyn KeyValueStore>,
}
