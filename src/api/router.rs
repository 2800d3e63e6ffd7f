use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::api_keys;
use super::health;
use super::middleware::{api_key_identity_middleware, rate_limit_middleware};
use super::oauth;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Create the full router with application state
pub fn create_router(state: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/oauth/authorize", get(oauth::authorize))
        .route_layer(from_fn_with_state(
            state.messaging_limiter.clone(),
            rate_limit_middleware,
        ));

    // Outermost first: resolve the key's user, then limit by it
    let api_routes = Router::new()
        .route("/api/keys/me", get(api_keys::current_key))
        .route_layer(from_fn_with_state(
            state.api_limiter.clone(),
            rate_limit_middleware,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            api_key_identity_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .merge(oauth_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Router with the Prometheus endpoint mounted when metrics are enabled
pub fn create_router_with_metrics(
    state: AppState,
    metrics: Option<PrometheusMetrics>,
    metrics_path: &str,
) -> Router {
    let router = create_router(state);

    match metrics {
        Some(metrics) => router.merge(create_metrics_router(metrics, metrics_path)),
        None => router,
    }
}
