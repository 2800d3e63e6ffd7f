//! Health check endpoints

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::state::AppState;

const READINESS_KEY: &str = "health:ready";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Liveness: 200 while the process is serving
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: None,
            latency_ms: None,
        }),
    )
}

/// Readiness: round-trips a marker key through the shared store. A failing
/// store reports degraded because the limiter keeps serving without it.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let roundtrip = state
        .store
        .set_raw(READINESS_KEY, "1", Duration::from_secs(5))
        .await;

    let status = match roundtrip {
        Ok(()) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Store readiness check failed");
            HealthStatus::Degraded
        }
    };

    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: Some(state.store.backend().to_string()),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        }),
    )
}
