//! OAuth authorization endpoint

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use super::middleware::extract_origin;
use super::state::AppState;
use super::types::ApiError;
use crate::domain::oauth::AuthorizeRequest;
use crate::domain::rate_limit::RequestIdentity;
use crate::infrastructure::oauth::AuthorizationGrant;

/// `GET /oauth/authorize`
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<AuthorizeRequest>,
) -> Result<Json<AuthorizationGrant>, ApiError> {
    let origin = extract_origin(&headers).unwrap_or_else(|| "unknown".to_string());
    let identity = RequestIdentity::anonymous(origin);

    let grant = state
        .authorization
        .authorize(request, &identity.label())
        .await?;

    Ok(Json(grant))
}
