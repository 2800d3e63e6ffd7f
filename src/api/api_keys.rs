//! API key introspection

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::middleware::RequireApiKey;
use crate::domain::api_key::ApiKeyId;
use crate::domain::credential::Scope;

#[derive(Debug, Serialize)]
pub struct ApiKeyInfo {
    pub id: ApiKeyId,
    pub team_id: String,
    pub name: String,
    pub scopes: Vec<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `GET /api/keys/me`: describe the calling key
pub async fn current_key(RequireApiKey(record): RequireApiKey) -> Json<ApiKeyInfo> {
    Json(ApiKeyInfo {
        id: *record.id(),
        team_id: record.team_id().to_string(),
        name: record.name().to_string(),
        scopes: record.scopes().iter().cloned().collect(),
        expires_at: record.expires_at(),
    })
}
