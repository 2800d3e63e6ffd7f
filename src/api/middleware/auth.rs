//! API key authentication: identity resolution ahead of rate limiting and
//! the extractor handlers use

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::rate_limit::request_origin;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::ApiKeyRecord;
use crate::domain::rate_limit::RequestIdentity;

/// Outcome of validating the request's API key once, ahead of the
/// extractor. `None` means a key was presented and rejected.
#[derive(Debug, Clone)]
pub struct ResolvedApiKey(pub Option<ApiKeyRecord>);

/// Validate a presented API key so the API limiter counts the key's user
/// rather than the origin. Requests without a valid key pass through
/// unchanged and are limited by origin. Origins already blocked by the API
/// limiter skip validation.
pub async fn api_key_identity_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_api_key_from_headers(request.headers()) else {
        return next.run(request).await;
    };

    let origin = request_origin(&request);
    let blocked = match state
        .api_limiter
        .is_blocked(&RequestIdentity::anonymous(origin.clone()))
        .await
    {
        Ok(blocked) => blocked,
        Err(e) => {
            warn!(error = %e, "Block check failed before API key resolution");
            false
        }
    };

    if !blocked {
        let record = match state.api_keys.validate(&token).await {
            Ok(record) => {
                request
                    .extensions_mut()
                    .insert(RequestIdentity::authenticated(record.user_id(), origin));
                Some(record)
            }
            Err(e) => {
                debug!(error_code = e.error_code(), "API key rejected");
                None
            }
        };
        request.extensions_mut().insert(ResolvedApiKey(record));
    }

    next.run(request).await
}

/// Extractor that requires a valid API key
///
/// Extracts the API key from either:
/// - Authorization header: `Bearer <api_key>`
/// - X-API-Key header: `<api_key>`
///
/// Every failure is the same generic 401.
#[derive(Debug, Clone)]
pub struct RequireApiKey(pub ApiKeyRecord);

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedApiKey(resolved)) = parts.extensions.get::<ResolvedApiKey>() {
            return resolved
                .clone()
                .map(RequireApiKey)
                .ok_or_else(ApiError::invalid_token);
        }

        let token = extract_api_key_from_headers(&parts.headers).ok_or_else(ApiError::invalid_token)?;

        match state.api_keys.validate(&token).await {
            Ok(record) => Ok(RequireApiKey(record)),
            Err(e) => {
                debug!(error_code = e.error_code(), "API key rejected");
                Err(ApiError::invalid_token())
            }
        }
    }
}

fn extract_api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = auth_header.to_str().ok()?.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer faw_api_abc".parse().unwrap());

        assert_eq!(extract_api_key_from_headers(&headers).as_deref(), Some("faw_api_abc"));
    }

    #[test]
    fn test_extract_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "  faw_api_xyz ".parse().unwrap());

        assert_eq!(extract_api_key_from_headers(&headers).as_deref(), Some("faw_api_xyz"));
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer faw_api_bearer".parse().unwrap());
        headers.insert("x-api-key", "faw_api_header".parse().unwrap());

        assert_eq!(
            extract_api_key_from_headers(&headers).as_deref(),
            Some("faw_api_bearer")
        );
    }

    #[test]
    fn test_missing_or_other_scheme() {
        assert!(extract_api_key_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(extract_api_key_from_headers(&headers).is_none());
    }
}
