//! Rate limiting middleware

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::types::ApiError;
use crate::domain::rate_limit::{RateLimitDecision, RateLimitInfo, RequestIdentity};
use crate::infrastructure::rate_limit::RateLimitGuard;

const UNKNOWN_ORIGIN: &str = "unknown";

const ORIGIN_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const GLOBAL_LIMIT: HeaderName = HeaderName::from_static("x-global-ratelimit-limit");
const GLOBAL_REMAINING: HeaderName = HeaderName::from_static("x-global-ratelimit-remaining");
const GLOBAL_RESET: HeaderName = HeaderName::from_static("x-global-ratelimit-reset");

/// Network origin of a request from proxy headers. Only the first
/// `X-Forwarded-For` hop is considered and values must parse as an IP.
pub fn extract_origin(headers: &HeaderMap) -> Option<String> {
    ORIGIN_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        let first = value.split(',').next()?.trim();
        first.parse::<IpAddr>().ok().map(|ip| ip.to_string())
    })
}

/// Origin from proxy headers, else the peer address, else `unknown`
pub fn request_origin(request: &Request<Body>) -> String {
    extract_origin(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
}

fn request_identity(request: &Request<Body>) -> RequestIdentity {
    match request.extensions().get::<RequestIdentity>() {
        Some(identity) => identity.clone(),
        None => RequestIdentity::anonymous(request_origin(request)),
    }
}

/// Apply a [`RateLimitGuard`]. An upstream layer such as
/// `api_key_identity_middleware` may insert a [`RequestIdentity`] extension
/// to limit by user instead of origin.
pub async fn rate_limit_middleware(
    State(guard): State<Arc<RateLimitGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = request_identity(&request);
    let decision = guard.check(&identity).await;

    let mut response = match decision.to_error() {
        Some(err) => ApiError::from(err).into_response(),
        None => next.run(request).await,
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    if let Some(info) = decision.identity {
        insert_info(headers, &info, [LIMIT, REMAINING, RESET]);
    }

    if let Some(info) = decision.global {
        insert_info(headers, &info, [GLOBAL_LIMIT, GLOBAL_REMAINING, GLOBAL_RESET]);
    }
}

fn insert_info(headers: &mut HeaderMap, info: &RateLimitInfo, names: [HeaderName; 3]) {
    let [limit, remaining, reset] = names;
    headers.insert(limit, HeaderValue::from(info.limit));
    headers.insert(remaining, HeaderValue::from(info.remaining));
    headers.insert(reset, HeaderValue::from(info.reset_at));
}
