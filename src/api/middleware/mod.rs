//! API middleware components

pub mod auth;
pub mod rate_limit;

pub use auth::{api_key_identity_middleware, RequireApiKey, ResolvedApiKey};
pub use rate_limit::{extract_origin, rate_limit_middleware, request_origin};
