//! OAuth authorization flow protection
//!
//! CSRF state, PKCE, redirect URI policy, and the guard that applies them
//! to the authorization endpoint.

mod authorize;
mod client_registry;
mod csrf;
mod pkce;
mod redirect;

pub use authorize::{AuthorizationGrant, AuthorizationGuard};
pub use client_registry::InMemoryClientRegistry;
pub use csrf::{CsrfStateStore, DEFAULT_STATE_TTL};
pub use pkce::{validate_pkce, MAX_VERIFIER_LEN, MIN_VERIFIER_LEN};
pub use redirect::RedirectUriPolicy;
