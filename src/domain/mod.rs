//! Domain layer - Core security types, errors and trait seams

pub mod api_key;
pub mod credential;
pub mod error;
pub mod oauth;
pub mod rate_limit;
pub mod security_event;
pub mod store;

pub use api_key::{ApiKeyId, ApiKeyRecord, ApiKeyRepository};
pub use credential::{parse_scope_list, CredentialKind, Scope, ScopeParseError};
pub use error::{DomainError, SecurityError};
pub use oauth::{AuthorizeRequest, ClientRegistry, OAuthState, PkceMethod};
pub use rate_limit::{
    RateLimitConfig, RateLimitDecision, RateLimitInfo, RateLimitScope, RateLimitStatus,
    RequestIdentity, ViolationRecord,
};
pub use security_event::{SecurityEvent, SecurityEventSink, SecurityEventType, Severity};
pub use store::{Counter, KeyValueStore, KeyValueStoreExt};
