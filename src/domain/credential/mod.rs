//! Credential domain
//!
//! Credential classes, their wire prefixes, and the scope vocabulary
//! attached to API keys and OAuth grants.

mod kind;
mod scope;

pub use kind::{is_base64url, CredentialKind, MIN_RANDOM_PART_LEN};
pub use scope::{parse_scope_list, Scope, ScopeParseError};
