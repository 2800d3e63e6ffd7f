//! Infrastructure layer - Store backends, hashing, and guard implementations

pub mod api_key;
pub mod credential;
pub mod logging;
pub mod oauth;
pub mod observability;
pub mod rate_limit;
pub mod security_event;
pub mod store;
pub mod sweeper;
