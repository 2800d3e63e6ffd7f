//! Security event sink trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::event::SecurityEvent;

/// Destination for security events. Transport is up to the implementation;
/// emission must never fail the caller, so errors are handled internally.
#[async_trait]
pub trait SecurityEventSink: Send + Sync + Debug {
    async fn emit(&self, event: SecurityEvent);
}
