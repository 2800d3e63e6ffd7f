//! OAuth client registry seam

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Source of registered redirect URIs, owned by the client persistence layer
#[async_trait]
pub trait ClientRegistry: Send + Sync + Debug {
    /// Registered redirect URIs for a client, or `None` if the client is unknown
    async fn redirect_uris(&self, client_id: &str) -> Result<Option<Vec<String>>, DomainError>;
}
