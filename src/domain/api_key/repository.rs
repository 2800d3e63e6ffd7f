//! API key repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::{ApiKeyId, ApiKeyRecord};
use crate::domain::DomainError;

/// Narrow persistence seam for API key records
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get a record by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, DomainError>;

    /// Persist a new record
    async fn create(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, DomainError>;

    /// Replace an existing record
    async fn update(&self, record: &ApiKeyRecord) -> Result<ApiKeyRecord, DomainError>;

    /// List all records owned by a team
    async fn list_by_team(&self, team_id: &str) -> Result<Vec<ApiKeyRecord>, DomainError>;

    /// List records that are neither revoked nor expired
    async fn list_active(&self) -> Result<Vec<ApiKeyRecord>, DomainError>;

    /// Record the last time a key was used
    async fn record_usage(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError>;
}
