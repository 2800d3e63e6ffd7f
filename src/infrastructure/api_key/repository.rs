//! In-memory API key repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKeyId, ApiKeyRecord, ApiKeyRepository};
use crate::domain::DomainError;

/// Reference implementation of [`ApiKeyRepository`]
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: Arc<RwLock<HashMap<ApiKeyId, ApiKeyRecord>>>,
    should_fail: AtomicBool,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a storage error
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    fn check_should_fail(&self) -> Result<(), DomainError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(DomainError::storage("API key repository unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, DomainError> {
        self.check_should_fail()?;
        Ok(self.keys.read().await.get(id).cloned())
    }

    async fn create(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, DomainError> {
        self.check_should_fail()?;
        let mut keys = self.keys.write().await;

        if keys.contains_key(record.id()) {
            return Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                record.id()
            )));
        }

        keys.insert(*record.id(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: &ApiKeyRecord) -> Result<ApiKeyRecord, DomainError> {
        self.check_should_fail()?;
        let mut keys = self.keys.write().await;

        match keys.get_mut(record.id()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record.clone())
            }
            None => Err(DomainError::not_found(format!(
                "API key '{}' not found",
                record.id()
            ))),
        }
    }

    async fn list_by_team(&self, team_id: &str) -> Result<Vec<ApiKeyRecord>, DomainError> {
        self.check_should_fail()?;
        let keys = self.keys.read().await;

        let mut result: Vec<ApiKeyRecord> = keys
            .values()
            .filter(|k| k.team_id() == team_id)
            .cloned()
            .collect();
        result.sort_by_key(|k| k.created_at());

        Ok(result)
    }

    async fn list_active(&self) -> Result<Vec<ApiKeyRecord>, DomainError> {
        self.check_should_fail()?;
        let keys = self.keys.read().await;

        Ok(keys.values().filter(|k| k.is_active()).cloned().collect())
    }

    async fn record_usage(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.check_should_fail()?;
        let mut keys = self.keys.write().await;

        match keys.get_mut(id) {
            Some(key) => {
                key.record_usage(at);
                Ok(())
            }
            None => Err(DomainError::not_found(format!("API key '{}' not found", id))),
        }
    }
}
