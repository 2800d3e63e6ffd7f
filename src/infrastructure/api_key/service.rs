//! API key service
//!
//! Issues, verifies, and revokes API keys. Verification goes through the
//! verification cache first and only falls back to the adaptive hash scan
//! on a miss.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::{ApiKeyVerificationCache, CacheStats};
use crate::domain::api_key::{ApiKeyId, ApiKeyRecord, ApiKeyRepository};
use crate::domain::credential::{CredentialKind, Scope};
use crate::domain::security_event::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::domain::{DomainError, SecurityError};
use crate::infrastructure::credential::CredentialHasher;

/// Default key lifetime
pub const DEFAULT_EXPIRY_DAYS: u32 = 365;

/// Parameters for a new API key
#[derive(Debug, Clone)]
pub struct CreateApiKeyRequest {
    pub team_id: String,
    pub user_id: String,
    pub name: String,
    pub scopes: Vec<Scope>,
    /// Defaults to the service's configured expiry
    pub expires_in_days: Option<u32>,
}

/// Changes to an existing API key
#[derive(Debug, Clone, Default)]
pub struct UpdateApiKeyRequest {
    pub name: Option<String>,
    pub scopes: Option<Vec<Scope>>,
}

/// Result of creating a new API key
#[derive(Debug)]
pub struct CreatedApiKey {
    pub record: ApiKeyRecord,
    /// The raw token (only returned once)
    pub token: String,
}

/// Outcome of checking a list of requested scope strings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScopeValidation {
    pub valid: Vec<Scope>,
    pub invalid: Vec<String>,
}

impl ScopeValidation {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// API key service
#[derive(Debug)]
pub struct ApiKeyService {
    repository: Arc<dyn ApiKeyRepository>,
    cache: Arc<ApiKeyVerificationCache>,
    hasher: CredentialHasher,
    events: Arc<dyn SecurityEventSink>,
    default_expiry_days: u32,
}

impl ApiKeyService {
    pub fn new(
        repository: Arc<dyn ApiKeyRepository>,
        cache: Arc<ApiKeyVerificationCache>,
        hasher: CredentialHasher,
        events: Arc<dyn SecurityEventSink>,
    ) -> Self {
        Self {
            repository,
            cache,
            hasher,
            events,
            default_expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }

    pub fn with_default_expiry_days(mut self, days: u32) -> Self {
        self.default_expiry_days = days;
        self
    }

    /// Create a new API key. The raw token is part of the result and is not
    /// recoverable afterwards.
    pub async fn create(&self, request: CreateApiKeyRequest) -> Result<CreatedApiKey, DomainError> {
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("API key name cannot be empty"));
        }

        let days = request.expires_in_days.unwrap_or(self.default_expiry_days);
        let minted = self.hasher.mint_async(CredentialKind::ApiKey).await?;

        let record = ApiKeyRecord::new(
            ApiKeyId::generate(),
            request.team_id,
            request.user_id,
            request.name,
            request.scopes,
            minted.stored_hash,
        )
        .with_expiration(Utc::now() + Duration::days(i64::from(days)));

        let created = self.repository.create(record).await?;

        info!(
            api_key_id = %created.id(),
            team_id = %created.team_id(),
            expires_in_days = days,
            "API key created"
        );

        Ok(CreatedApiKey {
            record: created,
            token: minted.raw,
        })
    }

    /// Authenticate a raw token. Any internal failure rejects the token.
    pub async fn validate(&self, token: &str) -> Result<ApiKeyRecord, SecurityError> {
        if !CredentialKind::ApiKey.matches_format(token) {
            self.reject("malformed_token").await;
            return Err(SecurityError::format("API key format invalid"));
        }

        let index_hash = self.hasher.index_hash(token)?;

        match self.cache.get(&index_hash).await {
            Ok(Some(entry)) => {
                let record = entry.record;

                if record.is_revoked() {
                    self.reject("revoked").await;
                    return Err(SecurityError::Revoked);
                }

                if record.is_expired() {
                    self.reject("expired").await;
                    return Err(SecurityError::ExpiredCredential);
                }

                debug!(api_key_id = %record.id(), "API key verified from cache");
                self.touch_last_used(*record.id());
                return Ok(record);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "API key cache unavailable, verifying directly"),
        }

        let candidates = self.repository.list_active().await?;
        let matched = self.scan(token, candidates).await?;

        let Some(scanned) = matched else {
            self.reject("no_match").await;
            return Err(SecurityError::mismatch("API key did not match any active key"));
        };

        if let Err(e) = self.cache.set(&index_hash, &scanned, None).await {
            warn!(api_key_id = %scanned.id(), error = %e, "Failed to cache API key verification");
        }

        let record = self.confirm_current(&scanned).await?;

        debug!(api_key_id = %record.id(), "API key verified");
        self.touch_last_used(*record.id());

        Ok(record.snapshot())
    }

    /// Re-read a freshly cached record. A revoke or update that overlapped
    /// the scan is either visible here or purges the entry afterwards.
    async fn confirm_current(&self, scanned: &ApiKeyRecord) -> Result<ApiKeyRecord, SecurityError> {
        let current = match self.repository.get(scanned.id()).await {
            Ok(current) => current,
            Err(e) => {
                self.purge_after_race(scanned.id()).await?;
                return Err(e.into());
            }
        };

        match current {
            Some(current)
                if current.is_active() && current.updated_at() == scanned.updated_at() =>
            {
                Ok(current)
            }
            Some(current) if current.is_active() => {
                self.purge_after_race(current.id()).await?;
                Ok(current)
            }
            Some(current) => {
                self.purge_after_race(current.id()).await?;
                if current.is_revoked() {
                    self.reject("revoked").await;
                    Err(SecurityError::Revoked)
                } else {
                    self.reject("expired").await;
                    Err(SecurityError::ExpiredCredential)
                }
            }
            None => {
                self.purge_after_race(scanned.id()).await?;
                self.reject("no_match").await;
                Err(SecurityError::mismatch("API key did not match any active key"))
            }
        }
    }

    async fn purge_after_race(&self, id: &ApiKeyId) -> Result<(), SecurityError> {
        let purged = self.cache.invalidate_by_api_key_id(id).await?;
        debug!(api_key_id = %id, purged, "Dropped cached verification for a changed key");
        Ok(())
    }

    /// Adaptive compare against each candidate, off the async workers
    async fn scan(
        &self,
        token: &str,
        candidates: Vec<ApiKeyRecord>,
    ) -> Result<Option<ApiKeyRecord>, SecurityError> {
        let hasher = self.hasher.clone();
        let token = token.to_string();

        tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .find(|record| hasher.verify(CredentialKind::ApiKey, &token, record.stored_hash()))
        })
        .await
        .map_err(|e| SecurityError::internal_store(format!("Verification task failed: {}", e)))
    }

    fn touch_last_used(&self, id: ApiKeyId) {
        let repository = self.repository.clone();

        tokio::spawn(async move {
            if let Err(e) = repository.record_usage(&id, Utc::now()).await {
                warn!(api_key_id = %id, error = %e, "Failed to record API key usage");
            }
        });
    }

    async fn reject(&self, reason: &str) {
        self.events
            .emit(
                SecurityEvent::new(SecurityEventType::TokenValidationFailed, "api_key")
                    .with_detail("reason", reason),
            )
            .await;
    }

    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, DomainError> {
        self.repository.get(id).await
    }

    pub async fn list(&self, team_id: &str) -> Result<Vec<ApiKeyRecord>, DomainError> {
        self.repository.list_by_team(team_id).await
    }

    /// Revoke a key. The call only succeeds once its cache entries are gone.
    pub async fn revoke(&self, id: &ApiKeyId) -> Result<ApiKeyRecord, DomainError> {
        let mut record = self.find(id).await?;

        record.revoke();
        let updated = self.repository.update(&record).await?;

        let purged = self.cache.invalidate_by_api_key_id(id).await?;
        info!(api_key_id = %id, purged, "API key revoked");

        Ok(updated)
    }

    /// Rename or re-scope a key, purging its cached verifications
    pub async fn update(
        &self,
        id: &ApiKeyId,
        request: UpdateApiKeyRequest,
    ) -> Result<ApiKeyRecord, DomainError> {
        let mut record = self.find(id).await?;

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("API key name cannot be empty"));
            }
            record.set_name(name);
        }

        if let Some(scopes) = request.scopes {
            record.set_scopes(scopes);
        }

        let updated = self.repository.update(&record).await?;

        let purged = self.cache.invalidate_by_api_key_id(id).await?;
        info!(api_key_id = %id, purged, "API key updated");

        Ok(updated)
    }

    async fn find(&self, id: &ApiKeyId) -> Result<ApiKeyRecord, DomainError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }

    /// Split requested scope strings into parsed scopes and rejected entries
    pub fn validate_scopes<S: AsRef<str>>(requested: &[S]) -> ScopeValidation {
        let mut result = ScopeValidation::default();

        for raw in requested {
            match raw.as_ref().parse::<Scope>() {
                Ok(scope) if !result.valid.contains(&scope) => result.valid.push(scope),
                Ok(_) => {}
                Err(_) => result.invalid.push(raw.as_ref().to_string()),
            }
        }

        result
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
