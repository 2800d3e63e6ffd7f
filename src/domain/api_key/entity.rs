//! API key record and identifier

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::credential::Scope;

/// API key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ApiKeyId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ApiKeyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted API key. The raw token is never part of the record; only its
/// adaptive hash is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    id: ApiKeyId,
    team_id: String,
    user_id: String,
    name: String,
    scopes: BTreeSet<Scope>,
    /// Adaptive hash of the peppered token. Empty in cache snapshots.
    #[serde(default)]
    stored_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    revoked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    pub fn new(
        id: ApiKeyId,
        team_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        scopes: impl IntoIterator<Item = Scope>,
        stored_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            team_id: team_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            scopes: scopes.into_iter().collect(),
            stored_hash: stored_hash.into(),
            last_used_at: None,
            expires_at: None,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set expiration
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scopes(&self) -> &BTreeSet<Scope> {
        &self.scopes
    }

    pub fn stored_hash(&self) -> &str {
        &self.stored_hash
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutations

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Utc::now();
    }

    pub fn set_scopes(&mut self, scopes: impl IntoIterator<Item = Scope>) {
        self.scopes = scopes.into_iter().collect();
        self.updated_at = Utc::now();
    }

    pub fn revoke(&mut self) {
        self.revoked = true;
        self.updated_at = Utc::now();
    }

    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.last_used_at = Some(at);
    }

    // Checks

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Not revoked and not expired
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired()
    }

    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// Copy of the record with the stored hash stripped, for caching
    pub fn snapshot(&self) -> Self {
        Self {
            stored_hash: String::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> ApiKeyRecord {
        ApiKeyRecord::new(
            ApiKeyId::generate(),
            "team-1",
            "user-1",
            "CI key",
            [Scope::ReadData, Scope::ReadData, Scope::WriteData],
            "$2b$12$hash",
        )
    }

    #[test]
    fn test_new_record_is_active() {
        let record = record();
        assert!(record.is_active());
        assert!(!record.is_revoked());
        assert_eq!(record.scopes().len(), 2);
        assert!(record.has_scope(&Scope::WriteData));
        assert!(!record.has_scope(&Scope::AdminSystem));
    }

    #[test]
    fn test_expiry() {
        let past = record().with_expiration(Utc::now() - Duration::seconds(1));
        assert!(past.is_expired());
        assert!(!past.is_active());

        let future = record().with_expiration(Utc::now() + Duration::days(1));
        assert!(!future.is_expired());
    }

    #[test]
    fn test_revoke() {
        let mut record = record();
        let before = record.updated_at();
        record.revoke();
        assert!(record.is_revoked());
        assert!(!record.is_active());
        assert!(record.updated_at() >= before);
    }

    #[test]
    fn test_snapshot_strips_hash() {
        let record = record();
        let snapshot = record.snapshot();
        assert!(snapshot.stored_hash().is_empty());
        assert_eq!(snapshot.id(), record.id());

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("$2b$"));
    }

    #[test]
    fn test_id_parse() {
        let id = ApiKeyId::generate();
        let parsed: ApiKeyId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ApiKeyId>().is_err());
    }
}
