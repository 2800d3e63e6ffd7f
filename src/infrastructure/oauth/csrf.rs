//! CSRF state store
//!
//! One-time state tokens bound to the client and redirect URI of the
//! authorization request that minted them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::domain::credential::{is_base64url, Scope};
use crate::domain::oauth::{OAuthState, PkceChallenge};
use crate::domain::store::{KeyValueStore, KeyValueStoreExt};
use crate::domain::DomainError;
use crate::infrastructure::credential::TokenFactory;

const STATE_PREFIX: &str = "oauth:state:";
const MIN_STATE_LEN: usize = 40;
const MAX_STATE_LEN: usize = 128;

/// Default lifetime of an issued state
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Store for issued authorization state
#[derive(Debug)]
pub struct CsrfStateStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl CsrfStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_STATE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn state_key(token: &str) -> String {
        format!("{}{}", STATE_PREFIX, token)
    }

    /// Cheap shape check done before any store access
    pub fn is_well_formed(token: &str) -> bool {
        (MIN_STATE_LEN..=MAX_STATE_LEN).contains(&token.len()) && is_base64url(token)
    }

    /// Mint and persist a new state
    pub async fn issue(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: Vec<Scope>,
        nonce: Option<String>,
    ) -> Result<OAuthState, DomainError> {
        self.issue_with_pkce(client_id, redirect_uri, scopes, nonce, None)
            .await
    }

    /// Mint a state that also records the request's PKCE challenge
    pub async fn issue_with_pkce(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: Vec<Scope>,
        nonce: Option<String>,
        pkce: Option<PkceChallenge>,
    ) -> Result<OAuthState, DomainError> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            + chrono::Duration::from_std(self.ttl)
                .map_err(|e| DomainError::configuration(format!("Invalid state TTL: {}", e)))?;

        let state = OAuthState {
            token: TokenFactory::generate_state_token(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes,
            nonce,
            pkce,
            issued_at,
            expires_at,
        };

        self.store
            .set(&Self::state_key(&state.token), &state, self.ttl)
            .await?;

        debug!(client_id = %client_id, "Issued authorization state");
        Ok(state)
    }

    /// Look up a live state. Malformed, unknown, and expired tokens all
    /// yield `None`; expired records are removed on the way out.
    pub async fn validate(&self, token: &str) -> Result<Option<OAuthState>, DomainError> {
        if !Self::is_well_formed(token) {
            return Ok(None);
        }

        let key = Self::state_key(token);
        let Some(state) = self.store.get::<OAuthState>(&key).await? else {
            return Ok(None);
        };

        if state.is_expired() {
            self.store.delete(&key).await?;
            debug!("Purged expired authorization state");
            return Ok(None);
        }

        Ok(Some(state))
    }

    /// Delete a state. Only the first of any concurrent consumers sees `true`.
    pub async fn consume(&self, token: &str) -> Result<bool, DomainError> {
        if !Self::is_well_formed(token) {
            return Ok(false);
        }

        self.store.delete(&Self::state_key(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::MockStore;
    use crate::infrastructure::store::InMemoryStore;

    fn store() -> CsrfStateStore {
        CsrfStateStore::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let csrf = store();
        let state = csrf
            .issue("client_1", "https://app.test/cb", vec![Scope::ReadData], Some("n".into()))
            .await
            .unwrap();

        assert_eq!(state.token.len(), 43);
        assert!(state.expires_at > state.issued_at);

        let found = csrf.validate(&state.token).await.unwrap().unwrap();
        assert_eq!(found, state);
    }

    #[tokio::test]
    async fn test_issue_records_pkce_challenge() {
        let csrf = store();
        let challenge = PkceChallenge {
            code_challenge: TokenFactory::generate_code_challenge(
                &TokenFactory::generate_code_verifier(),
            ),
            method: crate::domain::oauth::PkceMethod::S256,
        };

        let state = csrf
            .issue_with_pkce("client_1", "https://app.test/cb", vec![], None, Some(challenge.clone()))
            .await
            .unwrap();

        let found = csrf.validate(&state.token).await.unwrap().unwrap();
        assert_eq!(found.pkce, Some(challenge));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_tokens() {
        let csrf = store();

        assert!(csrf.validate(&"a".repeat(43)).await.unwrap().is_none());
        assert!(csrf.validate("short").await.unwrap().is_none());
        assert!(csrf.validate(&"a/b+".repeat(11)).await.unwrap().is_none());
        assert!(!csrf.consume("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_is_one_time() {
        let csrf = store();
        let state = csrf
            .issue("client_1", "https://app.test/cb", vec![], None)
            .await
            .unwrap();

        assert!(csrf.consume(&state.token).await.unwrap());
        assert!(!csrf.consume(&state.token).await.unwrap());
        assert!(csrf.validate(&state.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_consume_has_one_winner() {
        let csrf = Arc::new(store());
        let state = csrf
            .issue("client_1", "https://app.test/cb", vec![], None)
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let csrf = csrf.clone();
                let token = state.token.clone();
                tokio::spawn(async move { csrf.consume(&token).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_expired_state_is_rejected() {
        let csrf = store().with_ttl(Duration::from_millis(30));
        let state = csrf
            .issue("client_1", "https://app.test/cb", vec![], None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(csrf.validate(&state.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_outliving_store_ttl_is_purged() {
        let backing = Arc::new(InMemoryStore::new());
        let csrf = CsrfStateStore::new(backing.clone());

        let now = Utc::now();
        let token = TokenFactory::generate_state_token();
        let stale = OAuthState {
            token: token.clone(),
            client_id: "client_1".to_string(),
            redirect_uri: "https://app.test/cb".to_string(),
            scopes: vec![],
            nonce: None,
            pkce: None,
            issued_at: now - chrono::Duration::seconds(700),
            expires_at: now - chrono::Duration::seconds(100),
        };
        backing
            .set(&CsrfStateStore::state_key(&token), &stale, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(csrf.validate(&token).await.unwrap().is_none());
        assert!(backing
            .get_raw(&CsrfStateStore::state_key(&token))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let csrf = CsrfStateStore::new(Arc::new(MockStore::failing("down")));
        let token = TokenFactory::generate_state_token();

        assert!(csrf.issue("c", "https://app.test/cb", vec![], None).await.is_err());
        assert!(csrf.validate(&token).await.is_err());
        assert!(csrf.consume(&token).await.is_err());
    }
}
