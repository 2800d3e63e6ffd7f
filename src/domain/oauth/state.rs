//! Authorization state and PKCE method

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::credential::Scope;

/// One-time CSRF state bound to the parameters of an authorization request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthState {
    pub token: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Challenge recorded at authorization time, checked at exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce: Option<PkceChallenge>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Server-recorded half of a PKCE pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    pub code_challenge: String,
    pub method: PkceMethod,
}

impl OAuthState {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the state was issued for exactly this client and redirect URI
    pub fn is_bound_to(&self, client_id: &str, redirect_uri: &str) -> bool {
        self.client_id == client_id && self.redirect_uri == redirect_uri
    }
}

/// Incoming `/oauth/authorize` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// PKCE code challenge method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    #[serde(rename = "S256")]
    S256,
    /// Parsed so it can be named in rejections; never accepted
    #[serde(rename = "plain")]
    Plain,
}

impl PkceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(format!("Unknown code challenge method '{}'", other)),
        }
    }
}

impl std::fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state(expires_in: Duration) -> OAuthState {
        let now = Utc::now();
        OAuthState {
            token: "t".repeat(43),
            client_id: "client_1".to_string(),
            redirect_uri: "https://app.test/cb".to_string(),
            scopes: vec![Scope::ReadData],
            nonce: None,
            pkce: None,
            issued_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn test_binding_is_exact() {
        let state = state(Duration::seconds(600));
        assert!(state.is_bound_to("client_1", "https://app.test/cb"));
        assert!(!state.is_bound_to("client_2", "https://app.test/cb"));
        assert!(!state.is_bound_to("client_1", "https://app.test/cb/"));
    }

    #[test]
    fn test_expiry() {
        assert!(!state(Duration::seconds(600)).is_expired());
        assert!(state(Duration::seconds(-1)).is_expired());
    }

    #[test]
    fn test_state_without_pkce_deserializes() {
        let mut json = serde_json::to_value(state(Duration::seconds(600))).unwrap();
        assert!(json.get("pkce").is_none());

        json["pkce"] = serde_json::json!({"code_challenge": "abc", "method": "S256"});
        let parsed: OAuthState = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.pkce.unwrap().method, PkceMethod::S256);
    }

    #[test]
    fn test_pkce_method_parse() {
        assert_eq!("S256".parse::<PkceMethod>().unwrap(), PkceMethod::S256);
        assert_eq!("plain".parse::<PkceMethod>().unwrap(), PkceMethod::Plain);
        assert!("s256".parse::<PkceMethod>().is_err());
    }
}
