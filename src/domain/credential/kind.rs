//! Credential classes and their token formats

use serde::{Deserialize, Serialize};

/// Minimum number of characters after the prefix of any token
pub const MIN_RANDOM_PART_LEN: usize = 40;

/// The classes of credential this core mints and verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ApiKey,
    ClientId,
    ClientSecret,
    AuthorizationCode,
    AccessToken,
    RefreshToken,
}

impl CredentialKind {
    /// All kinds, longest prefix first so detection never matches a shorter
    /// prefix that happens to share a start.
    pub const ALL: [CredentialKind; 6] = [
        Self::AccessToken,
        Self::RefreshToken,
        Self::ClientSecret,
        Self::ClientId,
        Self::ApiKey,
        Self::AuthorizationCode,
    ];

    /// Fixed wire prefix, separator included
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::ApiKey => "faw_api_",
            Self::ClientId => "faw_client_",
            Self::ClientSecret => "faw_secret_",
            Self::AuthorizationCode => "faw_auth_",
            Self::AccessToken => "faw_access_token_",
            Self::RefreshToken => "faw_refresh_",
        }
    }

    /// Number of random bytes behind the prefix
    pub const fn random_bytes(&self) -> usize {
        match self {
            Self::ApiKey | Self::ClientId | Self::AuthorizationCode => 32,
            Self::AccessToken => 40,
            Self::ClientSecret | Self::RefreshToken => 48,
        }
    }

    /// Whether verification of this kind is deliberately expensive
    pub const fn is_slow_hash(&self) -> bool {
        matches!(self, Self::ApiKey | Self::ClientSecret)
    }

    /// Minimum total token length for this kind
    pub const fn min_length(&self) -> usize {
        self.prefix().len() + MIN_RANDOM_PART_LEN
    }

    /// Find the kind whose prefix starts `token`
    pub fn detect(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| token.starts_with(kind.prefix()))
    }

    /// Cheap structural check: prefix, minimum length, base64url charset
    pub fn matches_format(&self, token: &str) -> bool {
        let Some(random_part) = token.strip_prefix(self.prefix()) else {
            return false;
        };

        token.len() >= self.min_length() && is_base64url(random_part)
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey => write!(f, "api_key"),
            Self::ClientId => write!(f, "client_id"),
            Self::ClientSecret => write!(f, "client_secret"),
            Self::AuthorizationCode => write!(f, "authorization_code"),
            Self::AccessToken => write!(f, "access_token"),
            Self::RefreshToken => write!(f, "refresh_token"),
        }
    }
}

/// Non-empty and entirely within the URL-safe base64 alphabet
pub fn is_base64url(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
