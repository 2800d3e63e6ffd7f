//! Per-kind credential hashing and verification

use std::num::NonZeroU32;
use std::sync::Arc;

use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::token_factory::TokenFactory;
use crate::domain::credential::CredentialKind;
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Lowest accepted PBKDF2 iteration count
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;
const DEFAULT_PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(MIN_PBKDF2_ITERATIONS) {
    Some(iterations) => iterations,
    None => panic!("iteration floor must be non-zero"),
};
const DEFAULT_BCRYPT_COST: u32 = 12;
const PBKDF2_SALT_LEN: usize = 32;
const PBKDF2_KEY_LEN: usize = 64;
const PBKDF2_PREFIX: &str = "$pbkdf2-sha256$";

/// A freshly minted credential. `raw` goes to the caller once and is
/// never stored.
#[derive(Debug, Clone)]
pub struct MintedCredential {
    pub kind: CredentialKind,
    pub raw: String,
    pub stored_hash: String,
}

/// Hashes and verifies credentials with the algorithm suited to each kind:
/// bcrypt for API keys, PBKDF2 for client secrets, peppered SHA-256 for
/// high-entropy lookup tokens.
#[derive(Clone)]
pub struct CredentialHasher {
    pepper: Arc<SecretString>,
    bcrypt_cost: u32,
    pbkdf2_iterations: NonZeroU32,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("pepper", &"[REDACTED]")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .finish()
    }
}

impl CredentialHasher {
    pub fn new(pepper: SecretString) -> Self {
        Self {
            pepper: Arc::new(pepper),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }

    /// Set the bcrypt cost factor (clamped to bcrypt's 4..=31)
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost.clamp(4, 31);
        self
    }

    /// Set the PBKDF2 iteration count; values below the floor are raised to it
    pub fn with_pbkdf2_iterations(mut self, iterations: u32) -> Self {
        let iterations = iterations.max(MIN_PBKDF2_ITERATIONS);
        self.pbkdf2_iterations = NonZeroU32::new(iterations).unwrap_or(self.pbkdf2_iterations);
        self
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub fn pbkdf2_iterations(&self) -> u32 {
        self.pbkdf2_iterations.get()
    }

    /// Hash a raw credential for storage
    pub fn hash(&self, kind: CredentialKind, raw: &str) -> Result<String, DomainError> {
        if !kind.matches_format(raw) {
            return Err(DomainError::validation(format!("Malformed {} credential", kind)));
        }

        match kind {
            CredentialKind::ApiKey => self.hash_bcrypt(raw),
            CredentialKind::ClientSecret => Ok(self.hash_pbkdf2(raw)),
            CredentialKind::ClientId
            | CredentialKind::AuthorizationCode
            | CredentialKind::AccessToken
            | CredentialKind::RefreshToken => Ok(self.fast_hash(raw)),
        }
    }

    /// Verify a raw credential against its stored hash. Format mismatches
    /// are rejected before any hashing; internal errors count as a mismatch.
    pub fn verify(&self, kind: CredentialKind, raw: &str, stored_hash: &str) -> bool {
        if !kind.matches_format(raw) {
            debug!(kind = %kind, "Credential rejected on format");
            return false;
        }

        match kind {
            CredentialKind::ApiKey => self.verify_bcrypt(raw, stored_hash),
            CredentialKind::ClientSecret => self.verify_pbkdf2(raw, stored_hash),
            CredentialKind::ClientId
            | CredentialKind::AuthorizationCode
            | CredentialKind::AccessToken
            | CredentialKind::RefreshToken => {
                let computed = self.fast_hash(raw);
                computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
            }
        }
    }

    /// [`hash`](Self::hash) with slow kinds moved onto the blocking pool
    pub async fn hash_async(&self, kind: CredentialKind, raw: String) -> Result<String, DomainError> {
        if !kind.is_slow_hash() {
            return self.hash(kind, &raw);
        }

        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(kind, &raw))
            .await
            .map_err(|e| DomainError::hashing(format!("Hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) with slow kinds moved onto the blocking pool
    pub async fn verify_async(&self, kind: CredentialKind, raw: String, stored_hash: String) -> bool {
        if !kind.is_slow_hash() {
            return self.verify(kind, &raw, &stored_hash);
        }

        let hasher = self.clone();
        match tokio::task::spawn_blocking(move || hasher.verify(kind, &raw, &stored_hash)).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Verification task failed");
                false
            }
        }
    }

    /// Generate a new credential and hash it
    pub fn mint(&self, kind: CredentialKind) -> Result<MintedCredential, DomainError> {
        let raw = TokenFactory::generate(kind);
        let stored_hash = self.hash(kind, &raw)?;

        Ok(MintedCredential {
            kind,
            raw,
            stored_hash,
        })
    }

    pub async fn mint_async(&self, kind: CredentialKind) -> Result<MintedCredential, DomainError> {
        let raw = TokenFactory::generate(kind);
        let stored_hash = self.hash_async(kind, raw.clone()).await?;

        Ok(MintedCredential {
            kind,
            raw,
            stored_hash,
        })
    }

    /// Hex SHA-256 of the peppered token
    pub fn fast_hash(&self, raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        hasher.update(b":");
        hasher.update(self.pepper.expose_secret().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Keyed hash of the token used only to index the verification cache.
    /// Domain-separated from every stored hash.
    pub fn index_hash(&self, raw: &str) -> Result<String, DomainError> {
        let mut mac = self.mac()?;
        mac.update(b"cache_index:");
        mac.update(raw.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256, DomainError> {
        HmacSha256::new_from_slice(self.pepper.expose_secret().as_bytes())
            .map_err(|e| DomainError::hashing(format!("Invalid pepper: {}", e)))
    }

    /// bcrypt reads at most 72 bytes, so the peppered key is condensed first
    fn bcrypt_input(&self, raw: &str) -> Result<String, DomainError> {
        let mut mac = self.mac()?;
        mac.update(raw.as_bytes());
        mac.update(b":");
        mac.update(self.pepper.expose_secret().as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    fn hash_bcrypt(&self, raw: &str) -> Result<String, DomainError> {
        bcrypt::hash(self.bcrypt_input(raw)?, self.bcrypt_cost)
            .map_err(|e| DomainError::hashing(format!("bcrypt hashing failed: {}", e)))
    }

    fn verify_bcrypt(&self, raw: &str, stored_hash: &str) -> bool {
        let input = match self.bcrypt_input(raw) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "Could not prepare bcrypt input");
                return false;
            }
        };

        match bcrypt::verify(input, stored_hash) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "Stored bcrypt hash unusable");
                false
            }
        }
    }

    fn pbkdf2_input(&self, raw: &str) -> String {
        format!("{}:{}", raw, self.pepper.expose_secret())
    }

    fn hash_pbkdf2(&self, raw: &str) -> String {
        let mut salt = [0u8; PBKDF2_SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut derived_key = [0u8; PBKDF2_KEY_LEN];
        ring::pbkdf2::derive(
            ring::pbkdf2::PBKDF2_HMAC_SHA256,
            self.pbkdf2_iterations,
            &salt,
            self.pbkdf2_input(raw).as_bytes(),
            &mut derived_key,
        );

        format!(
            "{}i={}${}${}",
            PBKDF2_PREFIX,
            self.pbkdf2_iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(derived_key)
        )
    }

    fn verify_pbkdf2(&self, raw: &str, stored_hash: &str) -> bool {
        let Some((iterations, salt, stored_key)) = parse_pbkdf2(stored_hash) else {
            debug!("Stored PBKDF2 hash unusable");
            return false;
        };

        let mut derived_key = vec![0u8; stored_key.len()];
        ring::pbkdf2::derive(
            ring::pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            self.pbkdf2_input(raw).as_bytes(),
            &mut derived_key,
        );

        derived_key[..].ct_eq(&stored_key[..]).into()
    }
}

/// Parse `$pbkdf2-sha256$i=<n>$<salt>$<key>`
fn parse_pbkdf2(stored_hash: &str) -> Option<(NonZeroU32, Vec<u8>, Vec<u8>)> {
    let rest = stored_hash.strip_prefix(PBKDF2_PREFIX)?;
    let mut parts = rest.split('$');

    let iterations = parts.next()?.strip_prefix("i=")?.parse::<u32>().ok()?;
    let salt = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    let key = STANDARD_NO_PAD.decode(parts.next()?).ok()?;

    if parts.next().is_some() || key.is_empty() {
        return None;
    }

    Some((NonZeroU32::new(iterations)?, salt, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(SecretString::from("test-pepper-0123456789abcdef".to_string()))
            .with_bcrypt_cost(4)
    }

    #[test]
    fn test_round_trip_every_kind() {
        let hasher = hasher();

        for kind in CredentialKind::ALL {
            let minted = hasher.mint(kind).unwrap();
            assert!(hasher.verify(kind, &minted.raw, &minted.stored_hash), "{kind}");
            assert!(!minted.stored_hash.contains(&minted.raw));
        }
    }

    #[test]
    fn test_distinct_tokens_do_not_verify() {
        let hasher = hasher();

        for kind in CredentialKind::ALL {
            let first = hasher.mint(kind).unwrap();
            let second = TokenFactory::generate(kind);
            assert!(!hasher.verify(kind, &second, &first.stored_hash), "{kind}");
        }
    }

    #[test]
    fn test_format_rejected_before_hashing() {
        let hasher = hasher();
        let minted = hasher.mint(CredentialKind::AccessToken).unwrap();

        // Relabeled token no longer matches its hash
        let relabeled = minted.raw.replacen("faw_access_token_", "faw_refresh_", 1);
        assert!(!hasher.verify(CredentialKind::RefreshToken, &relabeled, &minted.stored_hash));

        assert!(hasher.hash(CredentialKind::ApiKey, "faw_api_short").is_err());
        assert!(!hasher.verify(CredentialKind::ApiKey, "not-a-key", "$2b$04$whatever"));
    }

    #[test]
    fn test_api_key_uses_bcrypt() {
        let hasher = hasher();
        let minted = hasher.mint(CredentialKind::ApiKey).unwrap();
        assert!(minted.stored_hash.starts_with("$2b$04$"));
    }

    #[test]
    fn test_client_secret_encoding() {
        let hasher = hasher();
        let minted = hasher.mint(CredentialKind::ClientSecret).unwrap();

        assert!(minted.stored_hash.starts_with("$pbkdf2-sha256$i=100000$"));

        let (iterations, salt, key) = parse_pbkdf2(&minted.stored_hash).unwrap();
        assert_eq!(iterations.get(), 100_000);
        assert_eq!(salt.len(), 32);
        assert_eq!(key.len(), 64);

        // Random salt per record
        let again = hasher.hash(CredentialKind::ClientSecret, &minted.raw).unwrap();
        assert_ne!(again, minted.stored_hash);
        assert!(hasher.verify(CredentialKind::ClientSecret, &minted.raw, &again));
    }

    #[test]
    fn test_pbkdf2_iteration_floor() {
        let hasher = hasher().with_pbkdf2_iterations(10);
        assert_eq!(hasher.pbkdf2_iterations(), MIN_PBKDF2_ITERATIONS);

        let hasher = hasher.with_pbkdf2_iterations(150_000);
        assert_eq!(hasher.pbkdf2_iterations(), 150_000);
    }

    #[test]
    fn test_corrupt_stored_hashes_fail_closed() {
        let hasher = hasher();
        let raw = TokenFactory::generate(CredentialKind::ClientSecret);

        assert!(!hasher.verify(CredentialKind::ClientSecret, &raw, "$pbkdf2-sha256$i=0$AA$AA"));
        assert!(!hasher.verify(CredentialKind::ClientSecret, &raw, "garbage"));

        let api_key = TokenFactory::generate(CredentialKind::ApiKey);
        assert!(!hasher.verify(CredentialKind::ApiKey, &api_key, "garbage"));
    }

    #[test]
    fn test_pepper_changes_hash() {
        let other = CredentialHasher::new(SecretString::from("another-pepper".to_string()));
        let hasher = hasher();
        let minted = hasher.mint(CredentialKind::RefreshToken).unwrap();

        assert!(!other.verify(CredentialKind::RefreshToken, &minted.raw, &minted.stored_hash));
    }

    #[test]
    fn test_index_hash_is_distinct_from_fast_hash() {
        let hasher = hasher();
        let raw = TokenFactory::generate(CredentialKind::ApiKey);

        let index = hasher.index_hash(&raw).unwrap();
        assert_eq!(index, hasher.index_hash(&raw).unwrap());
        assert_ne!(index, hasher.fast_hash(&raw));
        assert_eq!(index.len(), 64);
    }

    #[test]
    fn test_debug_redacts_pepper() {
        let rendered = format!("{:?}", hasher());
        assert!(!rendered.contains("test-pepper"));
        assert!(rendered.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hasher = hasher();

        let minted = hasher.mint_async(CredentialKind::ApiKey).await.unwrap();
        assert!(
            hasher
                .verify_async(CredentialKind::ApiKey, minted.raw.clone(), minted.stored_hash.clone())
                .await
        );

        let raw = TokenFactory::generate(CredentialKind::AccessToken);
        let stored = hasher
            .hash_async(CredentialKind::AccessToken, raw.clone())
            .await
            .unwrap();
        assert!(hasher.verify_async(CredentialKind::AccessToken, raw, stored).await);
    }
}
