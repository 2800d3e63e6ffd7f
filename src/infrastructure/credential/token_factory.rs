//! Token generation
//!
//! Generates prefixed, high-entropy credential strings and the random
//! values used by the authorization flow.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::credential::CredentialKind;

const CODE_VERIFIER_BYTES: usize = 32;
const STATE_TOKEN_BYTES: usize = 32;
const NONCE_BYTES: usize = 16;

/// Generator for credential strings
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenFactory;

impl TokenFactory {
    /// `<prefix><base64url(random bytes)>` for the given kind
    pub fn generate(kind: CredentialKind) -> String {
        format!("{}{}", kind.prefix(), random_base64url(kind.random_bytes()))
    }

    /// PKCE code verifier: 32 random bytes, base64url (43 chars)
    pub fn generate_code_verifier() -> String {
        random_base64url(CODE_VERIFIER_BYTES)
    }

    /// S256 code challenge: base64url(SHA-256(verifier))
    pub fn generate_code_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// CSRF state token: 32 random bytes, base64url
    pub fn generate_state_token() -> String {
        random_base64url(STATE_TOKEN_BYTES)
    }

    /// Hex nonce bound into minted authorization state
    pub fn generate_nonce() -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

fn random_base64url(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::is_base64url;
    use std::collections::HashSet;

    #[test]
    fn test_generate_matches_format_for_every_kind() {
        for kind in CredentialKind::ALL {
            for _ in 0..20 {
                let token = TokenFactory::generate(kind);
                assert!(token.starts_with(kind.prefix()));
                assert!(token.len() >= kind.min_length(), "{kind} too short");
                assert!(kind.matches_format(&token), "{kind} failed format: {token}");
                assert_eq!(CredentialKind::detect(&token), Some(kind));
            }
        }
    }

    #[test]
    fn test_random_part_length_reflects_entropy() {
        let token = TokenFactory::generate(CredentialKind::ClientSecret);
        let random = token.strip_prefix("faw_secret_").unwrap();
        // 48 bytes base64url-encoded without padding
        assert_eq!(random.len(), 64);

        let token = TokenFactory::generate(CredentialKind::AccessToken);
        assert_eq!(token.strip_prefix("faw_access_token_").unwrap().len(), 54);
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..200)
            .map(|_| TokenFactory::generate(CredentialKind::ApiKey))
            .collect();
        assert_eq!(tokens.len(), 200);
    }

    #[test]
    fn test_code_verifier() {
        let verifier = TokenFactory::generate_code_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(is_base64url(&verifier));
    }

    #[test]
    fn test_code_challenge_known_vector() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            TokenFactory::generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_state_and_nonce() {
        let state = TokenFactory::generate_state_token();
        assert_eq!(state.len(), 43);
        assert!(is_base64url(&state));

        let nonce = TokenFactory::generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
