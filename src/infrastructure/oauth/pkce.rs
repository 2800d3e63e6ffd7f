//! PKCE verifier checks

use subtle::ConstantTimeEq;

use crate::domain::credential::is_base64url;
use crate::domain::oauth::PkceMethod;
use crate::domain::SecurityError;
use crate::infrastructure::credential::TokenFactory;

pub const MIN_VERIFIER_LEN: usize = 43;
pub const MAX_VERIFIER_LEN: usize = 128;

/// Check a code verifier against the challenge stored at authorization time.
/// Only `S256` is accepted.
pub fn validate_pkce(
    verifier: &str,
    challenge: &str,
    method: PkceMethod,
) -> Result<(), SecurityError> {
    if method != PkceMethod::S256 {
        return Err(SecurityError::format(format!(
            "Code challenge method '{}' is not supported",
            method
        )));
    }

    if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&verifier.len()) {
        return Err(SecurityError::format(format!(
            "Code verifier must be {}-{} characters",
            MIN_VERIFIER_LEN, MAX_VERIFIER_LEN
        )));
    }

    if !is_base64url(verifier) {
        return Err(SecurityError::format("Code verifier contains invalid characters"));
    }

    let computed = TokenFactory::generate_code_challenge(verifier);

    if bool::from(computed.as_bytes().ct_eq(challenge.as_bytes())) {
        Ok(())
    } else {
        Err(SecurityError::mismatch("Code verifier does not match challenge"))
    }
}
