//! Credential generation and hashing

mod hasher;
mod token_factory;

pub use hasher::{CredentialHasher, MintedCredential, MIN_PBKDF2_ITERATIONS};
pub use token_factory::TokenFactory;
