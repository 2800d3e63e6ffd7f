//! OAuth authorization-flow domain

mod client;
mod state;

pub use client::ClientRegistry;
pub use state::{AuthorizeRequest, OAuthState, PkceChallenge, PkceMethod};
