//! Authorization endpoint guard
//!
//! Checks the client and redirect URI of an authorization request, then
//! either mints a fresh CSRF state or verifies the supplied one against the
//! request parameters. A PKCE challenge sent with the request is recorded
//! on the state and enforced when the state is exchanged. Every rejection is reported to the security event
//! sink with the detailed reason; callers only get the generic error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::csrf::CsrfStateStore;
use super::pkce::validate_pkce;
use super::redirect::RedirectUriPolicy;
use crate::domain::credential::{is_base64url, parse_scope_list, Scope};
use crate::domain::oauth::{AuthorizeRequest, ClientRegistry, OAuthState, PkceChallenge, PkceMethod};
use crate::domain::security_event::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::domain::SecurityError;
use crate::infrastructure::credential::TokenFactory;

/// Length of a base64url-encoded SHA-256 challenge
const S256_CHALLENGE_LEN: usize = 43;

/// Accepted authorization request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationGrant {
    pub state: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<PkceMethod>,
    /// Whether the state was minted for this request
    #[serde(skip)]
    pub minted: bool,
}

#[derive(Debug)]
pub struct AuthorizationGuard {
    clients: Arc<dyn ClientRegistry>,
    states: Arc<CsrfStateStore>,
    policy: RedirectUriPolicy,
    events: Arc<dyn SecurityEventSink>,
}

impl AuthorizationGuard {
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        states: Arc<CsrfStateStore>,
        policy: RedirectUriPolicy,
        events: Arc<dyn SecurityEventSink>,
    ) -> Self {
        Self {
            clients,
            states,
            policy,
            events,
        }
    }

    pub fn states(&self) -> &Arc<CsrfStateStore> {
        &self.states
    }

    /// Check an incoming authorization request. `identity` labels the caller
    /// in security events.
    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
        identity: &str,
    ) -> Result<AuthorizationGrant, SecurityError> {
        let client_id = non_empty(request.client_id);
        let redirect_uri = non_empty(request.redirect_uri);

        let (Some(client_id), Some(redirect_uri)) = (client_id, redirect_uri) else {
            self.emit(
                SecurityEventType::MalformedRequest,
                identity,
                [("reason", "missing client_id or redirect_uri")],
            )
            .await;
            return Err(SecurityError::format("client_id and redirect_uri are required"));
        };

        let scopes = match parse_scope_list(request.scope.as_deref().unwrap_or_default()) {
            Ok(scopes) => scopes,
            Err(e) => {
                self.emit(
                    SecurityEventType::MalformedRequest,
                    identity,
                    [("reason", e.to_string().as_str()), ("client_id", client_id.as_str())],
                )
                .await;
                return Err(SecurityError::format(e.to_string()));
            }
        };

        self.check_redirect_uri(&client_id, &redirect_uri, identity)
            .await?;

        let pkce = self
            .parse_pkce(
                non_empty(request.code_challenge),
                non_empty(request.code_challenge_method),
                &client_id,
                identity,
            )
            .await?;
        let code_challenge_method = pkce.as_ref().map(|p| p.method);

        match non_empty(request.state) {
            None => {
                let state = self
                    .states
                    .issue_with_pkce(
                        &client_id,
                        &redirect_uri,
                        scopes.clone(),
                        Some(TokenFactory::generate_nonce()),
                        pkce,
                    )
                    .await?;

                debug!(client_id = %client_id, pkce = code_challenge_method.is_some(), "Minted authorization state");

                Ok(AuthorizationGrant {
                    state: state.token,
                    client_id,
                    redirect_uri,
                    scopes,
                    code_challenge_method,
                    minted: true,
                })
            }
            Some(token) => {
                let state = self.load_bound_state(&token, &client_id, &redirect_uri, identity).await?;

                if pkce.is_some() && state.pkce != pkce {
                    self.emit(
                        SecurityEventType::PkceViolation,
                        identity,
                        [
                            ("reason", "code_challenge differs from the one bound to state"),
                            ("client_id", client_id.as_str()),
                        ],
                    )
                    .await;
                    return Err(SecurityError::mismatch("code_challenge binding mismatch"));
                }

                Ok(AuthorizationGrant {
                    state: state.token,
                    client_id,
                    redirect_uri,
                    scopes,
                    code_challenge_method: state.pkce.map(|p| p.method),
                    minted: false,
                })
            }
        }
    }

    /// Read the optional challenge. `plain`, named or implied by a missing
    /// method, is refused.
    async fn parse_pkce(
        &self,
        challenge: Option<String>,
        method: Option<String>,
        client_id: &str,
        identity: &str,
    ) -> Result<Option<PkceChallenge>, SecurityError> {
        let reason = match (challenge, method) {
            (None, None) => return Ok(None),
            (None, Some(_)) => "code_challenge_method without code_challenge",
            (Some(code_challenge), method) => {
                match method.as_deref().unwrap_or(PkceMethod::Plain.as_str()).parse() {
                    Ok(PkceMethod::S256)
                        if code_challenge.len() == S256_CHALLENGE_LEN
                            && is_base64url(&code_challenge) =>
                    {
                        return Ok(Some(PkceChallenge {
                            code_challenge,
                            method: PkceMethod::S256,
                        }));
                    }
                    Ok(PkceMethod::S256) => "malformed S256 code_challenge",
                    Ok(PkceMethod::Plain) => "plain code_challenge_method is not supported",
                    Err(_) => "unknown code_challenge_method",
                }
            }
        };

        warn!(client_id = %client_id, reason, "Rejected PKCE parameters");
        self.emit(
            SecurityEventType::PkceViolation,
            identity,
            [("reason", reason), ("client_id", client_id)],
        )
        .await;

        Err(SecurityError::format(reason))
    }

    /// Callback leg: validate the state, check its binding and PKCE
    /// verifier, and consume it. A failed verifier burns the state.
    pub async fn exchange_state(
        &self,
        token: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        identity: &str,
    ) -> Result<OAuthState, SecurityError> {
        let state = self
            .load_bound_state(token, client_id, redirect_uri, identity)
            .await?;

        let verified = match (&state.pkce, code_verifier) {
            (None, None) => Ok(()),
            (Some(pkce), Some(verifier)) => {
                validate_pkce(verifier, &pkce.code_challenge, pkce.method)
            }
            (Some(_), None) => Err(SecurityError::format("code_verifier is required")),
            (None, Some(_)) => Err(SecurityError::mismatch(
                "code_verifier sent for a state without a challenge",
            )),
        };

        if let Err(e) = verified {
            self.states.consume(token).await?;
            self.emit(
                SecurityEventType::PkceViolation,
                identity,
                [("reason", e.to_string().as_str()), ("client_id", client_id)],
            )
            .await;
            return Err(e);
        }

        if !self.states.consume(token).await? {
            self.emit(
                SecurityEventType::InvalidState,
                identity,
                [("reason", "state already consumed"), ("client_id", client_id)],
            )
            .await;
            return Err(SecurityError::ExpiredState);
        }

        Ok(state)
    }

    async fn check_redirect_uri(
        &self,
        client_id: &str,
        redirect_uri: &str,
        identity: &str,
    ) -> Result<(), SecurityError> {
        let registered = self.clients.redirect_uris(client_id).await?;

        let reason = match registered {
            None => "unknown client",
            Some(uris) if !self.policy.is_allowed(redirect_uri, &uris) => {
                "redirect_uri not registered or not permitted"
            }
            Some(_) => return Ok(()),
        };

        warn!(client_id = %client_id, reason, "Rejected authorization redirect URI");
        self.emit(
            SecurityEventType::RedirectUriMismatch,
            identity,
            [
                ("reason", reason),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
            ],
        )
        .await;

        Err(SecurityError::mismatch(reason))
    }

    async fn load_bound_state(
        &self,
        token: &str,
        client_id: &str,
        redirect_uri: &str,
        identity: &str,
    ) -> Result<OAuthState, SecurityError> {
        let Some(state) = self.states.validate(token).await? else {
            self.emit(
                SecurityEventType::InvalidState,
                identity,
                [("reason", "state unknown or expired"), ("client_id", client_id)],
            )
            .await;
            return Err(SecurityError::ExpiredState);
        };

        if !state.is_bound_to(client_id, redirect_uri) {
            self.emit(
                SecurityEventType::CsrfViolation,
                identity,
                [
                    ("reason", "state bound to different client or redirect_uri"),
                    ("client_id", client_id),
                    ("redirect_uri", redirect_uri),
                ],
            )
            .await;
            return Err(SecurityError::mismatch("state binding mismatch"));
        }

        Ok(state)
    }

    async fn emit<const N: usize>(
        &self,
        event_type: SecurityEventType,
        identity: &str,
        details: [(&str, &str); N],
    ) {
        let event = details
            .into_iter()
            .fold(SecurityEvent::new(event_type, identity), |event, (key, value)| {
                event.with_detail(key, value)
            });

        self.events.emit(event).await;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
