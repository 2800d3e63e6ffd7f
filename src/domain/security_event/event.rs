//! Security event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of security-relevant occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    RateLimitExceeded,
    ClientBlocked,
    CsrfViolation,
    InvalidState,
    RedirectUriMismatch,
    PkceViolation,
    MalformedRequest,
    TokenValidationFailed,
    StoreDegraded,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ClientBlocked => "client_blocked",
            Self::CsrfViolation => "csrf_violation",
            Self::InvalidState => "invalid_state",
            Self::RedirectUriMismatch => "redirect_uri_mismatch",
            Self::PkceViolation => "pkce_violation",
            Self::MalformedRequest => "malformed_request",
            Self::TokenValidationFailed => "token_validation_failed",
            Self::StoreDegraded => "store_degraded",
        }
    }

    /// Severity used when the emitter does not override it
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::MalformedRequest | Self::InvalidState => Severity::Low,
            Self::RateLimitExceeded | Self::TokenValidationFailed => Severity::Medium,
            Self::ClientBlocked
            | Self::RedirectUriMismatch
            | Self::PkceViolation
            | Self::StoreDegraded => Severity::High,
            Self::CsrfViolation => Severity::Critical,
        }
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Structured security event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub severity: Severity,
    /// Identity label (`user:<id>`, `origin:<ip>`, `client:<id>`)
    pub identity: String,
    pub timestamp: DateTime<Utc>,
    pub details: Map<String, Value>,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, identity: impl Into<String>) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            identity: identity.into(),
            timestamp: Utc::now(),
            details: Map::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = SecurityEvent::new(SecurityEventType::CsrfViolation, "client:c1")
            .with_detail("reason", "redirect_uri differs")
            .with_detail("attempt", 2);

        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.details["reason"], "redirect_uri differs");
        assert_eq!(event.details["attempt"], 2);
    }

    #[test]
    fn test_wire_shape() {
        let event = SecurityEvent::new(SecurityEventType::RateLimitExceeded, "origin:1.2.3.4")
            .with_severity(Severity::High);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "rate_limit_exceeded");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["identity"], "origin:1.2.3.4");
        assert!(json["timestamp"].is_string());
        assert!(json["details"].is_object());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
