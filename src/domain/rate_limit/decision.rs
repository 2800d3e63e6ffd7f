//! Rate limit outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SecurityError;

/// Counter state reported back to the client in headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which the window resets
    pub reset_at: i64,
}

/// Which check rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    Identity,
    Global,
    Blocked,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Global => "global",
            Self::Blocked => "blocked",
        }
    }
}

/// Outcome of [`RateLimitGuard::check`](crate::infrastructure::rate_limit::RateLimitGuard::check)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub identity: Option<RateLimitInfo>,
    pub global: Option<RateLimitInfo>,
    pub rejected_by: Option<RateLimitScope>,
    pub retry_after_secs: Option<u64>,
    /// Allowed without enforcement because the store failed
    pub degraded: bool,
}

impl RateLimitDecision {
    pub fn allow(identity: RateLimitInfo, global: RateLimitInfo) -> Self {
        Self {
            allowed: true,
            identity: Some(identity),
            global: Some(global),
            rejected_by: None,
            retry_after_secs: None,
            degraded: false,
        }
    }

    pub fn reject(
        scope: RateLimitScope,
        retry_after_secs: u64,
        identity: Option<RateLimitInfo>,
        global: Option<RateLimitInfo>,
    ) -> Self {
        Self {
            allowed: false,
            identity,
            global,
            rejected_by: Some(scope),
            retry_after_secs: Some(retry_after_secs),
            degraded: false,
        }
    }

    pub fn fail_open() -> Self {
        Self {
            allowed: true,
            identity: None,
            global: None,
            rejected_by: None,
            retry_after_secs: None,
            degraded: true,
        }
    }

    /// The rejection as an error, if the request was not allowed
    pub fn to_error(&self) -> Option<SecurityError> {
        let retry_after_secs = self.retry_after_secs.unwrap_or(0);

        match self.rejected_by? {
            RateLimitScope::Blocked => Some(SecurityError::Blocked { retry_after_secs }),
            RateLimitScope::Identity | RateLimitScope::Global => {
                Some(SecurityError::RateLimitExceeded { retry_after_secs })
            }
        }
    }
}

/// Violations recorded against one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub key: String,
    pub violation_count: u64,
    pub block_expires_at: DateTime<Utc>,
}

impl ViolationRecord {
    pub fn is_blocked(&self, max_violations: u64, now: DateTime<Utc>) -> bool {
        self.violation_count >= max_violations && self.block_expires_at > now
    }

    /// Whole seconds left on the block, rounded up
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.block_expires_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Snapshot of an identity's limiter state for administrative inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub identity: String,
    pub identity_count: u64,
    pub global_count: u64,
    pub violations: Option<ViolationRecord>,
    pub blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_violation_record_blocking() {
        let now = Utc::now();
        let record = ViolationRecord {
            key: "rl:block:user:u".to_string(),
            violation_count: 3,
            block_expires_at: now + Duration::seconds(30),
        };

        assert!(record.is_blocked(3, now));
        assert!(!record.is_blocked(4, now));
        assert!(!record.is_blocked(3, now + Duration::seconds(31)));
        assert_eq!(record.remaining_secs(now), 30);
    }

    #[test]
    fn test_decision_to_error() {
        let info = RateLimitInfo {
            limit: 5,
            remaining: 0,
            reset_at: 0,
        };

        let allowed = RateLimitDecision::allow(info, info);
        assert!(allowed.to_error().is_none());

        let limited = RateLimitDecision::reject(RateLimitScope::Identity, 12, Some(info), None);
        assert!(matches!(
            limited.to_error(),
            Some(SecurityError::RateLimitExceeded { retry_after_secs: 12 })
        ));

        let blocked = RateLimitDecision::reject(RateLimitScope::Blocked, 90, None, None);
        assert!(matches!(
            blocked.to_error(),
            Some(SecurityError::Blocked { retry_after_secs: 90 })
        ));

        assert!(RateLimitDecision::fail_open().allowed);
    }
}
