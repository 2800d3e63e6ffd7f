//! Rate limit presets

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed-window limits plus violation escalation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per identity in one window
    pub user_limit: u64,
    pub user_window_secs: u64,
    /// Requests allowed across all identities in one window
    pub global_limit: u64,
    pub global_window_secs: u64,
    /// Block length added per recorded violation
    pub block_duration_secs: u64,
    /// Violations after which the identity is blocked
    pub max_violations: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_limit: 30,
            user_window_secs: 60,
            global_limit: 1000,
            global_window_secs: 60,
            block_duration_secs: 300,
            max_violations: 5,
        }
    }
}

impl RateLimitConfig {
    /// Strict preset for public, unauthenticated messaging-style endpoints
    pub fn messaging() -> Self {
        Self {
            user_limit: 60,
            user_window_secs: 60,
            global_limit: 2000,
            global_window_secs: 60,
            block_duration_secs: 600,
            max_violations: 3,
        }
    }

    /// Looser preset for authenticated API traffic
    pub fn api() -> Self {
        Self {
            user_limit: 100,
            user_window_secs: 60,
            global_limit: 5000,
            global_window_secs: 60,
            block_duration_secs: 300,
            max_violations: 5,
        }
    }

    pub fn with_user_limit(mut self, limit: u64, window_secs: u64) -> Self {
        self.user_limit = limit;
        self.user_window_secs = window_secs;
        self
    }

    pub fn with_global_limit(mut self, limit: u64, window_secs: u64) -> Self {
        self.global_limit = limit;
        self.global_window_secs = window_secs;
        self
    }

    pub fn with_blocking(mut self, block_duration_secs: u64, max_violations: u64) -> Self {
        self.block_duration_secs = block_duration_secs;
        self.max_violations = max_violations;
        self
    }

    pub fn user_window(&self) -> Duration {
        Duration::from_secs(self.user_window_secs)
    }

    pub fn global_window(&self) -> Duration {
        Duration::from_secs(self.global_window_secs)
    }

    /// Block length after `violations` recorded violations
    pub fn block_duration_for(&self, violations: u64) -> Duration {
        Duration::from_secs(self.block_duration_secs.saturating_mul(violations.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let messaging = RateLimitConfig::messaging();
        assert_eq!(messaging.user_limit, 60);
        assert_eq!(messaging.max_violations, 3);
        assert_eq!(messaging.block_duration_secs, 600);

        let api = RateLimitConfig::api();
        assert_eq!(api.user_limit, 100);
        assert_eq!(api.global_limit, 5000);

        assert!(messaging.user_limit < api.user_limit);
    }

    #[test]
    fn test_block_duration_escalates() {
        let config = RateLimitConfig::default().with_blocking(10, 3);
        assert_eq!(config.block_duration_for(1), Duration::from_secs(10));
        assert_eq!(config.block_duration_for(2), Duration::from_secs(20));
        assert_eq!(config.block_duration_for(3), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: RateLimitConfig = serde_json::from_str(r#"{"user_limit": 5}"#).unwrap();
        assert_eq!(config.user_limit, 5);
        assert_eq!(config.user_window_secs, 60);
        assert_eq!(config.max_violations, 5);
    }
}
