//! Rate limiter and abuse guard
//!
//! Fixed-window counters per identity and globally, with escalating blocks
//! for repeat offenders. Storage failures let the request through.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::violations::ViolationTracker;
use crate::domain::rate_limit::{
    RateLimitConfig, RateLimitDecision, RateLimitInfo, RateLimitScope, RateLimitStatus,
    RequestIdentity,
};
use crate::domain::security_event::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::domain::store::{KeyValueStore, KeyValueStoreExt};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_fail_open, record_rate_limit_rejection};

/// Namespace used when none is set
pub const DEFAULT_NAMESPACE: &str = "default";

/// Counters, global window and blocks are keyed under the guard's
/// namespace, so guards sharing a store never share state.
#[derive(Debug)]
pub struct RateLimitGuard {
    store: Arc<dyn KeyValueStore>,
    violations: ViolationTracker,
    config: RateLimitConfig,
    events: Arc<dyn SecurityEventSink>,
    namespace: String,
}

impl RateLimitGuard {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: RateLimitConfig,
        events: Arc<dyn SecurityEventSink>,
    ) -> Self {
        Self {
            violations: ViolationTracker::new(store.clone()),
            store,
            config,
            events,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Evaluate one request. Never fails: a store error yields a degraded
    /// allow.
    pub async fn check(&self, identity: &RequestIdentity) -> RateLimitDecision {
        match self.evaluate(identity).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    identity = %identity,
                    namespace = %self.namespace,
                    error = %e,
                    "Rate limiter store failed, allowing request"
                );
                record_fail_open();
                self.events
                    .emit(
                        SecurityEvent::new(SecurityEventType::StoreDegraded, identity.label())
                            .with_detail("component", "rate_limiter")
                            .with_detail("namespace", self.namespace.as_str())
                            .with_detail("error", e.to_string()),
                    )
                    .await;
                RateLimitDecision::fail_open()
            }
        }
    }

    async fn evaluate(&self, identity: &RequestIdentity) -> Result<RateLimitDecision, DomainError> {
        if let Some(retry_after) = self.blocked_for(identity).await? {
            record_rate_limit_rejection(RateLimitScope::Blocked);
            self.emit_rejection(identity, RateLimitScope::Blocked, retry_after)
                .await;
            return Ok(RateLimitDecision::reject(
                RateLimitScope::Blocked,
                retry_after,
                None,
                None,
            ));
        }

        let now = Utc::now().timestamp();

        let counter = self
            .store
            .increment(&identity.counter_key(&self.namespace), self.config.user_window())
            .await?;
        let identity_info = info_for(self.config.user_limit, counter.count, counter.reset_after, now);

        if counter.count > self.config.user_limit {
            let retry_after = retry_secs(counter.reset_after, self.config.user_window_secs);
            self.violation(identity, &identity.block_key(&self.namespace))
                .await?;

            record_rate_limit_rejection(RateLimitScope::Identity);
            self.emit_rejection(identity, RateLimitScope::Identity, retry_after)
                .await;

            return Ok(RateLimitDecision::reject(
                RateLimitScope::Identity,
                retry_after,
                Some(identity_info),
                None,
            ));
        }

        let global = self
            .store
            .increment(
                &RequestIdentity::global_key(&self.namespace),
                self.config.global_window(),
            )
            .await?;
        let global_info = info_for(self.config.global_limit, global.count, global.reset_after, now);

        if global.count > self.config.global_limit {
            let retry_after = retry_secs(global.reset_after, self.config.global_window_secs);
            self.violation(identity, &identity.origin_block_key(&self.namespace))
                .await?;

            record_rate_limit_rejection(RateLimitScope::Global);
            self.emit_rejection(identity, RateLimitScope::Global, retry_after)
                .await;

            return Ok(RateLimitDecision::reject(
                RateLimitScope::Global,
                retry_after,
                Some(identity_info),
                Some(global_info),
            ));
        }

        Ok(RateLimitDecision::allow(identity_info, global_info))
    }

    /// Seconds left on the longest active block for the identity or its origin
    async fn blocked_for(&self, identity: &RequestIdentity) -> Result<Option<u64>, DomainError> {
        let now = Utc::now();
        let mut keys = vec![identity.block_key(&self.namespace)];
        let origin_key = identity.origin_block_key(&self.namespace);
        if !keys.contains(&origin_key) {
            keys.push(origin_key);
        }

        let mut longest: Option<u64> = None;
        for key in keys {
            if let Some(record) = self.violations.active_block(&key, &self.config, now).await? {
                let remaining = record.remaining_secs(now).max(1);
                longest = Some(longest.map_or(remaining, |l| l.max(remaining)));
            }
        }

        Ok(longest)
    }

    async fn violation(&self, identity: &RequestIdentity, key: &str) -> Result<(), DomainError> {
        let record = self.violations.record(key, &self.config).await?;

        if record.violation_count == self.config.max_violations {
            info!(
                identity = %identity,
                key = %key,
                violations = record.violation_count,
                "Client blocked after repeated rate limit violations"
            );
            self.events
                .emit(
                    SecurityEvent::new(SecurityEventType::ClientBlocked, identity.label())
                        .with_detail("key", key)
                        .with_detail("namespace", self.namespace.as_str())
                        .with_detail("violations", record.violation_count)
                        .with_detail("block_expires_at", record.block_expires_at.to_rfc3339()),
                )
                .await;
        }

        Ok(())
    }

    async fn emit_rejection(&self, identity: &RequestIdentity, scope: RateLimitScope, retry_after: u64) {
        self.events
            .emit(
                SecurityEvent::new(SecurityEventType::RateLimitExceeded, identity.label())
                    .with_detail("scope", scope.as_str())
                    .with_detail("namespace", self.namespace.as_str())
                    .with_detail("retry_after_secs", retry_after),
            )
            .await;
    }

    /// Whether the identity or its origin is currently blocked
    pub async fn is_blocked(&self, identity: &RequestIdentity) -> Result<bool, DomainError> {
        Ok(self.blocked_for(identity).await?.is_some())
    }

    /// Record a violation outside the counters, e.g. for abuse spotted elsewhere
    pub async fn record_violation(&self, identity: &RequestIdentity) -> Result<(), DomainError> {
        self.violation(identity, &identity.block_key(&self.namespace))
            .await
    }

    pub async fn status(&self, identity: &RequestIdentity) -> Result<RateLimitStatus, DomainError> {
        let now = Utc::now();
        let identity_count = self
            .store
            .get_counter(&identity.counter_key(&self.namespace))
            .await?
            .unwrap_or(0);
        let global_count = self
            .store
            .get_counter(&RequestIdentity::global_key(&self.namespace))
            .await?
            .unwrap_or(0);
        let violations = self
            .violations
            .get(&identity.block_key(&self.namespace))
            .await?;
        let blocked = self.is_blocked(identity).await?;

        Ok(RateLimitStatus {
            identity: identity.label(),
            identity_count,
            global_count,
            violations: violations.filter(|v| v.block_expires_at > now),
            blocked,
        })
    }

    /// Clear counters and blocks for an identity
    pub async fn reset(&self, identity: &RequestIdentity) -> Result<(), DomainError> {
        self.store
            .delete(&identity.counter_key(&self.namespace))
            .await?;
        self.violations
            .clear(&identity.block_key(&self.namespace))
            .await?;
        self.violations
            .clear(&identity.origin_block_key(&self.namespace))
            .await?;

        info!(identity = %identity, namespace = %self.namespace, "Rate limit state reset");
        Ok(())
    }
}

fn info_for(limit: u64, count: u64, reset_after: Duration, now: i64) -> RateLimitInfo {
    RateLimitInfo {
        limit,
        remaining: limit.saturating_sub(count),
        reset_at: now + reset_after.as_secs_f64().ceil() as i64,
    }
}

/// Whole seconds until the window resets, within `1..=window_secs`
fn retry_secs(reset_after: Duration, window_secs: u64) -> u64 {
    let secs = (reset_after.as_millis() as u64).div_ceil(1000);
    secs.clamp(1, window_secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::MockStore;
    use crate::domain::SecurityError;
    use crate::infrastructure::security_event::InMemoryEventSink;
    use crate::infrastructure::store::InMemoryStore;

    fn guard(config: RateLimitConfig) -> (RateLimitGuard, Arc<InMemoryEventSink>) {
        let events = Arc::new(InMemoryEventSink::new());
        let guard = RateLimitGuard::new(Arc::new(InMemoryStore::new()), config, events.clone());
        (guard, events)
    }

    #[tokio::test]
    async fn test_identity_limit() {
        let (guard, events) = guard(RateLimitConfig::default().with_user_limit(5, 60));
        let identity = RequestIdentity::authenticated("u1", "10.0.0.1");

        for i in 0..5 {
            let decision = guard.check(&identity).await;
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.identity.unwrap().remaining, 4 - i);
        }

        let sixth = guard.check(&identity).await;
        assert!(!sixth.allowed);
        assert_eq!(sixth.rejected_by, Some(RateLimitScope::Identity));
        let retry = sixth.retry_after_secs.unwrap();
        assert!((1..=60).contains(&retry));
        assert!(matches!(
            sixth.to_error(),
            Some(SecurityError::RateLimitExceeded { .. })
        ));

        assert_eq!(events.count(SecurityEventType::RateLimitExceeded).await, 1);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let (guard, _) = guard(RateLimitConfig::default().with_user_limit(5, 1));
        let identity = RequestIdentity::anonymous("10.0.0.2");

        for _ in 0..5 {
            assert!(guard.check(&identity).await.allowed);
        }
        assert!(!guard.check(&identity).await.allowed);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let decision = guard.check(&identity).await;
        assert!(decision.allowed);
        assert_eq!(decision.identity.unwrap().remaining, 4);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let (guard, _) = guard(RateLimitConfig::default().with_user_limit(1, 60));

        let a = RequestIdentity::authenticated("a", "10.0.0.1");
        let b = RequestIdentity::authenticated("b", "10.0.0.1");

        assert!(guard.check(&a).await.allowed);
        assert!(!guard.check(&a).await.allowed);
        assert!(guard.check(&b).await.allowed);
    }

    #[tokio::test]
    async fn test_global_limit_blocks_origin() {
        let config = RateLimitConfig::default()
            .with_user_limit(100, 60)
            .with_global_limit(2, 60)
            .with_blocking(60, 1);
        let (guard, _) = guard(config);

        let a = RequestIdentity::authenticated("a", "10.0.0.1");
        let b = RequestIdentity::authenticated("b", "10.0.0.9");

        assert!(guard.check(&a).await.allowed);
        assert!(guard.check(&a).await.allowed);

        let rejected = guard.check(&b).await;
        assert_eq!(rejected.rejected_by, Some(RateLimitScope::Global));
        assert!(rejected.global.is_some());

        // Origin of b is now blocked regardless of user
        let c = RequestIdentity::authenticated("c", "10.0.0.9");
        assert!(guard.is_blocked(&c).await.unwrap());
        assert!(!guard.is_blocked(&a).await.unwrap());
    }

    #[tokio::test]
    async fn test_block_after_max_violations() {
        let config = RateLimitConfig::default()
            .with_user_limit(1, 60)
            .with_blocking(1, 3);
        let (guard, events) = guard(config);
        let identity = RequestIdentity::authenticated("u1", "10.0.0.3");

        assert!(guard.check(&identity).await.allowed);

        for _ in 0..3 {
            let decision = guard.check(&identity).await;
            assert_eq!(decision.rejected_by, Some(RateLimitScope::Identity));
        }

        assert!(guard.is_blocked(&identity).await.unwrap());
        assert_eq!(events.count(SecurityEventType::ClientBlocked).await, 1);

        let blocked = guard.check(&identity).await;
        assert_eq!(blocked.rejected_by, Some(RateLimitScope::Blocked));
        assert!(blocked.retry_after_secs.unwrap() <= 3);
        assert!(matches!(blocked.to_error(), Some(SecurityError::Blocked { .. })));

        // Third violation holds the block for 3 * 1s
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(!guard.is_blocked(&identity).await.unwrap());
    }

    #[tokio::test]
    async fn test_blocked_is_checked_before_counters() {
        let config = RateLimitConfig::default().with_blocking(60, 1);
        let (guard, _) = guard(config);
        let identity = RequestIdentity::authenticated("u1", "10.0.0.4");

        guard.record_violation(&identity).await.unwrap();

        let decision = guard.check(&identity).await;
        assert_eq!(decision.rejected_by, Some(RateLimitScope::Blocked));

        let status = guard.status(&identity).await.unwrap();
        assert_eq!(status.identity_count, 0);
        assert!(status.blocked);
    }

    #[tokio::test]
    async fn test_status_and_reset() {
        let config = RateLimitConfig::default().with_user_limit(1, 60).with_blocking(60, 1);
        let (guard, _) = guard(config);
        let identity = RequestIdentity::authenticated("u1", "10.0.0.5");

        guard.check(&identity).await;
        guard.check(&identity).await;

        let status = guard.status(&identity).await.unwrap();
        assert_eq!(status.identity, "user:u1");
        assert_eq!(status.identity_count, 2);
        assert_eq!(status.violations.as_ref().unwrap().violation_count, 1);
        assert!(status.blocked);

        guard.reset(&identity).await.unwrap();

        let status = guard.status(&identity).await.unwrap();
        assert_eq!(status.identity_count, 0);
        assert!(!status.blocked);
        assert!(guard.check(&identity).await.allowed);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let events = Arc::new(InMemoryEventSink::new());
        let guard = RateLimitGuard::new(
            Arc::new(MockStore::failing("connection refused")),
            RateLimitConfig::default(),
            events.clone(),
        );

        let decision = guard.check(&RequestIdentity::anonymous("10.0.0.6")).await;
        assert!(decision.allowed);
        assert!(decision.degraded);
        assert_eq!(events.count(SecurityEventType::StoreDegraded).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_respect_limit() {
        let (guard, _) = guard(RateLimitConfig::default().with_user_limit(10, 60));
        let guard = Arc::new(guard);
        let identity = RequestIdentity::authenticated("u1", "10.0.0.7");

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let guard = guard.clone();
                let identity = identity.clone();
                tokio::spawn(async move { guard.check(&identity).await.allowed })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 10);
    }

    #[tokio::test]
    async fn test_namespaces_sharing_a_store_are_independent() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let events = Arc::new(InMemoryEventSink::new());
        let messaging = RateLimitGuard::new(
            store.clone(),
            RateLimitConfig::messaging().with_user_limit(3, 60).with_blocking(60, 1),
            events.clone(),
        )
        .with_namespace("messaging");
        let api = RateLimitGuard::new(store.clone(), RateLimitConfig::api(), events)
            .with_namespace("api");
        let identity = RequestIdentity::anonymous("10.0.0.8");

        for _ in 0..3 {
            assert!(api.check(&identity).await.allowed);
        }

        let first = messaging.check(&identity).await;
        assert!(first.allowed);
        assert_eq!(first.identity.unwrap().remaining, 2);

        for _ in 0..3 {
            messaging.check(&identity).await;
        }
        assert!(messaging.is_blocked(&identity).await.unwrap());
        assert!(!api.is_blocked(&identity).await.unwrap());
        assert!(api.check(&identity).await.allowed);

        assert_eq!(api.status(&identity).await.unwrap().identity_count, 4);
        assert_eq!(api.status(&identity).await.unwrap().global_count, 4);
    }

    #[test]
    fn test_retry_secs_bounds() {
        assert_eq!(retry_secs(Duration::from_millis(0), 60), 1);
        assert_eq!(retry_secs(Duration::from_millis(59_001), 60), 60);
        assert_eq!(retry_secs(Duration::from_secs(120), 60), 60);
    }
}
