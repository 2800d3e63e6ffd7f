//! Request identity used to key counters and blocks

use serde::{Deserialize, Serialize};

/// Who a request is attributed to: the authenticated user when known,
/// otherwise the network origin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub user_id: Option<String>,
    pub origin: String,
}

impl RequestIdentity {
    pub fn anonymous(origin: impl Into<String>) -> Self {
        Self {
            user_id: None,
            origin: origin.into(),
        }
    }

    pub fn authenticated(user_id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            origin: origin.into(),
        }
    }

    /// `user:<id>` or `origin:<ip>`
    pub fn label(&self) -> String {
        match &self.user_id {
            Some(user_id) => format!("user:{}", user_id),
            None => self.origin_label(),
        }
    }

    pub fn origin_label(&self) -> String {
        format!("origin:{}", self.origin)
    }

    /// Per-identity counter key within a limiter namespace
    pub fn counter_key(&self, namespace: &str) -> String {
        format!("rl:{}:{}", namespace, self.label())
    }

    /// Violation/block key for the identity
    pub fn block_key(&self, namespace: &str) -> String {
        format!("rl:block:{}:{}", namespace, self.label())
    }

    /// Violation/block key for the origin, used for global-limit violations
    pub fn origin_block_key(&self, namespace: &str) -> String {
        format!("rl:block:{}:{}", namespace, self.origin_label())
    }

    /// Shared counter for every identity within a namespace
    pub fn global_key(namespace: &str) -> String {
        format!("rl:{}:global", namespace)
    }
}

impl std::fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}
