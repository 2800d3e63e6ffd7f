//! Default sink: structured `tracing` output plus a metrics counter

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::security_event::{SecurityEvent, SecurityEventSink, Severity};
use crate::infrastructure::observability::record_security_event;

/// Writes every event under the `security` target at a level derived from
/// its severity
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecurityEventSink for TracingEventSink {
    async fn emit(&self, event: SecurityEvent) {
        record_security_event(event.event_type, event.severity);

        let details = serde_json::Value::Object(event.details).to_string();
        let event_type = event.event_type.as_str();
        let severity = event.severity.as_str();
        let timestamp = event.timestamp.to_rfc3339();

        match event.severity {
            Severity::Low => info!(
                target: "security",
                event_type,
                severity,
                identity = %event.identity,
                %timestamp,
                %details,
                "Security event"
            ),
            Severity::Medium => warn!(
                target: "security",
                event_type,
                severity,
                identity = %event.identity,
                %timestamp,
                %details,
                "Security event"
            ),
            Severity::High | Severity::Critical => error!(
                target: "security",
                event_type,
                severity,
                identity = %event.identity,
                %timestamp,
                %details,
                "Security event"
            ),
        }
    }
}
