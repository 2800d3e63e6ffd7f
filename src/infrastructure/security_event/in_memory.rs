//! Collecting sink for tests and inspection

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::security_event::{SecurityEvent, SecurityEventSink, SecurityEventType};

/// Keeps every emitted event in memory
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: RwLock<Vec<SecurityEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<SecurityEvent> {
        self.events.read().await.clone()
    }

    pub async fn of_type(&self, event_type: SecurityEventType) -> Vec<SecurityEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub async fn count(&self, event_type: SecurityEventType) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl SecurityEventSink for InMemoryEventSink {
    async fn emit(&self, event: SecurityEvent) {
        self.events.write().await.push(event);
    }
}
