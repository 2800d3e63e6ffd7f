//! In-memory OAuth client registry

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::oauth::ClientRegistry;
use crate::domain::DomainError;

/// Registered clients and their redirect URIs
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(client_id, redirect_uris)` pairs
    pub fn with_clients<I, U>(clients: I) -> Self
    where
        I: IntoIterator<Item = (String, U)>,
        U: IntoIterator<Item = String>,
    {
        let clients = clients
            .into_iter()
            .map(|(id, uris)| (id, uris.into_iter().collect()))
            .collect();

        Self {
            clients: RwLock::new(clients),
        }
    }

    /// Register a client, replacing any previous redirect URIs
    pub async fn register(&self, client_id: impl Into<String>, redirect_uris: Vec<String>) {
        self.clients
            .write()
            .await
            .insert(client_id.into(), redirect_uris);
    }

    pub async fn remove(&self, client_id: &str) -> bool {
        self.clients.write().await.remove(client_id).is_some()
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn redirect_uris(&self, client_id: &str) -> Result<Option<Vec<String>>, DomainError> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }
}
