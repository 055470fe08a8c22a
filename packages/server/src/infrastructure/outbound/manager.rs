//! Per-identity collection of outbound clients, used by the relay API.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::domain::UserId;

use super::{OutboundClient, OutboundConfig};

#[derive(Debug)]
pub struct ClientManager {
    upstream_url: String,
    config: OutboundConfig,
    clients: RwLock<HashMap<UserId, Arc<OutboundClient>>>,
}

impl ClientManager {
    pub fn new(upstream_url: impl Into<String>, config: OutboundConfig) -> Self {
        Self {
            upstream_url: upstream_url.into(),
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Return the client for `identity`, creating it when absent.
    ///
    /// A client that has already closed is replaced by a fresh one, since a
    /// closed client can never reconnect. The returned client may still need
    /// [`OutboundClient::connect`].
    pub async fn get_or_create(&self, identity: &UserId) -> Arc<OutboundClient> {
        if let Some(client) = self.clients.read().await.get(identity)
            && !client.is_closed()
        {
            return client.clone();
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(identity)
            && !client.is_closed()
        {
            return client.clone();
        }
        let client = OutboundClient::new(identity.clone(), self.upstream_url.clone(), self.config);
        clients.insert(identity.clone(), client.clone());
        tracing::debug!("Created outbound client for '{}'", identity);
        client
    }

    pub async fn get(&self, identity: &UserId) -> Option<Arc<OutboundClient>> {
        self.clients.read().await.get(identity).cloned()
    }

    /// Close and forget the client for `identity`. Returns whether one existed.
    pub async fn remove(&self, identity: &UserId) -> bool {
        match self.clients.write().await.remove(identity) {
            Some(client) => {
                client.close();
                tracing::debug!("Removed outbound client for '{}'", identity);
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let mut clients = self.clients.write().await;
        for client in clients.values() {
            client.close();
        }
        tracing::info!("Closed {} outbound client(s)", clients.len());
        clients.clear();
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
