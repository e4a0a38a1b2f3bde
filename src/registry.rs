//! Client registry
//!
//! The single source of truth for who is connected. An entry exists from
//! the moment a connection finishes name negotiation until its handler
//! unregisters it on the way out.
//!
//! The lock only protects the map. Callers that need to do I/O take a
//! [`ClientRegistry::snapshot`] and release the lock first.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::client::ClientHandle;
use crate::types::ClientId;

#[derive(Debug)]
struct RegistryEntry {
    handle: ClientHandle,
    name: String,
}

/// Shared mapping from connection handle to display name
///
/// Shared between handlers as `Arc<ClientRegistry>`.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, RegistryEntry>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a negotiated client
    ///
    /// Returns false and leaves the existing entry untouched if the handle
    /// is already registered.
    pub async fn register(&self, handle: ClientHandle, name: String) -> bool {
        let mut clients = self.clients.lock().await;
        if clients.contains_key(&handle.id()) {
            return false;
        }

        clients.insert(handle.id(), RegistryEntry { handle, name });
        debug!("Total clients: {}", clients.len());
        true
    }

    /// Remove a client, returning its name if it was registered
    pub async fn unregister(&self, id: ClientId) -> Option<String> {
        let mut clients = self.clients.lock().await;
        let removed = clients.remove(&id).map(|entry| entry.name);
        if removed.is_some() {
            debug!("Total clients: {}", clients.len());
        }
        removed
    }

    /// Point-in-time copy of every (handle, name) pair
    pub async fn snapshot(&self) -> Vec<(ClientHandle, String)> {
        self.clients
            .lock()
            .await
            .values()
            .map(|entry| (entry.handle.clone(), entry.name.clone()))
            .collect()
    }

    /// Number of registered clients
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Check if nobody is registered
    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Check if the client with `id` is registered
    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    /// Display names currently registered, in no particular order
    pub async fn names(&self) -> Vec<String> {
        self.clients
            .lock()
            .await
            .values()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Whether the registry has reached `ceiling` entries
    pub async fn is_full(&self, ceiling: usize) -> bool {
        self.clients.lock().await.len() >= ceiling
    }
}
