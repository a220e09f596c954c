//! Registry of application instances seen by the worker.

use std::collections::HashMap;
use tokio::sync::Mutex;

/// Default number of clients remembered before the least recently seen is evicted.
pub const DEFAULT_MAX_CLIENTS: usize = 1024;

#[derive(Debug)]
struct ClientEntry {
    controller: Option<String>,
    last_seen: u64,
}

#[derive(Debug, Default)]
struct Clients {
    entries: HashMap<String, ClientEntry>,
    tick: u64,
}

/// Tracks which store version controls each known client.
///
/// A client that first shows up while no version is active stays
/// uncontrolled until the next activation claims it. The registry is
/// bounded: past `capacity` the least recently seen client is forgotten.
#[derive(Debug)]
pub struct ClientRegistry {
    capacity: usize,
    clients: Mutex<Clients>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CLIENTS)
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), clients: Mutex::new(Clients::default()) }
    }

    /// Record `client_id`, controlled by `controller` if it is new.
    pub async fn register(&self, client_id: &str, controller: Option<&str>) {
        let mut guard = self.clients.lock().await;
        let clients = &mut *guard;
        clients.tick += 1;

        if let Some(entry) = clients.entries.get_mut(client_id) {
            entry.last_seen = clients.tick;
            return;
        }

        if clients.entries.len() >= self.capacity {
            let oldest = clients
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                clients.entries.remove(&oldest);
                tracing::debug!(client = %oldest, "evicted least recently seen client");
            }
        }

        clients.entries.insert(
            client_id.to_string(),
            ClientEntry { controller: controller.map(str::to_string), last_seen: clients.tick },
        );
    }

    /// Put every known client under `version`. Returns how many were claimed.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.lock().await;
        for entry in clients.entries.values_mut() {
            entry.controller = Some(version.to_string());
        }
        clients.entries.len()
    }

    pub async fn controller_of(&self, client_id: &str) -> Option<String> {
        self.clients
            .lock()
            .await
            .entries
            .get(client_id)
            .and_then(|entry| entry.controller.clone())
    }

    pub async fn count(&self) -> usize {
        self.clients.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_keeps_first_controller() {
        let registry = ClientRegistry::new();
        registry.register("tab-1", Some("v1")).await;
        registry.register("tab-1", Some("v2")).await;

        assert_eq!(registry.controller_of("tab-1").await.as_deref(), Some("v1"));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_claim_takes_over_all_clients() {
        let registry = ClientRegistry::new();
        registry.register("tab-1", Some("v1")).await;
        registry.register("tab-2", None).await;

        assert_eq!(registry.claim("v2").await, 2);
        assert_eq!(registry.controller_of("tab-1").await.as_deref(), Some("v2"));
        assert_eq!(registry.controller_of("tab-2").await.as_deref(), Some("v2"));
        assert_eq!(registry.controller_of("tab-3").await, None);
    }

    #[tokio::test]
    async fn test_registry_is_bounded() {
        let registry = ClientRegistry::with_capacity(2);
        registry.register("tab-1", Some("v1")).await;
        registry.register("tab-2", Some("v1")).await;
        // tab-1 seen again, so tab-2 is now the least recently seen
        registry.register("tab-1", Some("v1")).await;
        registry.register("tab-3", Some("v1")).await;

        assert_eq!(registry.count().await, 2);
        assert_eq!(registry.controller_of("tab-1").await.as_deref(), Some("v1"));
        assert_eq!(registry.controller_of("tab-2").await, None);
        assert_eq!(registry.controller_of("tab-3").await.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_many_distinct_clients_stay_within_capacity() {
        let registry = ClientRegistry::with_capacity(16);
        for n in 0..100 {
            registry.register(&format!("10.0.0.{n}"), None).await;
        }
        assert_eq!(registry.count().await, 16);
        assert_eq!(registry.claim("v1").await, 16);
    }
}
