use dashmap::DashMap;
use mcpbridge_core::{ClientRegistry, RegisteredClient};

/// Clients registered through DCR, kept for the process lifetime
#[derive(Default)]
pub struct InMemoryClientRegistry {
    clients: DashMap<String, RegisteredClient>,
}

impl InMemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientRegistry for InMemoryClientRegistry {
    fn register(&self, client: RegisteredClient) {
        self.clients.insert(client.client_id.clone(), client);
    }

    fn get(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.get(client_id).map(|c| c.value().clone())
    }
}
