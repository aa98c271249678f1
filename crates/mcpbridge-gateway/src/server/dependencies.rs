//! Dependency Injection Container
//!
//! Stores, backend and launcher are injected so tests can run isolated
//! instances side by side and swap the legacy backend for a scripted one.

use std::sync::Arc;

use mcpbridge_core::{
    BackendAuthClient, BridgeConfig, ClientRegistry, CsrfStore, SessionStore, TokenStore,
    UserAgentLauncher,
};

use crate::backend::{BrowserLauncher, LogLauncher};
use crate::store::{
    InMemoryClientRegistry, InMemoryCsrfStore, InMemorySessionStore, InMemoryTokenStore,
};

/// Dependency container for the gateway
#[derive(Clone)]
pub struct GatewayDependencies {
    pub backend: Arc<dyn BackendAuthClient>,
    pub launcher: Arc<dyn UserAgentLauncher>,
    pub csrf_store: Arc<dyn CsrfStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub token_store: Arc<dyn TokenStore>,
    pub client_registry: Arc<dyn ClientRegistry>,
}

impl GatewayDependencies {
    pub fn builder() -> DependenciesBuilder {
        DependenciesBuilder::default()
    }
}

/// Builder for GatewayDependencies
///
/// Only the backend is mandatory; stores default to in-memory instances
/// sized from the configuration.
#[derive(Default)]
pub struct DependenciesBuilder {
    backend: Option<Arc<dyn BackendAuthClient>>,
    launcher: Option<Arc<dyn UserAgentLauncher>>,
    csrf_store: Option<Arc<dyn CsrfStore>>,
    session_store: Option<Arc<dyn SessionStore>>,
    token_store: Option<Arc<dyn TokenStore>>,
    client_registry: Option<Arc<dyn ClientRegistry>>,
}

impl DependenciesBuilder {
    pub fn backend(mut self, backend: Arc<dyn BackendAuthClient>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn UserAgentLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn csrf_store(mut self, store: Arc<dyn CsrfStore>) -> Self {
        self.csrf_store = Some(store);
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    pub fn client_registry(mut self, registry: Arc<dyn ClientRegistry>) -> Self {
        self.client_registry = Some(registry);
        self
    }

    pub fn build(self, config: &BridgeConfig) -> Result<GatewayDependencies, String> {
        let backend = self.backend.ok_or("backend is required")?;
        let launcher: Arc<dyn UserAgentLauncher> = match self.launcher {
            Some(launcher) => launcher,
            None if config.launch_browser => Arc::new(BrowserLauncher),
            None => Arc::new(LogLauncher),
        };

        Ok(GatewayDependencies {
            backend,
            launcher,
            csrf_store: self
                .csrf_store
                .unwrap_or_else(|| Arc::new(InMemoryCsrfStore::new(config.csrf_ttl))),
            session_store: self
                .session_store
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new(config.session_ttl))),
            token_store: self
                .token_store
                .unwrap_or_else(|| Arc::new(InMemoryTokenStore::new(config.token.ttl))),
            client_registry: self
                .client_registry
                .unwrap_or_else(|| Arc::new(InMemoryClientRegistry::new())),
        })
    }
}
