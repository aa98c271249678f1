//! McpBridge Gateway
//!
//! OAuth 2.0 authorization server in front of a poll-based credential
//! backend:
//! - Discovery, authorize, token, register and revoke endpoints
//! - Background polling of the backend per pending authorization
//! - Bearer validation for protected MCP routes
//! - Auxiliary callback landing page
//! - Dependency Injection for stores and the backend client

pub mod auth;
pub mod authorizer;
pub mod backend;
pub mod callback;
pub mod logging;
pub mod oauth;
pub mod server;
pub mod store;
pub mod sweeper;

pub use auth::{bearer_auth_middleware, AuthenticatedClient, BearerRejection};
pub use authorizer::{AuthorizationOutcome, BackgroundAuthorizer, WorkerExit};
pub use backend::{BrowserLauncher, HttpBackendClient, LogLauncher};
pub use callback::CallbackServer;
pub use oauth::{OAuthAdapter, OAuthError, OAuthErrorResponse};
pub use server::{DependenciesBuilder, GatewayDependencies, GatewayServer};
pub use store::{InMemoryClientRegistry, InMemoryCsrfStore, InMemorySessionStore, InMemoryTokenStore};
pub use sweeper::{SweepStats, Sweeper};
