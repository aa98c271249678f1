//! Gateway Server
//!
//! HTTP server exposing the OAuth surface in front of the legacy backend.
//! Self-contained with dependency injection: stores and the backend client
//! come in through [`GatewayDependencies`].

mod dependencies;
mod handlers;
pub mod logging_middleware;
pub mod rate_limit;

pub use dependencies::{DependenciesBuilder, GatewayDependencies};
pub use handlers::HealthResponse;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use mcpbridge_core::BridgeConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::bearer_auth_middleware;
use crate::authorizer::BackgroundAuthorizer;
use crate::callback::CallbackServer;
use crate::oauth::OAuthAdapter;
use crate::sweeper::Sweeper;
use rate_limit::RateLimiter;

/// OAuth adapter server
///
/// Owns the adapter, the background authorizer and the lifecycle of the
/// auxiliary listeners. Cancelling [`GatewayServer::shutdown_token`] stops
/// everything top-down.
pub struct GatewayServer {
    config: BridgeConfig,
    dependencies: GatewayDependencies,
    adapter: Arc<OAuthAdapter>,
    authorizer: Arc<BackgroundAuthorizer>,
    protected: Router,
    rate_limiter: RateLimiter,
    shutdown: CancellationToken,
}

impl GatewayServer {
    pub fn new(config: BridgeConfig, dependencies: GatewayDependencies) -> Self {
        info!("[Gateway] Initializing with dependency injection...");

        let authorizer = Arc::new(BackgroundAuthorizer::new(
            dependencies.backend.clone(),
            dependencies.session_store.clone(),
            dependencies.token_store.clone(),
            config.polling.clone(),
        ));
        let adapter = Arc::new(OAuthAdapter::new(
            &config,
            &dependencies,
            authorizer.clone(),
        ));
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);

        Self {
            config,
            dependencies,
            adapter,
            authorizer,
            protected: Router::new(),
            rate_limiter,
            shutdown: CancellationToken::new(),
        }
    }

    /// Mount routes behind bearer authentication
    pub fn with_protected_routes(mut self, routes: Router) -> Self {
        self.protected = self.protected.merge(routes);
        self
    }

    pub fn adapter(&self) -> Arc<OAuthAdapter> {
        self.adapter.clone()
    }

    pub fn authorizer(&self) -> Arc<BackgroundAuthorizer> {
        self.authorizer.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Cancel to begin shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.dependencies.csrf_store.clone(),
            self.dependencies.session_store.clone(),
            self.dependencies.token_store.clone(),
            self.config.sweep_interval,
            self.config.session_retention,
        )
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let protected = self.protected.clone().layer(middleware::from_fn_with_state(
            self.adapter.clone(),
            bearer_auth_middleware,
        ));

        let router = Router::new()
            // Health check (public)
            .route("/health", get(handlers::health))
            // Discovery (public)
            .route(
                "/.well-known/oauth-authorization-server",
                get(handlers::oauth_metadata),
            )
            .route(
                "/.well-known/oauth-protected-resource",
                get(handlers::resource_metadata),
            )
            // RFC 9728: Resource-specific metadata endpoint
            .route(
                "/.well-known/oauth-protected-resource/mcp",
                get(handlers::resource_metadata),
            )
            .route(
                "/authorize",
                get(handlers::oauth_authorize).post(handlers::oauth_authorize_submit),
            )
            .route("/token", post(handlers::oauth_token))
            .route("/register", post(handlers::oauth_register))
            .route("/revoke", post(handlers::oauth_revoke))
            .with_state(self.adapter.clone())
            .merge(protected);

        let mut router = router
            .layer(Extension(self.rate_limiter.clone()))
            .layer(TimeoutLayer::new(self.config.server.request_timeout))
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit::rate_limit_middleware,
            ))
            // Request/Response logging with body (DEBUG level)
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Serve on an already bound listener until the shutdown token fires
    ///
    /// Startup order: callback listener, sweeper, main listener. Shutdown
    /// runs in reverse: stop accepting and drain within `shutdown_grace`,
    /// cancel poll workers, stop the callback listener, stop the sweeper.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("[Gateway] Starting on {}", addr);
        info!("[Gateway] Issuer: {}", self.adapter.base_url());
        info!(
            "[Gateway] CORS: {}",
            if self.config.server.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );

        // Landing page only; a failure here never stops the adapter
        let callback = if self.config.callback.enabled {
            match CallbackServer::start(&self.config.callback).await {
                Ok(server) => Some(server),
                Err(e) => {
                    warn!("[Gateway] Callback server unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let sweeper_cancel = self.shutdown.child_token();
        let sweeper_task = tokio::spawn(self.sweeper().run(sweeper_cancel.clone()));

        let router = self.router();
        let signal = self.shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!("[Gateway] Ready to accept connections");

        let grace = self.config.server.shutdown_grace;
        let joined = tokio::select! {
            joined = &mut server => joined,
            _ = self.shutdown.cancelled() => {
                info!("[Gateway] Shutdown requested, draining for up to {:?}", grace);
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("[Gateway] Requests still in flight after {:?}, aborting", grace);
                        server.abort();
                        Ok(Ok(()))
                    }
                }
            }
        };

        self.shutdown.cancel();
        self.authorizer.shutdown().await;
        if let Some(callback) = callback {
            callback.shutdown().await;
        }
        sweeper_cancel.cancel();
        if let Err(e) = sweeper_task.await {
            warn!("[Gateway] Sweeper task failed: {}", e);
        }
        info!("[Gateway] Stopped");

        joined??;
        Ok(())
    }

    /// Bind `server.host:server.port` and serve
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.server.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Start the server in the background
    ///
    /// Returns a JoinHandle that can be used to wait for completion or abort.
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
