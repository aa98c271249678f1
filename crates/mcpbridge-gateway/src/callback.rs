//! Callback Server
//!
//! Auxiliary listener for backends that end on a static page: the user (or
//! the backend's redirect) lands here and is told to go back to the client.
//! It never drives session state; completion is still detected by polling.
//!
//! Reachable by an untrusted browser, so every connection is bounded:
//! - read: time to receive request headers
//! - write: time to produce a response
//! - idle: total lifetime of one connection

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::Query,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use hyper::{body::Incoming, server::conn::http1, Request};
use hyper_util::rt::{TokioIo, TokioTimer};
use mcpbridge_core::CallbackConfig;
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, info, warn};

use crate::oauth::pages;

/// Paths a backend landing page may point at
pub const CALLBACK_PATHS: &[&str] = &["/callback", "/auth/callback", "/oauth/callback", "/"];

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    error: Option<String>,
    error_description: Option<String>,
}

async fn landing(uri: Uri, Query(params): Query<CallbackParams>) -> Html<String> {
    match params.error {
        Some(ref error) => warn!("[Callback] Backend reported {} on {}", error, uri.path()),
        None => info!("[Callback] Landing page visit on {}", uri.path()),
    }
    let message = params.error_description.or(params.error);
    Html(pages::callback_landing(message.as_deref()))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Router for the landing paths, bounded by `write_timeout`
pub fn callback_router(write_timeout: Duration) -> Router {
    let router = CALLBACK_PATHS
        .iter()
        .fold(Router::new(), |router, path| router.route(path, get(landing)));
    router
        .fallback(not_found)
        .layer(TimeoutLayer::new(write_timeout))
}

pub struct CallbackServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    grace: Duration,
}

impl CallbackServer {
    /// Bind and start serving. Port 0 picks an ephemeral port.
    pub async fn start(config: &CallbackConfig) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind callback listener on {addr}"))?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let router = callback_router(config.write_timeout);
        let task = tokio::spawn(accept_loop(
            listener,
            router,
            config.clone(),
            shutdown.clone(),
        ));

        info!("[Callback] Listening on http://{}", local_addr);
        Ok(Self {
            local_addr,
            shutdown,
            task,
            grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/callback", self.local_addr)
    }

    /// Stop accepting, drain open connections, and abort whatever is left
    /// when the grace period ends
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let abort = self.task.abort_handle();
        match tokio::time::timeout(self.grace, self.task).await {
            Ok(Ok(())) => info!("[Callback] Stopped"),
            Ok(Err(e)) => warn!("[Callback] Server task failed: {}", e),
            Err(_) => {
                warn!(
                    "[Callback] Connections still open after {:?}, aborting",
                    self.grace
                );
                abort.abort();
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Router,
    config: CallbackConfig,
    shutdown: CancellationToken,
) {
    // Dropping the set aborts every connection task
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        router.clone(),
                        config.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!("[Callback] Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    debug!("[Callback] Draining {} connections", connections.len());
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    config: CallbackConfig,
    shutdown: CancellationToken,
) {
    let service =
        hyper::service::service_fn(move |request: Request<Incoming>| router.clone().call(request));
    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(config.read_timeout)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let idle = tokio::time::sleep(config.idle_timeout);
    tokio::pin!(idle);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(%peer, "[Callback] Connection error: {}", e);
            }
            return;
        }
        _ = &mut idle => debug!(%peer, "[Callback] Connection lifetime reached, closing"),
        _ = shutdown.cancelled() => {}
    }

    conn.as_mut().graceful_shutdown();
    match tokio::time::timeout(config.write_timeout, conn).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%peer, "[Callback] Connection error during close: {}", e),
        Err(_) => debug!(%peer, "[Callback] Connection did not close in time"),
    }
}
