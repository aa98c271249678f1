//! McpBridge server binary
//!
//! Configuration comes from `MCPBRIDGE_*` environment variables (a `.env`
//! file is loaded first if present). `/mcp` is a placeholder protected
//! route that echoes the authenticated identity; the real MCP tool server
//! mounts its routes the same way.

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::any, Json, Router};
use mcpbridge_core::BridgeConfig;
use mcpbridge_gateway::{AuthenticatedClient, GatewayDependencies, GatewayServer, HttpBackendClient};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Initialize tracing
///
/// - Console: colored, compact format
/// - File: daily rotation in `$MCPBRIDGE_LOG_DIR`, when set
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,mcpbridge=debug,mcpbridge_core=debug,mcpbridge_gateway=debug")
    });

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let mut guard = None;
    let file_layer = std::env::var("MCPBRIDGE_LOG_DIR").ok().and_then(|dir| {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("mcpbridge")
            .filename_suffix("log")
            .build(&dir);
        match appender {
            Ok(appender) => {
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard = Some(file_guard);
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_thread_ids(true)
                        .with_line_number(true)
                        .with_file(true)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: file logging disabled ({}): {}", dir, e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Must be kept alive for the duration of the program
    guard
}

async fn mcp_endpoint(client: AuthenticatedClient) -> Json<Value> {
    Json(json!({
        "client_id": client.client_id,
        "subject": client.credential.subject,
        "scope": client.scope,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _guard = init_tracing();

    let config = BridgeConfig::from_env().context("failed to load configuration")?;
    info!(
        "[Main] McpBridge {} (backend {})",
        env!("CARGO_PKG_VERSION"),
        config.backend.base_url
    );

    let backend = Arc::new(HttpBackendClient::new(&config.backend)?);
    let dependencies = GatewayDependencies::builder()
        .backend(backend)
        .build(&config)
        .map_err(anyhow::Error::msg)?;

    let server = GatewayServer::new(config, dependencies)
        .with_protected_routes(Router::new().route("/mcp", any(mcp_endpoint)));

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[Main] Cannot listen for Ctrl-C: {}", e);
            return;
        }
        info!("[Main] Ctrl-C received, shutting down");
        shutdown.cancel();
    });

    server.run().await
}
