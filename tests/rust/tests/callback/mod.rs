//! Callback landing server and gateway lifecycle over a real socket

use std::time::Duration;

use mcpbridge_core::CallbackConfig;
use mcpbridge_gateway::{CallbackServer, GatewayDependencies, GatewayServer};
use pretty_assertions::assert_eq;
use tests::{test_config, RecordingLauncher, ScriptedBackend};
use tokio::net::{TcpListener, TcpStream};

fn callback_config() -> CallbackConfig {
    CallbackConfig {
        enabled: true,
        port: 0,
        shutdown_grace: Duration::from_secs(1),
        ..CallbackConfig::default()
    }
}

#[tokio::test]
async fn test_callback_server_serves_landing_page() {
    let server = CallbackServer::start(&callback_config()).await.unwrap();
    let url = server.url();
    assert!(url.ends_with("/callback"));

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("return to your client"));

    let response = reqwest::get(format!("{url}?error=access_denied"))
        .await
        .unwrap();
    let body = response.text().await.unwrap();
    assert!(body.contains("access_denied"));

    let base = format!("http://{}", server.local_addr());
    let missing = reqwest::get(format!("{base}/favicon.ico")).await.unwrap();
    assert_eq!(missing.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_callback_shutdown_releases_port() {
    let server = CallbackServer::start(&callback_config()).await.unwrap();
    let addr = server.local_addr();
    assert!(TcpStream::connect(addr).await.is_ok());

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown within grace");
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_with_idle_connection_is_bounded() {
    let server = CallbackServer::start(&callback_config()).await.unwrap();
    // Holds a connection open without ever sending a request
    let _idle = TcpStream::connect(server.local_addr()).await.unwrap();

    let started = std::time::Instant::now();
    server.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_gateway_serves_and_stops_on_cancel() {
    let config = test_config();
    let dependencies = GatewayDependencies::builder()
        .backend(std::sync::Arc::new(ScriptedBackend::new()))
        .launcher(std::sync::Arc::new(RecordingLauncher::new()))
        .build(&config)
        .unwrap();
    let server = GatewayServer::new(config, dependencies);
    let shutdown = server.shutdown_token();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.serve(listener));

    let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("gateway stops")
        .unwrap();
    assert!(result.is_ok(), "{result:?}");
    assert!(TcpStream::connect(addr).await.is_err());
}
