use std::sync::Arc;

use anyhow::{Context, Result};
use rfc_bridge::{AdapterConfig, BackendConfig, GrpcRfcConnector, MessageAdapter, RfcBridge};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let broker_host = require_env("MS_MQTT_BROKER_HOST")?;
    let request_topic = require_env("MS_TOPIC_REQUEST")?;
    let backend_addr = require_env("MS_RFC_BACKEND_ADDR")?;
    let backend_user = require_env("MS_RFC_USER")?;
    let backend_password = require_env("MS_RFC_PASSWORD")?;

    let adapter_config = AdapterConfig::builder()
        .broker_host(broker_host)
        .request_topic(request_topic)
        .build();
    let backend_config = BackendConfig::builder()
        .endpoint(backend_addr)
        .user(backend_user)
        .password(backend_password)
        .build();

    info!("Starting RFC service...");

    // A backend that cannot be reached at startup is a fatal configuration
    // problem, not something to run degraded over.
    let connector = GrpcRfcConnector::connect(&backend_config).await?;
    let bridge = Arc::new(RfcBridge::new(connector));
    let adapter = MessageAdapter::connect(adapter_config, bridge);

    wait_for_shutdown().await?;

    info!("Terminating...");

    // Unsubscribe, disconnect, then join the delivery loops; the backend
    // connection drops with the bridge afterwards.
    adapter.close().await;

    Ok(())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for SIGINT")?,
        _ = sigterm.recv() => {}
    }

    Ok(())
}
