//! Nuvo Essentia bridge
//!
//! Runs the amplifier controller, the device registry and the host-facing
//! HTTP API until Ctrl-C.

use anyhow::Result;
use nuvo_bridge::adapters::{AdapterHandle, NuvoController};
use nuvo_bridge::api::{self, AppState};
use nuvo_bridge::bus::{create_bus, BusEvent};
use nuvo_bridge::config;
use nuvo_bridge::registry::DeviceRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nuvo_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Nuvo bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::load_config()?;
    tracing::info!(?config, "Configuration loaded");

    let bus = create_bus();
    let shutdown = CancellationToken::new();

    // Subscribe here, not inside the task, so nothing init reports is missed
    let registry = Arc::new(DeviceRegistry::new());
    let registry_rx = bus.subscribe();
    let registry_task = tokio::spawn(registry.clone().run(registry_rx, shutdown.clone()));

    let controller = Arc::new(NuvoController::new(&config, bus.clone()));
    let handle = AdapterHandle::new(controller.clone(), bus.clone(), shutdown.clone());
    let controller_task = tokio::spawn(handle.run());

    // Build API routes
    let app = api::router(AppState::new(controller, registry, bus.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("Listening on {}", addr);

    let signal_bus = bus.clone();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Ctrl-C received, shutting down");
        signal_bus.publish(BusEvent::ShuttingDown {
            reason: Some("ctrl_c".to_string()),
        });
        signal_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    if let Err(e) = controller_task.await? {
        tracing::warn!("Controller exited with error: {}", e);
    }
    registry_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
