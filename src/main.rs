//! Order book sync service
//!
//! Connects to the exchange feed, keeps the selected market's book reconciled
//! and serves it over HTTP and an optional IPC socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orderbook_sync::server::{build_router, AppState};
use orderbook_sync::websocket::{ReconnectTrigger, WebSocketManager};
use orderbook_sync::{Config, Publisher, SyncController, SyncTelemetry};

/// Time the manager gets to flush outbound requests on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting order book sync service");

    // Load configuration
    let config = Config::load()?;
    info!(url = %config.ws_url, market_id = ?config.market_id, "Configuration loaded");

    let registry = prometheus::Registry::new();
    let telemetry = SyncTelemetry::new()?;
    telemetry.register(&registry)?;

    // Feed connection
    let (manager, handle) = WebSocketManager::new(
        &config.ws_url,
        (&config).into(),
        Duration::from_secs(config.recv_timeout_secs),
    );

    // Market selection
    let (market_tx, market_rx) = watch::channel(config.market_id);

    let controller = SyncController::new(
        handle.sink,
        Duration::from_millis(config.publish_interval_ms),
        telemetry,
    );
    let views = controller.subscribe_view();

    // Optional IPC consumer
    if let Some(path) = &config.ipc_socket_path {
        let publisher = Publisher::new(path).await?;
        tokio::spawn(publisher.forward(controller.subscribe_view()));
    }

    let (stop_tx, stop_rx) = oneshot::channel();
    let controller_task = tokio::spawn(controller.run(handle.events, market_rx, stop_rx));
    let mut manager_task = tokio::spawn(async move {
        if let Err(e) = manager.run().await {
            warn!(error = %e, "WebSocket manager stopped");
        }
    });

    spawn_sighup_listener(handle.reconnect.clone());

    // Start health check server
    let state = AppState {
        views,
        connection: handle.state,
        markets: Arc::new(market_tx),
        reconnect: handle.reconnect,
        registry,
    };
    let addr: SocketAddr = config.http_addr.parse()?;
    tokio::spawn(async move {
        if let Err(e) = start_http_server(addr, state).await {
            warn!(error = %e, "Health server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Controller first, so its unsubscribe reaches the manager before the
    // manager sees the sink close and shuts the connection down.
    let _ = stop_tx.send(());
    if let Err(e) = controller_task.await {
        warn!(error = %e, "Controller task failed");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut manager_task).await.is_err() {
        warn!("WebSocket manager did not stop in time, aborting");
        manager_task.abort();
    }

    Ok(())
}

/// Start HTTP server for health checks, metrics and the book view
async fn start_http_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    info!(addr = %addr, "Starting health check server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(unix)]
fn spawn_sighup_listener(trigger: ReconnectTrigger) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to install SIGHUP handler");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, forcing new connection");
            trigger.force_new_connection();
        }
    });
}

#[cfg(not(unix))]
fn spawn_sighup_listener(_trigger: ReconnectTrigger) {}
