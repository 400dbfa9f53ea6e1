//! HTTP surface for health checks, metrics and the current book view

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::orderbook::{BookView, MarketId};
use crate::websocket::{ConnectionState, ReconnectTrigger};

/// Levels per side included in `/book` metrics
const METRICS_DEPTH: usize = 10;

/// Handles the HTTP routes share with the running service
#[derive(Clone)]
pub struct AppState {
    pub views: watch::Receiver<BookView>,
    pub connection: watch::Receiver<ConnectionState>,
    pub markets: Arc<watch::Sender<Option<MarketId>>>,
    pub reconnect: ReconnectTrigger,
    pub registry: Registry,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/book", get(book))
        .route("/market/:id", post(select_market))
        .route("/reconnect", post(reconnect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let connection = *state.connection.borrow();
    Json(json!({
        "status": "healthy",
        "component": "orderbook-sync",
        "connection": connection,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<AppState>) -> Result<String, (StatusCode, String)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn book(State(state): State<AppState>) -> Json<serde_json::Value> {
    let view = state.views.borrow().clone();
    let metrics = view.metrics(METRICS_DEPTH);
    Json(json!({
        "is_loading": view.is_loading(),
        "view": view,
        "metrics": metrics,
    }))
}

async fn select_market(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match id.parse::<MarketId>() {
        Ok(market_id) => {
            info!(market_id = %market_id, "Market selected over HTTP");
            state.markets.send_replace(Some(market_id));
            (StatusCode::ACCEPTED, Json(json!({ "market_id": market_id })))
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
    }
}

async fn reconnect(State(state): State<AppState>) -> StatusCode {
    info!("Forced reconnect requested over HTTP");
    state.reconnect.force_new_connection();
    StatusCode::ACCEPTED
}
