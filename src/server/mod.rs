//! HTTP/WebSocket surface: the point-query endpoint, the subscriber upgrade
//! endpoint and a health probe.

mod state;
mod ws;

pub use state::AppState;

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{info, warn};
use serde_json::json;
use tokio::net::TcpListener;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/monitor/:service_name", get(get_service_status))
        .route("/ws", get(ws_upgrade))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, stopping server");
}

/// Point lookup of one service's current status, independent of the
/// broadcast stream. Delegated entirely to the status source; failures come
/// back as a structured error body.
async fn get_service_status(
    Path(service_name): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.source.service_status(&service_name).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            warn!("status query for {service_name} failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state.hub.clone()))
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "backend_connected": state.transport.is_connected().await,
        "subscribers": state.hub.subscriber_count().await,
        "uptime_secs": state.uptime_secs(),
    }))
}
