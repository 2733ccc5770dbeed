//! HTTP Server for the Gateway
//!
//! Serves the gateway's two endpoints with axum:
//!
//! - `POST /infer` - route a request across the fleet
//! - `GET /stats` - fleet size and per-worker breaker state

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hyper::body::Bytes;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use infermesh_common::MeshError;

use crate::router::Gateway;

/// HTTP front for a [`Gateway`].
pub struct HttpServer {
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Binds and serves until shutdown.
    pub async fn run(self, addr: SocketAddr) -> Result<(), MeshError> {
        let app = Router::new()
            .route("/infer", post(handle_infer))
            .route("/stats", get(handle_stats))
            .layer(CorsLayer::permissive())
            .with_state(self.gateway);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MeshError::Transport(format!("failed to bind to {}: {}", addr, e)))?;

        let local = listener
            .local_addr()
            .map_err(|e| MeshError::Transport(format!("failed to get local addr: {}", e)))?;
        info!("Gateway HTTP server listening on {}", local);

        axum::serve(listener, app)
            .await
            .map_err(|e| MeshError::Transport(format!("server error: {}", e)))?;

        Ok(())
    }
}

/// `POST /infer`: parse, route, and map total failure to a 500.
async fn handle_infer(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("invalid JSON: {}", e)})),
            )
                .into_response();
        }
    };

    match gateway.route(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /stats`
async fn handle_stats(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.stats().await)
}
