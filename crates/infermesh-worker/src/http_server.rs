//! HTTP Server for a Worker Node
//!
//! Serves the worker's two endpoints with axum:
//!
//! - `POST /infer` - serve one inference request
//! - `GET /health` - liveness plus cache and batch counters

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hyper::body::Bytes;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use infermesh_common::{InferRequest, MeshError};

use crate::node::WorkerNode;

/// HTTP front for a [`WorkerNode`].
pub struct HttpServer {
    node: Arc<WorkerNode>,
}

impl HttpServer {
    pub fn new(node: Arc<WorkerNode>) -> Self {
        Self { node }
    }

    /// Binds and serves until shutdown.
    pub async fn run(self, addr: SocketAddr) -> Result<(), MeshError> {
        let app = Router::new()
            .route("/infer", post(handle_infer))
            .route("/health", get(handle_health))
            .layer(CorsLayer::permissive())
            .with_state(self.node);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MeshError::Transport(format!("failed to bind to {}: {}", addr, e)))?;

        let local = listener
            .local_addr()
            .map_err(|e| MeshError::Transport(format!("failed to get local addr: {}", e)))?;
        info!("Worker HTTP server listening on {}", local);

        axum::serve(listener, app)
            .await
            .map_err(|e| MeshError::Transport(format!("server error: {}", e)))?;

        Ok(())
    }
}

/// `POST /infer`
async fn handle_infer(State(node): State<Arc<WorkerNode>>, body: Bytes) -> Response {
    let request: InferRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("invalid request: {}", e)})),
            )
                .into_response();
        }
    };

    match node.handle_infer(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /health`
async fn handle_health(State(node): State<Arc<WorkerNode>>) -> impl IntoResponse {
    Json(node.health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;
    use crate::node::WorkerConfig;

    fn test_server() -> HttpServer {
        let node = Arc::new(WorkerNode::new(
            "node-test",
            Arc::new(SyntheticBackend::new("model-a")),
            WorkerConfig::default(),
        ));
        HttpServer::new(node)
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = test_server();
        assert!(Arc::strong_count(&server.node) >= 1);
    }

    #[tokio::test]
    async fn test_infer_rejects_malformed_body() {
        let server = test_server();
        let response = handle_infer(
            State(server.node.clone()),
            Bytes::from_static(b"{\"request_id\": 3}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        server.node.shutdown().await;
    }

    #[tokio::test]
    async fn test_infer_happy_path() {
        let server = test_server();
        let body = Bytes::from_static(br#"{"request_id":"r1","input_data":[1.0,2.0]}"#);
        let response = handle_infer(State(server.node.clone()), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        server.node.shutdown().await;
    }
}
