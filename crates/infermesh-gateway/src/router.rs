use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use infermesh_common::{BreakerStats, GatewayStats, MeshError, Result};

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::ring::HashRing;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Virtual nodes per worker on the hash ring
    ///
    /// Default: 150
    pub virtual_nodes: usize,
    /// Circuit breaker parameters applied to every worker
    pub breaker: CircuitBreakerConfig,
    /// TCP connect timeout for worker attempts
    ///
    /// Default: 5 seconds
    pub connect_timeout: Duration,
    /// End-to-end timeout for a single worker attempt
    ///
    /// Default: 5 seconds
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            virtual_nodes: crate::ring::DEFAULT_VIRTUAL_NODES,
            breaker: CircuitBreakerConfig::default(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// InferMesh gateway router.
///
/// The gateway sits between clients and the worker fleet. It holds no
/// inference state of its own; per request it only decides *which* worker
/// should serve, forwards the body untouched, and reports the outcome to
/// that worker's circuit breaker.
///
/// # Routing
///
/// 1. The request's `request_id` is hashed onto the ring; the owning
///    worker is the primary.
/// 2. The primary is attempted if its breaker admits the request.
/// 3. On a declined or failed attempt the remaining workers are tried in
///    construction order, skipping the primary.
///
/// Consistent hashing rather than round-robin: identical `request_id`s
/// land on the same worker whenever it is healthy, so that worker's
/// result cache actually gets hit.
///
/// # Worker set
///
/// The fleet is fixed at construction. The ring supports add/remove, but
/// the gateway does not expose dynamic membership; restart it to change
/// the fleet.
pub struct Gateway {
    /// Worker identifiers in construction order; this is the failover order
    workers: Vec<String>,
    /// Base URL per worker, derived once at construction
    endpoints: HashMap<String, String>,
    ring: RwLock<HashRing>,
    breakers: HashMap<String, CircuitBreaker>,
    client: reqwest::Client,
}

impl Gateway {
    /// Creates a gateway over a fixed worker set with default config.
    ///
    /// Worker identifiers are `host:port` strings; an `http://` scheme
    /// prefix is accepted and stripped for identity purposes.
    pub fn new(workers: Vec<String>) -> Result<Self> {
        Self::with_config(workers, GatewayConfig::default())
    }

    /// Creates a gateway with custom routing and transport parameters.
    pub fn with_config(workers: Vec<String>, config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MeshError::Transport(format!("failed to build HTTP client: {}", e)))?;

        let mut ring = HashRing::with_virtual_nodes(config.virtual_nodes);
        let mut ordered = Vec::new();
        let mut endpoints = HashMap::new();
        let mut breakers = HashMap::new();

        for raw in workers {
            let worker = normalize_worker_id(&raw);
            if breakers.contains_key(&worker) {
                continue; // duplicate entry in the CLI list
            }
            ring.add(&worker);
            endpoints.insert(worker.clone(), format!("http://{}", worker));
            breakers.insert(
                worker.clone(),
                CircuitBreaker::new(config.breaker.clone()),
            );
            info!("Registered worker: {}", worker);
            ordered.push(worker);
        }

        Ok(Self {
            workers: ordered,
            endpoints,
            ring: RwLock::new(ring),
            breakers,
            client,
        })
    }

    /// Routes one inference request to the fleet.
    ///
    /// The body is an opaque JSON passthrough apart from the required
    /// `request_id` string field.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidRequest`] when `request_id` is missing
    /// - [`MeshError::NoWorkers`] when the gateway has no workers
    /// - [`MeshError::AllWorkersUnavailable`] when every worker declined
    ///   or failed
    pub async fn route(&self, request: Value) -> Result<Value> {
        let request_id = request
            .get("request_id")
            .and_then(Value::as_str)
            .ok_or_else(|| MeshError::InvalidRequest("missing request_id".to_string()))?
            .to_string();

        let primary = {
            let ring = self.ring.read().await;
            match ring.locate(&request_id) {
                Ok(worker) => worker,
                Err(MeshError::EmptyRing) => return Err(MeshError::NoWorkers),
                Err(e) => return Err(e),
            }
        };

        debug!("request {} -> primary {}", request_id, primary);

        if let Some(response) = self.try_worker(&primary, &request).await {
            return Ok(response);
        }

        // Primary declined or failed; walk the rest of the fleet.
        for worker in &self.workers {
            if *worker == primary {
                continue;
            }
            if let Some(response) = self.try_worker(worker, &request).await {
                return Ok(response);
            }
        }

        Err(MeshError::AllWorkersUnavailable)
    }

    /// One attempt against one worker, gated by its breaker.
    ///
    /// Any transport error or non-2xx status is recorded as a breaker
    /// failure and absorbed; the caller moves on to the next worker.
    async fn try_worker(&self, worker: &str, request: &Value) -> Option<Value> {
        let breaker = self.breakers.get(worker)?;

        if !breaker.allow() {
            debug!("circuit breaker open for {}, skipping", worker);
            return None;
        }

        let url = format!("{}/infer", self.endpoints.get(worker)?);
        match self.client.post(&url).json(request).send().await {
            Ok(response) if response.status().is_success() => match response.json::<Value>().await {
                Ok(body) => {
                    breaker.record_success();
                    Some(body)
                }
                Err(e) => {
                    warn!("worker {} returned an unreadable body: {}", worker, e);
                    breaker.record_failure();
                    None
                }
            },
            Ok(response) => {
                warn!("worker {} returned status {}", worker, response.status());
                breaker.record_failure();
                None
            }
            Err(e) => {
                warn!("request to worker {} failed: {}", worker, e);
                breaker.record_failure();
                None
            }
        }
    }

    /// Snapshot of fleet size and per-worker breaker state.
    pub async fn stats(&self) -> GatewayStats {
        let total_workers = self.ring.read().await.workers().len();
        let circuit_breakers = self
            .workers
            .iter()
            .map(|worker| {
                let snap = self.breakers[worker].snapshot();
                BreakerStats {
                    node: worker.clone(),
                    state: snap.state.as_str().to_string(),
                    failures: snap.failures,
                    successes: snap.successes,
                }
            })
            .collect();

        GatewayStats {
            total_workers,
            circuit_breakers,
        }
    }

    /// Number of configured workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// The worker a given request id currently routes to, health aside.
    pub async fn primary_for(&self, request_id: &str) -> Result<String> {
        self.ring.read().await.locate(request_id)
    }
}

/// Strips an optional scheme prefix; worker identity is `host:port`.
fn normalize_worker_id(raw: &str) -> String {
    raw.trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.virtual_nodes, 150);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.breaker.failure_threshold, 5);
    }

    #[test]
    fn test_normalize_worker_id() {
        assert_eq!(normalize_worker_id("localhost:9001"), "localhost:9001");
        assert_eq!(normalize_worker_id("http://localhost:9001"), "localhost:9001");
        assert_eq!(normalize_worker_id("https://host:9001/"), "host:9001");
    }

    #[tokio::test]
    async fn test_gateway_creation() {
        let gateway = Gateway::new(vec![
            "localhost:9001".to_string(),
            "localhost:9002".to_string(),
        ])
        .unwrap();
        assert_eq!(gateway.worker_count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_workers_collapse() {
        let gateway = Gateway::new(vec![
            "localhost:9001".to_string(),
            "http://localhost:9001".to_string(),
        ])
        .unwrap();
        assert_eq!(gateway.worker_count(), 1);
    }

    #[tokio::test]
    async fn test_route_without_request_id_is_invalid() {
        let gateway = Gateway::new(vec!["localhost:9001".to_string()]).unwrap();
        let err = gateway
            .route(serde_json::json!({"input_data": [1.0]}))
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_route_with_no_workers() {
        let gateway = Gateway::new(vec![]).unwrap();
        let err = gateway
            .route(serde_json::json!({"request_id": "r1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::NoWorkers));
    }

    #[tokio::test]
    async fn test_stats_report_every_worker_closed_at_start() {
        let gateway = Gateway::new(vec![
            "localhost:9001".to_string(),
            "localhost:9002".to_string(),
            "localhost:9003".to_string(),
        ])
        .unwrap();

        let stats = gateway.stats().await;
        assert_eq!(stats.total_workers, 3);
        assert_eq!(stats.circuit_breakers.len(), 3);
        for breaker in &stats.circuit_breakers {
            assert_eq!(breaker.state, "CLOSED");
            assert_eq!(breaker.failures, 0);
            assert_eq!(breaker.successes, 0);
        }
    }

    #[tokio::test]
    async fn test_primary_is_stable() {
        let gateway = Gateway::new(vec![
            "localhost:9001".to_string(),
            "localhost:9002".to_string(),
            "localhost:9003".to_string(),
        ])
        .unwrap();

        let first = gateway.primary_for("req-42").await.unwrap();
        for _ in 0..10 {
            assert_eq!(gateway.primary_for("req-42").await.unwrap(), first);
        }
    }
}
