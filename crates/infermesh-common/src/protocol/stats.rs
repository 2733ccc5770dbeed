//! Health and stats documents served by the HTTP surfaces.
//!
//! Workers expose [`WorkerHealth`] at `GET /health`; the gateway exposes
//! [`GatewayStats`] at `GET /stats`. Both are plain JSON snapshots; no
//! metrics export format is implied.

use serde::{Deserialize, Serialize};

/// Batch processor counters, nested inside [`WorkerHealth`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchStats {
    /// Requests that entered the batch queue
    pub total_requests: u64,
    /// Batches dispatched to the backend
    pub total_batches: u64,
    /// Batches dispatched because the oldest request aged out
    pub timeout_batches: u64,
    /// Batches dispatched because the size bound was reached
    pub full_batches: u64,
    /// Running mean of dispatched batch sizes
    pub avg_batch_size: f64,
}

/// The document served by a worker's `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerHealth {
    pub healthy: bool,
    pub node_id: String,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_size: u64,
    pub cache_hit_rate: f64,
    pub batch_processor: BatchStats,
}

/// Per-worker circuit breaker state inside [`GatewayStats`].
///
/// `state` is one of `"CLOSED"`, `"OPEN"`, `"HALF_OPEN"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakerStats {
    pub node: String,
    pub state: String,
    pub failures: u32,
    pub successes: u32,
}

/// The document served by the gateway's `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayStats {
    pub total_workers: usize,
    pub circuit_breakers: Vec<BreakerStats>,
}
