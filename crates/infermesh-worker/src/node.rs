//! The worker front: cache → batcher → backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use infermesh_common::{InferRequest, InferResponse, Result, WorkerHealth};

use crate::backend::InferenceBackend;
use crate::batch::{BatchConfig, BatchFn, BatchProcessor};
use crate::cache::LruCache;
use crate::fingerprint::Fingerprint;

/// Synthetic latency reported for cache hits; the real work is one map
/// lookup, and a zero would read as a missing measurement downstream.
const CACHE_HIT_LATENCY_US: u64 = 50;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Result cache capacity in entries
    ///
    /// Default: 1000
    pub cache_capacity: usize,
    /// Batch processor bounds
    pub batch: BatchConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            batch: BatchConfig::default(),
        }
    }
}

/// A worker node: the per-request serving path in front of one backend.
///
/// Each request is fingerprinted and answered from the LRU result cache
/// when possible; misses are coalesced by the batch processor into
/// batched backend calls, and their outputs fill the cache on the way
/// back out.
///
/// Must be created inside a tokio runtime: construction starts the batch
/// worker task. Call [`shutdown`](Self::shutdown) to stop it.
pub struct WorkerNode {
    node_id: String,
    cache: LruCache<Fingerprint, Vec<f32>>,
    batch: BatchProcessor<InferRequest, InferResponse>,
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
}

impl WorkerNode {
    /// Creates a worker over the given backend and starts its batcher.
    pub fn new(
        node_id: impl Into<String>,
        backend: Arc<dyn InferenceBackend>,
        config: WorkerConfig,
    ) -> Self {
        let node_id = node_id.into();

        // The batch function captures the backend handle and the node id;
        // it runs on the blocking pool and must keep input order.
        let batch_node_id = node_id.clone();
        let batch_fn: BatchFn<InferRequest, InferResponse> = Arc::new(move |requests| {
            let started = Instant::now();
            let inputs: Vec<Vec<f32>> = requests.iter().map(|r| r.input_data.clone()).collect();
            let outputs = backend.batch_predict(&inputs)?;
            let per_request_us =
                (started.elapsed().as_micros() as u64) / requests.len().max(1) as u64;

            Ok(requests
                .into_iter()
                .zip(outputs)
                .map(|(request, output)| {
                    InferResponse::fresh(
                        request.request_id,
                        output,
                        batch_node_id.clone(),
                        per_request_us,
                    )
                })
                .collect())
        });

        let batch = BatchProcessor::new(config.batch.clone(), batch_fn);
        batch.start();

        info!(
            "Worker node {} ready (cache capacity {}, max batch {}, batch timeout {:?})",
            node_id, config.cache_capacity, config.batch.max_batch_size, config.batch.batch_timeout
        );

        Self {
            node_id,
            cache: LruCache::new(config.cache_capacity),
            batch,
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Serves one inference request.
    ///
    /// Cache hit: the stored output, `cached = true`, synthetic latency.
    /// Miss: the request rides the next batch; its output fills the cache.
    pub async fn handle_infer(&self, request: InferRequest) -> Result<InferResponse> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let fingerprint = Fingerprint::of(&request.input_data);

        if let Some(output) = self.cache.get(&fingerprint) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(InferResponse::cached(
                request.request_id,
                output,
                self.node_id.clone(),
                CACHE_HIT_LATENCY_US,
            ));
        }

        let response = self.batch.process(request).await?;
        self.cache.put(fingerprint, response.output_data.clone());
        Ok(response)
    }

    /// The health document served at `GET /health`.
    pub fn health(&self) -> WorkerHealth {
        WorkerHealth {
            healthy: true,
            node_id: self.node_id.clone(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_size: self.cache.size() as u64,
            cache_hit_rate: self.cache.hit_rate(),
            batch_processor: self.batch.stats(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Stops the batch worker; queued requests complete with `Cancelled`.
    pub async fn shutdown(&self) {
        self.batch.stop().await;
    }
}
