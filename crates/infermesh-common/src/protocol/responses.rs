use serde::{Deserialize, Serialize};

/// A completed inference, as returned by `POST /infer` on a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferResponse {
    pub request_id: String,
    pub output_data: Vec<f32>,
    /// Identifier of the worker node that served the request
    pub node_id: String,
    /// True when the output came from the result cache
    pub cached: bool,
    /// Per-request inference latency in microseconds
    pub inference_time_us: u64,
}

impl InferResponse {
    /// A response computed by the backend on this call.
    pub fn fresh(
        request_id: impl Into<String>,
        output_data: Vec<f32>,
        node_id: impl Into<String>,
        inference_time_us: u64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            output_data,
            node_id: node_id.into(),
            cached: false,
            inference_time_us,
        }
    }

    /// A response answered from the result cache.
    pub fn cached(
        request_id: impl Into<String>,
        output_data: Vec<f32>,
        node_id: impl Into<String>,
        inference_time_us: u64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            output_data,
            node_id: node_id.into(),
            cached: true,
            inference_time_us,
        }
    }
}
