//! InferMesh Request Types
//!
//! This module defines the inference request structure shared by the
//! gateway and worker HTTP surfaces.

use serde::{Deserialize, Serialize};

/// An inference request as accepted by `POST /infer` on a worker.
///
/// # Request Flow
///
/// 1. A client posts a request to the gateway with an opaque `request_id`
/// 2. The gateway hashes the id onto the ring and forwards the body to
///    the selected worker
/// 3. The worker answers from its result cache, or batches the request
///    into the next backend call
///
/// The `request_id` is the routing key: identical ids land on the same
/// worker whenever that worker is healthy, which is what keeps cache
/// residency local to a node.
///
/// # Example
///
/// ```
/// use infermesh_common::InferRequest;
///
/// let request = InferRequest::new("req-42", vec![0.5, 1.5]);
/// assert_eq!(request.request_id, "req-42");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferRequest {
    /// Opaque request identifier, used as the consistent-hashing key
    pub request_id: String,
    /// Flat input payload for the backend
    pub input_data: Vec<f32>,
}

impl InferRequest {
    /// Creates a new inference request.
    pub fn new(request_id: impl Into<String>, input_data: Vec<f32>) -> Self {
        Self {
            request_id: request_id.into(),
            input_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_creation() {
        let req = InferRequest::new("r1", vec![1.0, 2.0]);
        assert_eq!(req.request_id, "r1");
        assert_eq!(req.input_data, vec![1.0, 2.0]);
    }

    #[test]
    fn test_request_serialization_round_trip() {
        let req = InferRequest::new("r2", vec![0.25, -1.0]);
        let serialized = serde_json::to_string(&req).unwrap();
        let deserialized: InferRequest = serde_json::from_str(&serialized).unwrap();
        assert_eq!(req, deserialized);
    }

    #[test]
    fn test_request_field_names_on_the_wire() {
        let req = InferRequest::new("r3", vec![]);
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("request_id").is_some());
        assert!(value.get("input_data").is_some());
    }
}
