//! InferMesh Protocol Definitions
//!
//! This module defines the core protocol types exchanged between clients,
//! the gateway, and worker nodes, along with the shared error type.
//!
//! # Protocol Types
//!
//! The protocol uses JSON for serialization with the following core types:
//!
//! - **[`InferRequest`]**: an inference request with an opaque request id
//!   and a flat float payload
//! - **[`InferResponse`]**: the worker's answer, carrying the output
//!   vector, the serving node, and cache provenance
//! - **[`WorkerHealth`]** / **[`GatewayStats`]**: the documents served by
//!   `GET /health` and `GET /stats`
//! - **[`MeshError`]**: error type shared across the workspace
//!
//! # Error Handling
//!
//! Errors split into two classes: conditions the gateway recovers from
//! locally by failing over to another worker (transport failures, breaker
//! denials), and conditions surfaced to the caller (backend failures,
//! short batch responses). See [`MeshError::is_recoverable`].

pub mod error;
pub mod requests;
pub mod responses;
pub mod stats;


pub use error::{MeshError, Result};
pub use requests::InferRequest;
pub use responses::InferResponse;
pub use stats::{BatchStats, BreakerStats, GatewayStats, WorkerHealth};
