//! InferMesh Common Types
//!
//! This crate provides the protocol definitions shared by every component
//! of the InferMesh inference serving fabric.
//!
//! # Overview
//!
//! InferMesh is a two-tier serving system: a stateless gateway routes
//! inference requests across a fleet of worker nodes, and each worker
//! fronts an inference backend with a result cache and a micro-batcher.
//! This crate contains the pieces both tiers agree on:
//!
//! - **Wire types**: [`InferRequest`], [`InferResponse`], and the health
//!   and stats documents served over HTTP
//! - **Errors**: the [`MeshError`] type used across the workspace
//!
//! All wire types serialize as JSON with `Content-Type: application/json`.
//!
//! # Example
//!
//! ```
//! use infermesh_common::{InferRequest, InferResponse};
//!
//! let request = InferRequest::new("req-42", vec![0.1, 0.2, 0.3]);
//! let response = InferResponse::fresh(request.request_id.clone(), vec![1.0], "node-a", 120);
//! assert!(!response.cached);
//! ```

pub mod protocol;

pub use protocol::*;
