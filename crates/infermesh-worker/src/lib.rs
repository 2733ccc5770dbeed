//! InferMesh Worker
//!
//! This crate provides the serving tier that actually touches the
//! inference backend. A worker composes two latency stages in front of
//! the backend:
//!
//! 1. A content-addressed LRU result cache ([`LruCache`]), keyed by a
//!    [`Fingerprint`] of the input payload, so repeated inputs are
//!    answered without any compute
//! 2. A dynamic micro-batcher ([`BatchProcessor`]) that coalesces
//!    in-flight single requests into one batched backend call, bounded by
//!    batch size and by a timeout that caps the added latency
//!
//! The backend itself is an external collaborator behind the
//! [`InferenceBackend`] trait; the only assumption made about it is the
//! same-order contract of `batch_predict`.
//!
//! # Main Components
//!
//! - [`WorkerNode`] - the cache -> batcher -> backend composition
//! - [`HttpServer`] - `POST /infer` and `GET /health`
//! - [`SyntheticBackend`] - a deterministic stand-in backend so the
//!   binary and the tests run without a model runtime

pub mod backend;
pub mod batch;
pub mod cache;
pub mod fingerprint;
pub mod http_server;
pub mod node;

pub use backend::{InferenceBackend, SyntheticBackend};
pub use batch::{BatchConfig, BatchProcessor};
pub use cache::LruCache;
pub use fingerprint::Fingerprint;
pub use http_server::HttpServer;
pub use node::{WorkerConfig, WorkerNode};
