//! InferMesh Gateway
//!
//! This crate provides the routing tier of the InferMesh serving fabric.
//! The gateway is stateless: it holds no inference results, only the
//! routing structures needed to pick a worker for each request.
//!
//! # Architecture
//!
//! The gateway is responsible for:
//! - Mapping each request's `request_id` onto a worker via a consistent
//!   hash ring with virtual nodes ([`HashRing`])
//! - Gating every attempt through a per-worker circuit breaker
//!   ([`CircuitBreaker`]) so unhealthy workers are skipped quickly
//! - Failing over across the remaining workers in a deterministic order
//!   when the primary declines or fails ([`Gateway`])
//! - Serving `POST /infer` and `GET /stats` over HTTP ([`HttpServer`])
//!
//! # Why primary-plus-failover
//!
//! Routing by `request_id` keeps identical requests on the same worker
//! whenever that worker is healthy, which is what makes the workers'
//! result caches effective. Failover preserves availability without
//! giving up that locality for healthy keys.

pub mod breaker;
pub mod http_server;
pub mod ring;
pub mod router;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use http_server::HttpServer;
pub use ring::HashRing;
pub use router::{Gateway, GatewayConfig};
