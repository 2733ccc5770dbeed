//! # InferMesh CLI Entry Point
//!
//! Main binary for the InferMesh inference serving fabric. Starts either
//! tier of the system:
//!
//! ```bash
//! # Start two workers
//! infermesh worker 9001 node-a models/resnet.onnx
//! infermesh worker 9002 node-b models/resnet.onnx
//!
//! # Start the gateway over them
//! infermesh gateway localhost:9001 localhost:9002
//!
//! # Send a request through the gateway
//! curl -s localhost:8000/infer \
//!   -d '{"request_id":"req-1","input_data":[0.1,0.2]}'
//! ```
//!
//! The model reference may also come from the `MODEL_PATH` environment
//! variable instead of the positional argument.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;

use infermesh_gateway::Gateway;
use infermesh_worker::{SyntheticBackend, WorkerConfig, WorkerNode};

/// Main CLI structure parsed from command-line arguments.
///
/// Uses `argh` for declarative argument parsing. The top-level command
/// dispatches to one of the two subcommands: gateway or worker.
#[derive(FromArgs)]
/// InferMesh - two-tier inference serving fabric
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
///
/// Each variant represents one tier of the system:
///
/// - **Gateway**: route requests across a worker fleet
/// - **Worker**: serve inference behind a cache and a micro-batcher
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Gateway(GatewayArgs),
    Worker(WorkerArgs),
}

/// Arguments for starting the InferMesh gateway.
///
/// The gateway routes `POST /infer` requests across the listed workers
/// by consistent-hashing each request id, with a circuit breaker per
/// worker and deterministic failover. The worker set is fixed for the
/// lifetime of the process; restart the gateway to change the fleet.
///
/// # Example
///
/// ```bash
/// infermesh gateway localhost:9001 localhost:9002 -b 0.0.0.0:8000
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "gateway")]
/// start the routing gateway
struct GatewayArgs {
    /// worker endpoints to route across
    ///
    /// Each entry is a `host:port` pair; an `http://` prefix is accepted
    /// and stripped, since the worker identity is the bare endpoint.
    /// Duplicates are ignored. At least one worker is required, and the
    /// listing order is also the failover order.
    #[argh(positional)]
    workers: Vec<String>,

    /// address to bind the gateway's HTTP server to
    ///
    /// Clients send inference requests to this address. Defaults to
    /// "0.0.0.0:8000" so the gateway is reachable from other machines
    /// out of the box.
    #[argh(option, short = 'b', default = "\"0.0.0.0:8000\".into()")]
    bind: String,
}

/// Arguments for starting an InferMesh worker node.
///
/// Workers serve `POST /infer` and `GET /health`. Each request is
/// answered from the result cache when its payload has been seen
/// before; misses are coalesced into batched backend calls.
///
/// # Example
///
/// ```bash
/// infermesh worker 9001 node-a models/resnet.onnx
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "worker")]
/// start a worker node
struct WorkerArgs {
    /// port for the worker's HTTP server
    ///
    /// The gateway must be configured with the matching `host:port`
    /// endpoint for requests to reach this node.
    #[argh(positional)]
    port: u16,

    /// identifier this node reports in responses and health
    ///
    /// An opaque string echoed back as `node_id` in every `/infer`
    /// response and in the `/health` document; useful for telling
    /// workers apart behind the gateway.
    #[argh(positional)]
    node_id: String,

    /// model reference to load into the backend
    ///
    /// Precedence: this positional argument, then the MODEL_PATH
    /// environment variable. Startup fails if neither is set. The
    /// reference seeds the backend deterministically, so workers given
    /// the same model produce identical outputs for identical inputs.
    #[argh(positional)]
    model_ref: Option<String>,

    /// host to bind the worker's HTTP server to
    ///
    /// Combined with the positional port to form the bind address.
    /// Defaults to "0.0.0.0" so the gateway can reach the worker from
    /// another machine; use "127.0.0.1" to keep a node local-only.
    #[argh(option, long = "bind-host", default = "\"0.0.0.0\".into()")]
    bind_host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default log level INFO; RUST_LOG overrides.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Gateway(args) => run_gateway(args).await,
        Commands::Worker(args) => run_worker(args).await,
    }
}

async fn run_gateway(args: GatewayArgs) -> Result<()> {
    if args.workers.is_empty() {
        anyhow::bail!("at least one worker endpoint is required");
    }

    tracing::info!("Starting InferMesh gateway");
    tracing::info!("Workers: {:?}", args.workers);

    let gateway = Gateway::new(args.workers)?;
    tracing::info!(
        "Gateway ready with {} workers, circuit breakers enabled",
        gateway.worker_count()
    );

    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}: {}", args.bind, e))?;

    infermesh_gateway::HttpServer::new(Arc::new(gateway))
        .run(addr)
        .await?;

    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<()> {
    // Model reference: positional argument, then MODEL_PATH.
    let model_ref = match args.model_ref.or_else(|| std::env::var("MODEL_PATH").ok()) {
        Some(model_ref) => model_ref,
        None => anyhow::bail!(
            "no model reference provided; pass it as the third argument or set MODEL_PATH"
        ),
    };

    let config = WorkerConfig::default();
    tracing::info!("Starting InferMesh worker {}", args.node_id);
    tracing::info!("Model: {}", model_ref);
    tracing::info!("Cache capacity: {} entries", config.cache_capacity);
    tracing::info!(
        "Batching: up to {} requests per batch, {:?} timeout",
        config.batch.max_batch_size,
        config.batch.batch_timeout
    );

    let backend = Arc::new(SyntheticBackend::new(model_ref));
    let node = Arc::new(WorkerNode::new(args.node_id, backend, config));

    let addr: SocketAddr = format!("{}:{}", args.bind_host, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    infermesh_worker::HttpServer::new(node).run(addr).await?;

    Ok(())
}
