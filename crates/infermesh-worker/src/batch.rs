//! Dynamic micro-batching for backend calls.
//!
//! The batch processor converts a high-rate stream of single requests
//! into fewer, larger backend calls. Callers submit one request at a time
//! through [`BatchProcessor::process`] and block on a one-shot waiter; a
//! single worker task drains the queue into batches bounded by
//! `max_batch_size` OR by the age of the oldest queued request, invokes
//! the batch function, and fans the responses back out to the waiters by
//! position.
//!
//! The timeout bounds worst-case added latency even under low load; the
//! size bound stops batches growing without limit under bursts.
//!
//! # Ordering
//!
//! Batches are FIFO prefixes of the queue, so the batch function sees
//! requests in enqueue order and must return responses in the same order.
//!
//! # Failure containment
//!
//! A batch function that errors or panics poisons only its own batch:
//! every waiter in it receives the error, and the worker task carries on
//! with the next batch. A batch function that returns fewer responses
//! than requests fails the unmatched tail with
//! [`MeshError::MissingResponse`] instead of leaving waiters hanging.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, warn};

use infermesh_common::{BatchStats, MeshError, Result};

/// The batched compute call. Must return responses in request order.
pub type BatchFn<Req, Resp> = Arc<dyn Fn(Vec<Req>) -> Result<Vec<Resp>> + Send + Sync>;

/// Batch processor configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Upper bound on batch size
    ///
    /// Default: 32
    pub max_batch_size: usize,
    /// Upper bound on how long the oldest queued request may wait
    ///
    /// Default: 20 milliseconds
    pub batch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            batch_timeout: Duration::from_millis(20),
        }
    }
}

/// A queued request waiting for its batch.
struct PendingSlot<Req, Resp> {
    request: Req,
    waiter: oneshot::Sender<Result<Resp>>,
    enqueued_at: Instant,
}

/// Counters plus the running mean of batch sizes.
///
/// The counters are atomics; the mean is guarded by a mutex because its
/// update reads the batch count and divides, which must not interleave
/// with another batch being recorded.
struct BatchMetrics {
    total_requests: AtomicU64,
    total_batches: AtomicU64,
    timeout_batches: AtomicU64,
    full_batches: AtomicU64,
    avg_batch_size: StdMutex<f64>,
}

impl BatchMetrics {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_batches: AtomicU64::new(0),
            timeout_batches: AtomicU64::new(0),
            full_batches: AtomicU64::new(0),
            avg_batch_size: StdMutex::new(0.0),
        }
    }

    fn record_batch(&self, size: usize, timed_out: bool) {
        let mut avg = self.avg_batch_size.lock().expect("metrics mutex poisoned");
        let n = self.total_batches.fetch_add(1, Ordering::Relaxed) + 1;
        if timed_out {
            self.timeout_batches.fetch_add(1, Ordering::Relaxed);
        } else {
            self.full_batches.fetch_add(1, Ordering::Relaxed);
        }
        *avg = (*avg * (n - 1) as f64 + size as f64) / n as f64;
    }

    fn snapshot(&self) -> BatchStats {
        BatchStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_batches: self.total_batches.load(Ordering::Relaxed),
            timeout_batches: self.timeout_batches.load(Ordering::Relaxed),
            full_batches: self.full_batches.load(Ordering::Relaxed),
            avg_batch_size: *self.avg_batch_size.lock().expect("metrics mutex poisoned"),
        }
    }
}

struct Shared<Req, Resp> {
    config: BatchConfig,
    queue: Mutex<VecDeque<PendingSlot<Req, Resp>>>,
    notify: Notify,
    running: AtomicBool,
    batch_fn: BatchFn<Req, Resp>,
    metrics: BatchMetrics,
}

/// Producer/consumer batcher with one worker task.
///
/// Lifecycle: [`start`](Self::start) spawns the worker,
/// [`stop`](Self::stop) joins it. Every request accepted between the two
/// is completed exactly once: with a response, a typed error, or
/// [`MeshError::Cancelled`] at shutdown.
pub struct BatchProcessor<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
    worker: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<Req, Resp> BatchProcessor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Creates a stopped processor.
    ///
    /// # Panics
    ///
    /// Panics if `max_batch_size` is zero or `batch_timeout` is zero.
    pub fn new(config: BatchConfig, batch_fn: BatchFn<Req, Resp>) -> Self {
        assert!(config.max_batch_size > 0, "max_batch_size must be positive");
        assert!(
            config.batch_timeout > Duration::ZERO,
            "batch_timeout must be positive"
        );

        Self {
            shared: Arc::new(Shared {
                config,
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                running: AtomicBool::new(false),
                batch_fn,
                metrics: BatchMetrics::new(),
            }),
            worker: StdMutex::new(None),
        }
    }

    /// Spawns the worker task. A second call is a no-op.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(worker_loop(shared));
        *self.worker.lock().expect("worker handle mutex poisoned") = Some(handle);
    }

    /// Stops the worker and joins it.
    ///
    /// Requests still queued when the worker exits are completed with
    /// [`MeshError::Cancelled`]; none are left pending.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.notify.notify_one();

        let handle = self
            .worker
            .lock()
            .expect("worker handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Submits one request and waits for its batched response.
    ///
    /// Returns [`MeshError::Cancelled`] when the processor is not running
    /// or shuts down while the request is queued.
    pub async fn process(&self, request: Req) -> Result<Resp> {
        let (tx, rx) = oneshot::channel();

        {
            // The running check shares the queue lock with the shutdown
            // drain, so a request is either drained or rejected, never
            // left behind in a stopped queue.
            let mut queue = self.shared.queue.lock().await;
            if !self.shared.running.load(Ordering::SeqCst) {
                return Err(MeshError::Cancelled);
            }
            queue.push_back(PendingSlot {
                request,
                waiter: tx,
                enqueued_at: Instant::now(),
            });
        }

        self.shared.metrics.total_requests.fetch_add(1, Ordering::Relaxed);
        self.shared.notify.notify_one();

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(MeshError::Cancelled),
        }
    }

    /// Counter snapshot for the health surface.
    pub fn stats(&self) -> BatchStats {
        self.shared.metrics.snapshot()
    }
}

/// What the worker decided to do after inspecting the queue.
enum Step<Req, Resp> {
    Dispatch(Vec<PendingSlot<Req, Resp>>, bool),
    WaitForWork,
    WaitRemaining(Duration),
}

async fn worker_loop<Req, Resp>(shared: Arc<Shared<Req, Resp>>)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    debug!("batch worker started");

    while shared.running.load(Ordering::SeqCst) {
        let step = {
            let mut queue = shared.queue.lock().await;
            if queue.is_empty() {
                Step::WaitForWork
            } else if queue.len() >= shared.config.max_batch_size {
                let batch = drain_prefix(&mut queue, shared.config.max_batch_size);
                Step::Dispatch(batch, false)
            } else {
                let oldest_age = queue
                    .front()
                    .map(|slot| slot.enqueued_at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if oldest_age >= shared.config.batch_timeout {
                    let batch = drain_prefix(&mut queue, shared.config.max_batch_size);
                    Step::Dispatch(batch, true)
                } else {
                    Step::WaitRemaining(shared.config.batch_timeout - oldest_age)
                }
            }
        };

        match step {
            Step::Dispatch(batch, timed_out) => dispatch(&shared, batch, timed_out).await,
            Step::WaitForWork => shared.notify.notified().await,
            Step::WaitRemaining(remaining) => {
                tokio::select! {
                    _ = shared.notify.notified() => {}
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }
    }

    // Shutdown: complete everything still queued. New submissions are
    // rejected under the same lock, so nothing can slip in behind the
    // drain.
    let drained: Vec<PendingSlot<Req, Resp>> = {
        let mut queue = shared.queue.lock().await;
        queue.drain(..).collect()
    };
    if !drained.is_empty() {
        debug!("cancelling {} queued requests at shutdown", drained.len());
    }
    for slot in drained {
        let _ = slot.waiter.send(Err(MeshError::Cancelled));
    }

    debug!("batch worker stopped");
}

fn drain_prefix<Req, Resp>(
    queue: &mut VecDeque<PendingSlot<Req, Resp>>,
    max: usize,
) -> Vec<PendingSlot<Req, Resp>> {
    let take = max.min(queue.len());
    queue.drain(..take).collect()
}

/// Runs the batch function and fans results out to the waiters.
async fn dispatch<Req, Resp>(shared: &Shared<Req, Resp>, batch: Vec<PendingSlot<Req, Resp>>, timed_out: bool)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let size = batch.len();
    let mut requests = Vec::with_capacity(size);
    let mut waiters = Vec::with_capacity(size);
    for slot in batch {
        requests.push(slot.request);
        waiters.push(slot.waiter);
    }

    // The blocking pool isolates the call twice over: backend compute
    // cannot stall the async runtime, and a panic surfaces as a join
    // error instead of taking the worker task down.
    let batch_fn = Arc::clone(&shared.batch_fn);
    let outcome = tokio::task::spawn_blocking(move || batch_fn(requests)).await;

    match outcome {
        Ok(Ok(responses)) => {
            let returned = responses.len();
            let mut responses = responses.into_iter();
            for waiter in waiters {
                let result = match responses.next() {
                    Some(response) => Ok(response),
                    None => Err(MeshError::MissingResponse),
                };
                // A waiter whose caller went away is fine to miss.
                let _ = waiter.send(result);
            }
            if returned < size {
                warn!(
                    "batch function returned {} responses for {} requests",
                    returned, size
                );
            }
        }
        Ok(Err(e)) => {
            let message = match e {
                MeshError::Backend(m) => m,
                other => other.to_string(),
            };
            warn!("batch function failed: {}", message);
            for waiter in waiters {
                let _ = waiter.send(Err(MeshError::Backend(message.clone())));
            }
        }
        Err(join_error) => {
            let message = format!("batch function panicked: {}", join_error);
            warn!("{}", message);
            for waiter in waiters {
                let _ = waiter.send(Err(MeshError::Backend(message.clone())));
            }
        }
    }

    shared.metrics.record_batch(size, timed_out);
}
