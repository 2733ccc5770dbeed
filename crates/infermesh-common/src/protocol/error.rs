use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("hash ring is empty")]
    EmptyRing,

    #[error("no workers available")]
    NoWorkers,

    #[error("all workers failed or circuit breakers open")]
    AllWorkersUnavailable,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("batch returned fewer responses than requests")]
    MissingResponse,

    #[error("request cancelled before completion")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshError {
    /// Whether the gateway may absorb this error by trying another worker.
    ///
    /// Transport failures are recovered locally via failover. Backend and
    /// missing-response errors are authoritative and must surface to the
    /// caller; a silent retry could run the same inference twice.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MeshError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, MeshError>;
