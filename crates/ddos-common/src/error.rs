//! Startup error taxonomy.
//!
//! Only startup failures are propagated as `Result`s. Runtime anomalies
//! (NIC drops, partially-updated shard counters, malformed packets,
//! predictor timeouts) are handled at the smallest possible scope and
//! surfaced through counters/log lines instead.

use thiserror::Error;

/// Fatal startup error. The process aborts with a diagnostic and a
/// distinct non-zero exit code per variant.
#[derive(Error, Debug)]
pub enum AppError {
    /// NIC / packet-source initialisation failed.
    #[error("NIC initialisation failed: {0}")]
    NicInit(String),

    /// RX queue count does not match the worker core list.
    #[error("queue setup failed: {0}")]
    QueueSetup(String),

    /// Hugepage-backed buffer pool allocation failed.
    #[error("memory pool allocation failed: {0}")]
    MemoryPool(String),

    /// Pinning a worker or coordinator thread to a core failed.
    #[error("core affinity binding failed for core {core}: {reason}")]
    CoreAffinity { core: usize, reason: String },

    /// The optional ML model file could not be loaded.
    #[error("ML model load failed: {0}")]
    ModelLoad(String),

    /// The configuration surface (CLI flags / config file) was invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure while reading config or model files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Distinct non-zero process exit code per failure class, so a
    /// supervisor can distinguish startup failure modes without
    /// parsing the diagnostic string.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NicInit(_) => 10,
            AppError::QueueSetup(_) => 11,
            AppError::MemoryPool(_) => 12,
            AppError::CoreAffinity { .. } => 13,
            AppError::ModelLoad(_) => 14,
            AppError::Config(_) => 15,
            AppError::Io(_) => 16,
        }
    }
}

/// Result type for startup-time fallible operations.
pub type AppResult<T> = Result<T, AppError>;

/// Error returned by a [`Predictor`](crate) implementation. These
/// never propagate past the detection engine: on `Err` the
/// coordinator logs a warning and elides ML augmentation for that tick.
#[derive(Error, Debug, Clone)]
pub enum PredictError {
    #[error("predictor exceeded its latency budget ({0:?})")]
    Timeout(std::time::Duration),

    #[error("predictor failed: {0}")]
    Failed(String),
}
