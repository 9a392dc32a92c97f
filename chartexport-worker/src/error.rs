//! Error types for worker supervision

use thiserror::Error;

/// Result alias used throughout the crate
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Failures surfaced by a [`crate::Worker`]
///
/// Callers never see raw transport errors; every failure is classified into
/// one of these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The process could not be started or never signalled readiness
    #[error("Worker failed to start: {0}")]
    Startup(String),

    /// Connecting to or reading from the worker exceeded its configured bound
    #[error("Socket timeout: {0}")]
    SocketTimeout(String),

    /// The job exceeded its absolute budget
    #[error("Job timeout: {0}")]
    JobTimeout(String),

    /// Any other failure talking to the worker or decoding its response
    #[error("Conversion error: {0}")]
    Conversion(String),
}

impl WorkerError {
    /// Whether the job may be retried against a different worker
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SocketTimeout(_) | Self::Conversion(_))
    }

    /// Whether the worker that produced this error should be recycled
    pub fn requires_recycle(&self) -> bool {
        matches!(self, Self::JobTimeout(_) | Self::Startup(_))
    }
}
