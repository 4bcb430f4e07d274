//! Engine errors
//!
//! Only transport-shaped failures interrupt the caller's workflow. Storage
//! degradation is handled inside the guard and never surfaces here.

use lens_model::JobSnapshot;

/// Failure of the remote analysis call
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request never reached the service, or the connection dropped
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with an error
    #[error("analysis service error: {0}")]
    Service(String),
}

/// Terminal outcome surfaced by the engine facade
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The remote run failed; previously cached state is untouched
    #[error("analysis failed: {0}")]
    Transport(String),

    /// The job was cancelled before completion
    #[error("analysis cancelled")]
    Cancelled,

    /// A job for this dataset is already in flight; treated as a no-op
    #[error("an analysis job is already running for this dataset")]
    AlreadyRunning(JobSnapshot),
}

impl From<TransportError> for EngineError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e.to_string())
    }
}
