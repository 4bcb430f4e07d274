//! Engine facade
//!
//! The single object the UI layer talks to. Owns the registry, the guard,
//! and the coordinator; created at session start, told to clear on dataset
//! switch, dropped at session end.

use crate::coordinator::{JobCoordinator, ProgressConfig, StartOutcome};
use crate::error::EngineError;
use crate::transport::AnalysisTransport;
use lens_model::{AnalysisRequest, AnalysisState, DatasetId, JobSnapshot, JobStatus, SessionId};
use lens_registry::ResultRegistry;
use lens_store::{KeyValueStore, StorageConfig, StorageGuard};
use std::sync::Arc;

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Storage guard thresholds and namespace
    pub storage: StorageConfig,
    /// Progress ticker shape
    pub progress: ProgressConfig,
    /// Resume this storage session instead of minting a fresh one
    ///
    /// A reload hands the previous session id back in so persisted
    /// snapshots stay reachable; `None` starts a new session.
    pub session: Option<SessionId>,
}

/// Client core of the analysis dashboard
pub struct AnalysisEngine {
    session: SessionId,
    registry: Arc<ResultRegistry>,
    coordinator: JobCoordinator,
}

impl AnalysisEngine {
    /// Create an engine with default configuration
    pub fn new(transport: Arc<dyn AnalysisTransport>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(transport, store, EngineConfig::default())
    }

    /// Create an engine with explicit configuration
    pub fn with_config(
        transport: Arc<dyn AnalysisTransport>,
        store: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> Self {
        let session = config.session.unwrap_or_default();
        let guard = Arc::new(StorageGuard::with_config(store, session, config.storage));
        let registry = Arc::new(ResultRegistry::new(guard));
        let coordinator = JobCoordinator::new(registry.clone(), transport, config.progress);

        tracing::info!(%session, "analysis engine created");
        Self {
            session,
            registry,
            coordinator,
        }
    }

    /// Session identity of this engine instance
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Run an analysis and wait for the merged result
    ///
    /// A duplicate call while the dataset's job is in flight is a no-op and
    /// reports [`EngineError::AlreadyRunning`] with the live snapshot, so
    /// callers can tell "started" from "already under way".
    pub async fn run_analysis(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisState, EngineError> {
        let outcome = self.coordinator.start(request);
        let handle = match outcome {
            StartOutcome::AlreadyRunning(handle) => {
                return Err(EngineError::AlreadyRunning(handle.snapshot()));
            }
            StartOutcome::Started(handle) => handle,
        };

        let terminal = handle.wait().await;
        match terminal.status {
            JobStatus::Succeeded => match self.registry.get(handle.dataset_id()).await {
                Some(state) => Ok(state),
                None => Err(EngineError::Transport(
                    "result was cleared before it could be returned".to_string(),
                )),
            },
            JobStatus::Failed => Err(EngineError::Transport(
                terminal
                    .error
                    .unwrap_or_else(|| "transport failed without a message".to_string()),
            )),
            _ => Err(EngineError::Cancelled),
        }
    }

    /// Last known analysis state for a dataset, hydrating from storage
    pub async fn get_cached_state(&self, dataset_id: &DatasetId) -> Option<AnalysisState> {
        self.registry.get(dataset_id).await
    }

    /// Drop the cached and persisted state for a dataset
    pub async fn clear_cache(&self, dataset_id: &DatasetId) {
        self.registry.clear(dataset_id).await;
    }

    /// Cancel the dataset's running job, if any
    pub fn cancel_current_job(&self, dataset_id: &DatasetId) -> bool {
        self.coordinator.cancel(dataset_id)
    }

    /// Observable job state for a dataset
    #[must_use]
    pub fn job_snapshot(&self, dataset_id: &DatasetId) -> JobSnapshot {
        self.coordinator.snapshot(dataset_id)
    }

    /// Reclaim persisted snapshots left behind by earlier sessions
    pub async fn cleanup_stale_sessions(&self) -> usize {
        self.registry.guard().cleanup().await
    }

    /// The registry backing this engine
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ResultRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
