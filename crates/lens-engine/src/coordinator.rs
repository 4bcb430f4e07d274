//! Analysis job coordination
//!
//! Owns the request lifecycle for "run analysis": at most one job per
//! dataset at a time, simulated progress while the transport is in flight,
//! merge-and-persist on completion, terminal state reporting.
//!
//! Progress is cosmetic. The remote job's true duration is unknown, so a
//! ticker walks a decelerating curve toward a ceiling strictly below 100;
//! only a real response sets 100.

use crate::transport::AnalysisTransport;
use chrono::Utc;
use dashmap::DashMap;
use lens_model::{AnalysisRequest, DatasetId, JobSnapshot, JobStatus};
use lens_registry::ResultRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Ticker configuration
#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    /// Interval between ticks
    pub tick: Duration,
    /// Fraction of the remaining distance covered per tick
    pub step_fraction: f64,
    /// Upper bound while running; must stay below 100
    pub ceiling: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            step_fraction: 0.18,
            ceiling: 95,
        }
    }
}

/// Observer handle for one started job
#[derive(Debug, Clone)]
pub struct JobHandle {
    dataset_id: DatasetId,
    rx: watch::Receiver<JobSnapshot>,
}

impl JobHandle {
    /// Dataset this job runs for
    #[inline]
    #[must_use]
    pub fn dataset_id(&self) -> &DatasetId {
        &self.dataset_id
    }

    /// Current observable state
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        self.rx.borrow().clone()
    }

    /// Watch progress and status updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.rx.clone()
    }

    /// Wait for the job to reach a terminal state
    pub async fn wait(&self) -> JobSnapshot {
        let mut rx = self.rx.clone();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }
}

/// Result of asking the coordinator to start a job
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A new job was started
    Started(JobHandle),
    /// A job for this dataset is already in flight; this is its handle
    AlreadyRunning(JobHandle),
}

impl StartOutcome {
    /// Handle for the job that is running, whether or not this call started it
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &JobHandle {
        match self {
            Self::Started(handle) | Self::AlreadyRunning(handle) => handle,
        }
    }

    /// Whether this call started the job
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

struct JobCell {
    /// Bumped on every start and cancel; a completion whose epoch no longer
    /// matches is stale and must be discarded
    epoch: u64,
    state_tx: Arc<watch::Sender<JobSnapshot>>,
    cancel_tx: watch::Sender<bool>,
}

impl JobCell {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(JobSnapshot::idle());
        let (cancel_tx, _) = watch::channel(false);
        Self {
            epoch: 0,
            state_tx: Arc::new(state_tx),
            cancel_tx,
        }
    }
}

/// One-job-per-dataset lifecycle coordinator
pub struct JobCoordinator {
    registry: Arc<ResultRegistry>,
    transport: Arc<dyn AnalysisTransport>,
    progress: ProgressConfig,
    jobs: Arc<DashMap<DatasetId, JobCell>>,
}

impl JobCoordinator {
    /// Create a coordinator merging results into `registry`
    pub fn new(
        registry: Arc<ResultRegistry>,
        transport: Arc<dyn AnalysisTransport>,
        progress: ProgressConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            progress,
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Start a job unless one is already running for the dataset
    ///
    /// A duplicate start is a no-op that returns the live handle, so two
    /// quick calls trigger exactly one transport invocation.
    pub fn start(&self, request: AnalysisRequest) -> StartOutcome {
        let dataset_id = request.dataset_id.clone();
        let mut cell = self
            .jobs
            .entry(dataset_id.clone())
            .or_insert_with(JobCell::new);

        if cell.state_tx.borrow().status.is_running() {
            tracing::debug!(dataset = %dataset_id, "start refused, job already running");
            return StartOutcome::AlreadyRunning(JobHandle {
                dataset_id,
                rx: cell.state_tx.subscribe(),
            });
        }

        cell.epoch += 1;
        let epoch = cell.epoch;
        cell.state_tx.send_replace(JobSnapshot::running(Utc::now()));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cell.cancel_tx = cancel_tx;

        let state_tx = cell.state_tx.clone();
        let rx = cell.state_tx.subscribe();
        drop(cell);

        tracing::info!(dataset = %dataset_id, "analysis job started");
        tokio::spawn(run_job(
            self.jobs.clone(),
            self.registry.clone(),
            self.transport.clone(),
            self.progress,
            request,
            state_tx,
            cancel_rx,
            epoch,
        ));

        StartOutcome::Started(JobHandle { dataset_id, rx })
    }

    /// Cancel the running job for a dataset
    ///
    /// Returns `false` when nothing is running. Cached state is untouched;
    /// a response that still arrives is discarded via the epoch bump.
    pub fn cancel(&self, dataset_id: &DatasetId) -> bool {
        let Some(mut cell) = self.jobs.get_mut(dataset_id) else {
            return false;
        };
        if !cell.state_tx.borrow().status.is_running() {
            return false;
        }

        cell.epoch += 1;
        let _ = cell.cancel_tx.send(true);
        cell.state_tx
            .send_modify(|snapshot| snapshot.status = JobStatus::Cancelled);

        tracing::info!(dataset = %dataset_id, "analysis job cancelled");
        true
    }

    /// Observable state of the dataset's job, `Idle` if none ever ran
    #[must_use]
    pub fn snapshot(&self, dataset_id: &DatasetId) -> JobSnapshot {
        self.jobs
            .get(dataset_id)
            .map(|cell| cell.state_tx.borrow().clone())
            .unwrap_or_else(JobSnapshot::idle)
    }

    /// Whether a job is in flight for the dataset
    #[must_use]
    pub fn is_running(&self, dataset_id: &DatasetId) -> bool {
        self.snapshot(dataset_id).status.is_running()
    }
}

impl std::fmt::Debug for JobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("progress", &self.progress)
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    jobs: Arc<DashMap<DatasetId, JobCell>>,
    registry: Arc<ResultRegistry>,
    transport: Arc<dyn AnalysisTransport>,
    progress: ProgressConfig,
    request: AnalysisRequest,
    state_tx: Arc<watch::Sender<JobSnapshot>>,
    mut cancel_rx: watch::Receiver<bool>,
    epoch: u64,
) {
    let dataset_id = request.dataset_id.clone();

    let ticker_tx = state_tx.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(progress.tick);
        interval.tick().await; // first tick completes immediately
        let ceiling = f64::from(progress.ceiling.min(99));
        let mut simulated = 0.0f64;
        loop {
            interval.tick().await;
            simulated += (ceiling - simulated) * progress.step_fraction;
            let percent = simulated.floor() as u8;
            ticker_tx.send_modify(|snapshot| {
                if snapshot.status.is_running() && percent > snapshot.progress_percent {
                    snapshot.progress_percent = percent;
                }
            });
        }
    });

    let response = tokio::select! {
        response = transport.run(&request) => Some(response),
        _ = cancel_rx.changed() => None,
    };
    ticker.abort();

    let still_current = jobs
        .get(&dataset_id)
        .map(|cell| cell.epoch == epoch)
        .unwrap_or(false);

    match response {
        None => {
            // Cancelled; the cancel path already set the terminal status
            tracing::debug!(dataset = %dataset_id, "transport call dropped after cancel");
        }
        Some(_) if !still_current => {
            tracing::info!(dataset = %dataset_id, "late response discarded, job superseded");
        }
        Some(Ok(state)) => {
            let merged = registry.absorb(state).await;
            state_tx.send_modify(|snapshot| {
                snapshot.status = JobStatus::Succeeded;
                snapshot.progress_percent = 100;
            });
            tracing::info!(
                dataset = %dataset_id,
                models = merged.models.len(),
                "analysis job succeeded"
            );
        }
        Some(Err(e)) => {
            state_tx.send_modify(|snapshot| {
                snapshot.status = JobStatus::Failed;
                snapshot.error = Some(e.to_string());
            });
            tracing::warn!(dataset = %dataset_id, error = %e, "analysis job failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use lens_model::{AnalysisState, ModelResult, SessionId};
    use lens_store::{MemoryStore, StorageGuard};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn test_registry() -> Arc<ResultRegistry> {
        Arc::new(ResultRegistry::new(Arc::new(StorageGuard::new(
            Arc::new(MemoryStore::new()),
            SessionId::new(),
        ))))
    }

    fn fast_progress() -> ProgressConfig {
        ProgressConfig {
            tick: Duration::from_millis(5),
            step_fraction: 0.18,
            ceiling: 95,
        }
    }

    /// Blocks until released, counting invocations
    struct GatedTransport {
        calls: AtomicUsize,
        gate: Notify,
        result: AnalysisState,
    }

    impl GatedTransport {
        fn new(result: AnalysisState) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                result,
            }
        }
    }

    #[async_trait]
    impl AnalysisTransport for GatedTransport {
        async fn run(&self, _request: &AnalysisRequest) -> Result<AnalysisState, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(self.result.clone())
        }
    }

    fn sample_state(dataset: &str) -> AnalysisState {
        AnalysisState::new(DatasetId::new(dataset))
            .with_models(vec![ModelResult::new("forest", 0.9)])
    }

    #[tokio::test]
    async fn duplicate_start_invokes_transport_once() {
        let transport = Arc::new(GatedTransport::new(sample_state("d")));
        let coordinator =
            JobCoordinator::new(test_registry(), transport.clone(), fast_progress());

        let first = coordinator.start(AnalysisRequest::new("d"));
        // Let the spawned job reach the transport
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = coordinator.start(AnalysisRequest::new("d"));

        assert!(first.is_started());
        assert!(!second.is_started());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        transport.gate.notify_one();
        let terminal = first.handle().wait().await;
        assert_eq!(terminal.status, JobStatus::Succeeded);
        assert_eq!(terminal.progress_percent, 100);
    }

    #[tokio::test]
    async fn datasets_run_concurrently() {
        let transport = Arc::new(GatedTransport::new(sample_state("x")));
        let coordinator =
            JobCoordinator::new(test_registry(), transport.clone(), fast_progress());

        coordinator.start(AnalysisRequest::new("x"));
        coordinator.start(AnalysisRequest::new("y"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(coordinator.is_running(&"x".into()));
        assert!(coordinator.is_running(&"y".into()));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn progress_stays_below_100_while_running() {
        let transport = Arc::new(GatedTransport::new(sample_state("d")));
        let coordinator =
            JobCoordinator::new(test_registry(), transport.clone(), fast_progress());

        let outcome = coordinator.start(AnalysisRequest::new("d"));
        tokio::time::sleep(Duration::from_millis(60)).await;

        let snapshot = outcome.handle().snapshot();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(snapshot.progress_percent > 0);
        assert!(snapshot.progress_percent < 100);

        transport.gate.notify_one();
        let terminal = outcome.handle().wait().await;
        assert_eq!(terminal.progress_percent, 100);
    }

    #[tokio::test]
    async fn progress_is_monotonic() {
        let transport = Arc::new(GatedTransport::new(sample_state("d")));
        let coordinator =
            JobCoordinator::new(test_registry(), transport.clone(), fast_progress());

        let outcome = coordinator.start(AnalysisRequest::new("d"));
        let mut last = 0u8;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let percent = outcome.handle().snapshot().progress_percent;
            assert!(percent >= last);
            last = percent;
        }
        transport.gate.notify_one();
        outcome.handle().wait().await;
    }

    #[tokio::test]
    async fn cancel_stops_job_and_discards_late_response() {
        let registry = test_registry();
        let transport = Arc::new(GatedTransport::new(sample_state("d")));
        let coordinator = JobCoordinator::new(registry.clone(), transport.clone(), fast_progress());

        let outcome = coordinator.start(AnalysisRequest::new("d"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(coordinator.cancel(&"d".into()));
        // Releasing the gate now must not resurrect the job
        transport.gate.notify_one();

        let terminal = outcome.handle().wait().await;
        assert_eq!(terminal.status, JobStatus::Cancelled);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.get(&"d".into()).await.is_none());
    }

    #[tokio::test]
    async fn cancel_without_running_job_is_noop() {
        let transport = Arc::new(GatedTransport::new(sample_state("d")));
        let coordinator = JobCoordinator::new(test_registry(), transport, fast_progress());

        assert!(!coordinator.cancel(&"d".into()));
        assert_eq!(coordinator.snapshot(&"d".into()).status, JobStatus::Idle);
    }

    #[tokio::test]
    async fn restart_after_terminal_state_is_allowed() {
        let transport = Arc::new(GatedTransport::new(sample_state("d")));
        let coordinator =
            JobCoordinator::new(test_registry(), transport.clone(), fast_progress());

        let first = coordinator.start(AnalysisRequest::new("d"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.gate.notify_one();
        first.handle().wait().await;

        let second = coordinator.start(AnalysisRequest::new("d"));
        assert!(second.is_started());
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.gate.notify_one();
        let terminal = second.handle().wait().await;
        assert_eq!(terminal.status, JobStatus::Succeeded);
    }
}
