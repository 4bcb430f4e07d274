//! Engine simulator
//!
//! Drives the full engine wiring against a seeded fake analysis service and
//! a bounded in-memory store. Used by the `lens simulate` subcommand to
//! exercise merge, persistence, and quota recovery end to end,
//! reproducibly.

use crate::engine::{AnalysisEngine, EngineConfig};
use crate::coordinator::ProgressConfig;
use crate::error::{EngineError, TransportError};
use crate::transport::AnalysisTransport;
use async_trait::async_trait;
use lens_model::{AnalysisRequest, AnalysisState, DatasetId, ModelResult};
use lens_store::MemoryStore;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

const MODEL_POOL: &[&str] = &[
    "linear_regression",
    "ridge",
    "lasso",
    "random_forest",
    "gradient_boosting",
    "xgboost",
    "svm",
    "knn",
];

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Distinct datasets cycled through
    pub datasets: usize,
    /// Total analysis runs to attempt
    pub runs: usize,
    /// Probability a run fails at the transport
    pub fail_rate: f64,
    /// Capacity of the bounded store in bytes
    pub capacity_bytes: usize,
    /// Models trained per successful run
    pub models_per_run: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            datasets: 3,
            runs: 12,
            fail_rate: 0.15,
            capacity_bytes: 64 * 1024,
            models_per_run: 3,
        }
    }
}

/// Outcome counters for one simulation
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    /// Runs attempted
    pub runs: usize,
    /// Runs that produced a merged state
    pub succeeded: usize,
    /// Runs that failed at the transport
    pub failed: usize,
    /// Accumulated model count per dataset after all runs
    pub models_by_dataset: Vec<(String, usize)>,
    /// Bytes held by the bounded store at the end
    pub store_used_bytes: usize,
}

/// Seeded fake analysis service
struct SimulatedTransport {
    rng: Mutex<StdRng>,
    fail_rate: f64,
    models_per_run: usize,
}

impl SimulatedTransport {
    fn new(seed: u64, fail_rate: f64, models_per_run: usize) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            fail_rate,
            models_per_run: models_per_run.clamp(1, MODEL_POOL.len()),
        }
    }
}

#[async_trait]
impl AnalysisTransport for SimulatedTransport {
    async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisState, TransportError> {
        let (delay_ms, fails, models) = {
            let mut rng = self.rng.lock();
            let delay_ms = rng.random_range(5..40u64);
            let fails = rng.random_range(0.0..1.0) < self.fail_rate;

            let start = rng.random_range(0..MODEL_POOL.len());
            let models: Vec<ModelResult> = (0..self.models_per_run)
                .map(|i| {
                    let name = MODEL_POOL[(start + i) % MODEL_POOL.len()];
                    ModelResult::new(name, rng.random_range(0.40..0.99))
                        .with_errors(rng.random_range(0.5..3.0), rng.random_range(0.3..2.0))
                })
                .collect();
            (delay_ms, fails, models)
        };

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if fails {
            return Err(TransportError::Network(
                "simulated connection drop".to_string(),
            ));
        }

        let top = models
            .first()
            .map(|m| m.model_name.clone())
            .unwrap_or_default();
        let leaderboard = serde_json::json!({
            "kind": "bar",
            "series": models
                .iter()
                .map(|m| (m.model_name.as_str(), m.metric_primary))
                .collect::<Vec<_>>(),
        });

        let mut state = AnalysisState::new(request.dataset_id.clone())
            .with_models(models)
            .with_insights(format!("strongest candidate this run: {top}"));
        state.charts = Some(leaderboard);
        Ok(state)
    }
}

/// Run a full engine session against the simulated service
pub async fn run_simulation(config: SimulatorConfig) -> SimulationReport {
    let store = Arc::new(MemoryStore::with_capacity_bytes(config.capacity_bytes));
    let transport = Arc::new(SimulatedTransport::new(
        config.seed,
        config.fail_rate,
        config.models_per_run,
    ));
    let engine = AnalysisEngine::with_config(
        transport,
        store.clone(),
        EngineConfig {
            progress: ProgressConfig {
                tick: Duration::from_millis(10),
                ..ProgressConfig::default()
            },
            ..EngineConfig::default()
        },
    );

    engine.cleanup_stale_sessions().await;

    let mut report = SimulationReport {
        runs: config.runs,
        ..SimulationReport::default()
    };

    for run in 0..config.runs {
        let dataset = DatasetId::new(format!("dataset-{}", run % config.datasets.max(1)));
        match engine.run_analysis(AnalysisRequest::new(dataset.clone())).await {
            Ok(state) => {
                report.succeeded += 1;
                tracing::info!(
                    %dataset,
                    models = state.models.len(),
                    top = state.top_model().map(|m| m.model_name.as_str()).unwrap_or("-"),
                    "run complete"
                );
            }
            Err(EngineError::AlreadyRunning(_)) => {
                // Serial driver; nothing should already be running
                tracing::warn!(%dataset, "unexpected concurrent job");
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(%dataset, error = %e, "run failed");
            }
        }
    }

    for index in 0..config.datasets.max(1) {
        let dataset = DatasetId::new(format!("dataset-{index}"));
        let held = engine
            .get_cached_state(&dataset)
            .await
            .map(|state| state.models.len())
            .unwrap_or(0);
        report.models_by_dataset.push((dataset.to_string(), held));
    }
    report.store_used_bytes = store.used_bytes();

    report
}
