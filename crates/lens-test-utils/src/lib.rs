//! Testing utilities for the Lens workspace
//!
//! Shared fixtures and a scripted transport for integration tests.

use async_trait::async_trait;
use lens_engine::{AnalysisTransport, TransportError};
use lens_model::{AnalysisRequest, AnalysisState, DatasetId, ModelResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Answer with this state
    Succeed(AnalysisState),
    /// Fail with this network error message
    Fail(String),
}

/// Transport that replays a fixed script, counting invocations
///
/// Responses are consumed front to back; an exhausted script answers with a
/// network error so a test that over-calls fails loudly.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedResponse>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    #[must_use]
    pub fn then_succeed(self, state: AnalysisState) -> Self {
        self.script.lock().push_back(ScriptedResponse::Succeed(state));
        self
    }

    /// Queue a transport failure
    #[must_use]
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(ScriptedResponse::Fail(message.into()));
        self
    }

    /// Sleep this long before every reply
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `run` was invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    async fn run(&self, _request: &AnalysisRequest) -> Result<AnalysisState, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(ScriptedResponse::Succeed(state)) => Ok(state),
            Some(ScriptedResponse::Fail(message)) => Err(TransportError::Network(message)),
            None => Err(TransportError::Network("script exhausted".to_string())),
        }
    }
}

/// Build a state with named scored models
pub fn state_with_models(dataset: &str, models: &[(&str, f64)]) -> AnalysisState {
    AnalysisState::new(DatasetId::new(dataset)).with_models(
        models
            .iter()
            .map(|(name, score)| ModelResult::new(*name, *score))
            .collect(),
    )
}

/// Build a single model result
pub fn model(name: &str, score: f64) -> ModelResult {
    ModelResult::new(name, score)
}
