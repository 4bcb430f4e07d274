//! Remote analysis contract
//!
//! The engine never talks to the network itself; it drives whatever
//! implements this trait. Cancellation is cooperative: the coordinator
//! drops the in-flight future and discards a response that still lands.

use crate::error::TransportError;
use async_trait::async_trait;
use lens_model::{AnalysisRequest, AnalysisState};

/// One round-trip to the remote analysis service
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Run an analysis and return the resulting state document
    async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisState, TransportError>;
}
