//! Lens Engine - analysis job coordination
//!
//! The client core that sits between the dashboard UI and the remote
//! analysis service:
//! - Starts at most one job per dataset and reports its lifecycle
//! - Simulates progress while the remote duration is unknown
//! - Merges completed results into the registry and persists them
//! - Discards late responses after cancellation
//!
//! # Example
//!
//! ```rust,ignore
//! use lens_engine::{AnalysisEngine, AnalysisTransport};
//! use lens_model::AnalysisRequest;
//! use lens_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn AnalysisTransport>) {
//! let engine = AnalysisEngine::new(transport, Arc::new(MemoryStore::new()));
//!
//! let state = engine.run_analysis(AnalysisRequest::new("housing")).await.unwrap();
//! println!("{} models ranked", state.models.len());
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod simulator;
pub mod transport;

// Re-exports for convenience
pub use coordinator::{JobCoordinator, JobHandle, ProgressConfig, StartOutcome};
pub use engine::{AnalysisEngine, EngineConfig};
pub use error::{EngineError, TransportError};
pub use simulator::{run_simulation, SimulationReport, SimulatorConfig};
pub use transport::AnalysisTransport;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
