//! Lens domain types
//!
//! Shared vocabulary for the analysis core:
//! - Dataset and session identity
//! - Model results and the cached analysis state
//! - Analysis requests sent to the remote service
//! - Job lifecycle status and observable snapshots
//!
//! # Example
//!
//! ```rust
//! use lens_model::{AnalysisState, DatasetId, ModelResult};
//!
//! let state = AnalysisState::new(DatasetId::new("housing"))
//!     .with_models(vec![ModelResult::new("random_forest", 0.91)]);
//!
//! assert_eq!(state.models[0].model_name, "random_forest");
//! ```

#![warn(unreachable_pub)]

pub mod ids;
pub mod job;
pub mod request;
pub mod result;

// Re-exports for convenience
pub use ids::{DatasetId, SessionId};
pub use job::{JobSnapshot, JobStatus};
pub use request::AnalysisRequest;
pub use result::{AnalysisState, ModelResult};
