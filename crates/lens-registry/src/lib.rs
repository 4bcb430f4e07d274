//! Lens result registry
//!
//! The canonical, deduplicated, ranked collection of model results for each
//! open dataset:
//! - **merge**: reconcile a newly arrived analysis with the cached one
//!   without losing or duplicating models
//! - **ResultRegistry**: explicitly owned store that survives view-layer
//!   remounts, hydrating lazily from persisted snapshots
//!
//! Users run analysis repeatedly (a baseline run, then "train additional
//! models"); replacing state naively would silently discard models the user
//! is still looking at. The overlay-by-key merge keeps at most one entry
//! per model name and a deterministic rank order.

#![warn(unreachable_pub)]

pub mod merge;
pub mod registry;

// Re-exports
pub use merge::merge;
pub use registry::ResultRegistry;
