//! Lens storage layer
//!
//! Persistence for cached analysis state:
//! - **KeyValueStore**: the contract the browser-style bounded store fulfils
//! - **MemoryStore** / **FileStore**: reference backends
//! - **StorageGuard**: decides whether a payload may be persisted and
//!   performs the write with a bounded cleanup-and-retry policy
//!
//! # Example
//!
//! ```rust
//! use lens_model::SessionId;
//! use lens_store::{MemoryStore, StorageGuard};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new());
//! let guard = StorageGuard::new(store, SessionId::new());
//!
//! let outcome = guard.try_save(&"d-1".into(), &serde_json::json!({"ok": true})).await;
//! assert!(outcome.persisted());
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod backend;
pub mod error;
pub mod guard;

// Re-exports
pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use error::StoreError;
pub use guard::{
    SaveMethod, SaveOutcome, StorageConfig, StorageDecision, StorageGuard,
    DEFAULT_HARD_LIMIT_BYTES, DEFAULT_WARN_THRESHOLD_BYTES,
};
