//! Storage errors
//!
//! The quota condition is its own variant so the guard's retry policy can
//! key off it; every other failure is terminal for the write that hit it.

/// Errors surfaced by store backends and the guard
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot fit the value
    #[error("quota exceeded: {needed_bytes} bytes would not fit")]
    QuotaExceeded {
        /// Size of the rejected value
        needed_bytes: usize,
    },

    /// Payload could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this is the quota condition the retry policy recovers from
    #[inline]
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
