//! Storage guard
//!
//! Decides whether a candidate payload may be written to the bounded store
//! and performs the write with a cleanup-and-retry-once policy. The guard
//! owns no domain data; registries hand it payloads and keys.
//!
//! Two thresholds: a hard limit the store would reject anyway, and a lower
//! warning threshold below which writes are allowed. Serialized size can
//! drift between the check and the write when other writers share the
//! store, so the gap between the two absorbs that drift.

use crate::backend::KeyValueStore;
use lens_model::{DatasetId, SessionId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Refuse outright at or above this serialized size
pub const DEFAULT_HARD_LIMIT_BYTES: usize = 4 * 1024 * 1024;

/// Refuse defensively at or above this serialized size
pub const DEFAULT_WARN_THRESHOLD_BYTES: usize = 3 * 1024 * 1024;

/// Guard configuration, fixed at construction
///
/// The thresholds are deliberately not parameters of the save calls; every
/// caller gets the same policy.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Key namespace shared by every session of this application
    pub namespace: String,
    /// Refuse at or above this serialized size
    pub hard_limit_bytes: usize,
    /// Refuse defensively at or above this serialized size
    pub warn_threshold_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: "lens".to_string(),
            hard_limit_bytes: DEFAULT_HARD_LIMIT_BYTES,
            warn_threshold_bytes: DEFAULT_WARN_THRESHOLD_BYTES,
        }
    }
}

/// Result of a safety check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDecision {
    /// Whether the payload may be written
    pub safe: bool,
    /// Serialized size of the candidate
    pub size_bytes: usize,
    /// Human-readable classification
    pub reason: String,
}

/// How a save ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMethod {
    /// Written to the backing store
    Persisted,
    /// Kept in memory only; the store was not usable for this payload
    MemoryOnly,
}

/// Outcome of `try_save`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Where the payload ended up
    pub method: SaveMethod,
    /// Extra detail (refusal reason, cleanup note, backend error)
    pub note: Option<String>,
}

impl SaveOutcome {
    /// Whether the payload reached the backing store
    #[inline]
    #[must_use]
    pub fn persisted(&self) -> bool {
        self.method == SaveMethod::Persisted
    }

    fn persisted_with(note: Option<String>) -> Self {
        Self {
            method: SaveMethod::Persisted,
            note,
        }
    }

    fn memory_only(note: impl Into<String>) -> Self {
        Self {
            method: SaveMethod::MemoryOnly,
            note: Some(note.into()),
        }
    }
}

/// Safety layer in front of the bounded store
pub struct StorageGuard {
    config: StorageConfig,
    session: SessionId,
    store: Arc<dyn KeyValueStore>,
}

impl StorageGuard {
    /// Create a guard with default thresholds
    #[inline]
    pub fn new(store: Arc<dyn KeyValueStore>, session: SessionId) -> Self {
        Self::with_config(store, session, StorageConfig::default())
    }

    /// Create a guard with explicit configuration
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        session: SessionId,
        config: StorageConfig,
    ) -> Self {
        Self {
            config,
            session,
            store,
        }
    }

    /// Session this guard namespaces its keys under
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Guard configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Storage key for a dataset in the current session
    #[must_use]
    pub fn key_for(&self, dataset_id: &DatasetId) -> String {
        format!("{}:{}:{}", self.config.namespace, self.session, dataset_id)
    }

    /// Classify a candidate payload; pure, attempts no write
    pub fn evaluate<T: Serialize>(&self, payload: &T) -> StorageDecision {
        let size_bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                return StorageDecision {
                    safe: false,
                    size_bytes: 0,
                    reason: format!("serialization failed: {e}"),
                }
            }
        };
        self.classify(size_bytes)
    }

    fn classify(&self, size_bytes: usize) -> StorageDecision {
        if size_bytes >= self.config.hard_limit_bytes {
            StorageDecision {
                safe: false,
                size_bytes,
                reason: format!(
                    "payload of {size_bytes} bytes is at or above the hard limit of {} bytes",
                    self.config.hard_limit_bytes
                ),
            }
        } else if size_bytes >= self.config.warn_threshold_bytes {
            StorageDecision {
                safe: false,
                size_bytes,
                reason: format!(
                    "payload of {size_bytes} bytes is within the {}-byte headroom margin",
                    self.config.hard_limit_bytes - self.config.warn_threshold_bytes
                ),
            }
        } else {
            StorageDecision {
                safe: true,
                size_bytes,
                reason: "within limits".to_string(),
            }
        }
    }

    /// Persist a dataset snapshot if it is safe to do so
    ///
    /// Never fails: an unusable store degrades the outcome to `MemoryOnly`.
    /// On a quota rejection specifically, one cleanup pass reclaims entries
    /// left by other sessions and the write is retried exactly once.
    pub async fn try_save<T: Serialize>(
        &self,
        dataset_id: &DatasetId,
        payload: &T,
    ) -> SaveOutcome {
        let serialized = match serde_json::to_string(payload) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(dataset = %dataset_id, error = %e, "snapshot not serializable");
                return SaveOutcome::memory_only(format!("serialization failed: {e}"));
            }
        };

        let decision = self.classify(serialized.len());
        if !decision.safe {
            tracing::warn!(
                dataset = %dataset_id,
                size_bytes = decision.size_bytes,
                "snapshot not persisted: {}",
                decision.reason
            );
            return SaveOutcome::memory_only(decision.reason);
        }

        let key = self.key_for(dataset_id);
        match self.store.set(&key, &serialized).await {
            Ok(()) => {
                tracing::debug!(dataset = %dataset_id, size_bytes = decision.size_bytes, "snapshot persisted");
                SaveOutcome::persisted_with(None)
            }
            Err(e) if e.is_quota_exceeded() => {
                let removed = self.cleanup().await;
                tracing::info!(
                    dataset = %dataset_id,
                    removed,
                    "store full, reclaimed stale entries and retrying"
                );
                match self.store.set(&key, &serialized).await {
                    Ok(()) => SaveOutcome::persisted_with(Some(format!(
                        "persisted after reclaiming {removed} stale entries"
                    ))),
                    Err(retry_err) => {
                        tracing::warn!(dataset = %dataset_id, error = %retry_err, "retry after cleanup failed");
                        SaveOutcome::memory_only(format!(
                            "cleanup did not help: {retry_err}"
                        ))
                    }
                }
            }
            Err(e) => {
                tracing::warn!(dataset = %dataset_id, error = %e, "snapshot not persisted");
                SaveOutcome::memory_only(e.to_string())
            }
        }
    }

    /// Read back the persisted snapshot for a dataset
    ///
    /// Read or parse failures are logged and read as a cache miss.
    pub async fn load<T: DeserializeOwned>(&self, dataset_id: &DatasetId) -> Option<T> {
        let key = self.key_for(dataset_id);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(dataset = %dataset_id, error = %e, "snapshot read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(dataset = %dataset_id, error = %e, "persisted snapshot unreadable");
                None
            }
        }
    }

    /// Drop the persisted snapshot for a dataset
    pub async fn remove(&self, dataset_id: &DatasetId) {
        let key = self.key_for(dataset_id);
        if let Err(e) = self.store.remove(&key).await {
            tracing::warn!(dataset = %dataset_id, error = %e, "snapshot removal failed");
        }
    }

    /// Delete namespace entries left behind by other sessions
    ///
    /// Idempotent; safe to call speculatively at session start. Returns the
    /// number of entries removed.
    pub async fn cleanup(&self) -> usize {
        let namespace_prefix = format!("{}:", self.config.namespace);
        let live_prefix = format!("{}:{}:", self.config.namespace, self.session);

        let keys = match self.store.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "cleanup could not list keys");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            if key.starts_with(&namespace_prefix) && !key.starts_with(&live_prefix) {
                match self.store.remove(&key).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "cleanup removal failed");
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "reclaimed stale session entries");
        }
        removed
    }
}

impl std::fmt::Debug for StorageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGuard")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use pretty_assertions::assert_eq;

    fn small_guard(store: Arc<dyn KeyValueStore>) -> StorageGuard {
        StorageGuard::with_config(
            store,
            SessionId::new(),
            StorageConfig {
                namespace: "lens".to_string(),
                hard_limit_bytes: 100,
                warn_threshold_bytes: 80,
            },
        )
    }

    fn payload_of_serialized_len(len: usize) -> String {
        // A JSON string serializes to its content plus two quotes
        "x".repeat(len - 2)
    }

    #[test]
    fn exactly_hard_limit_is_unsafe() {
        let guard = small_guard(Arc::new(MemoryStore::new()));
        let decision = guard.evaluate(&payload_of_serialized_len(100));
        assert!(!decision.safe);
        assert_eq!(decision.size_bytes, 100);
        assert!(decision.reason.contains("hard limit"));
    }

    #[test]
    fn one_byte_under_warning_is_safe() {
        let guard = small_guard(Arc::new(MemoryStore::new()));
        let decision = guard.evaluate(&payload_of_serialized_len(79));
        assert!(decision.safe);
        assert_eq!(decision.size_bytes, 79);
    }

    #[test]
    fn warning_band_is_refused_defensively() {
        let guard = small_guard(Arc::new(MemoryStore::new()));
        let decision = guard.evaluate(&payload_of_serialized_len(80));
        assert!(!decision.safe);
        assert!(decision.reason.contains("headroom"));
    }

    #[tokio::test]
    async fn unsafe_payload_is_never_written() {
        let store = Arc::new(MemoryStore::new());
        let guard = small_guard(store.clone());

        let outcome = guard
            .try_save(&"d-1".into(), &payload_of_serialized_len(150))
            .await;

        assert_eq!(outcome.method, SaveMethod::MemoryOnly);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn safe_payload_roundtrips() {
        let guard = small_guard(Arc::new(MemoryStore::new()));
        let dataset = DatasetId::new("d-1");

        let outcome = guard.try_save(&dataset, &"hello").await;
        assert!(outcome.persisted());
        assert_eq!(outcome.note, None);

        let loaded: Option<String> = guard.load(&dataset).await;
        assert_eq!(loaded.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn load_after_remove_is_none() {
        let guard = small_guard(Arc::new(MemoryStore::new()));
        let dataset = DatasetId::new("d-1");

        guard.try_save(&dataset, &"hello").await;
        guard.remove(&dataset).await;

        let loaded: Option<String> = guard.load(&dataset).await;
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_sessions() {
        let store = Arc::new(MemoryStore::new());
        let guard = small_guard(store.clone());

        // Entries from an earlier session and from an unrelated application
        store.set("lens:dead-session:d-1", "{}").await.unwrap();
        store.set("lens:dead-session:d-2", "{}").await.unwrap();
        store.set("other-app:key", "{}").await.unwrap();
        guard.try_save(&"d-live".into(), &"live").await;

        assert_eq!(guard.cleanup().await, 2);

        let mut keys = store.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"other-app:key".to_string()));

        // Idempotent
        assert_eq!(guard.cleanup().await, 0);
    }
}
