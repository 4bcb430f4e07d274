//! Per-dataset result cache
//!
//! Owned explicitly by whatever orchestrates the UI, never by a view
//! component, so it survives remounts. Lifecycle: created at session start,
//! cleared on dataset switch, dropped at session end.

use crate::merge::merge;
use dashmap::DashMap;
use lens_model::{AnalysisState, DatasetId};
use lens_store::StorageGuard;
use std::sync::Arc;

/// Canonical cache of analysis state, keyed by dataset
pub struct ResultRegistry {
    entries: DashMap<DatasetId, AnalysisState>,
    guard: Arc<StorageGuard>,
}

impl ResultRegistry {
    /// Create a registry persisting through the given guard
    #[inline]
    pub fn new(guard: Arc<StorageGuard>) -> Self {
        Self {
            entries: DashMap::new(),
            guard,
        }
    }

    /// Reconcile an incoming analysis with the cached entry and adopt it
    ///
    /// The merged state is persisted best-effort through the guard and
    /// returned for immediate display. A storage refusal degrades the entry
    /// to memory-only; it is never an error here.
    pub async fn absorb(&self, incoming: AnalysisState) -> AnalysisState {
        let dataset_id = incoming.dataset_id.clone();
        let existing = self.get(&dataset_id).await;
        let merged = merge(existing.as_ref(), incoming);

        self.entries.insert(dataset_id.clone(), merged.clone());

        let outcome = self.guard.try_save(&dataset_id, &merged).await;
        tracing::info!(
            dataset = %dataset_id,
            models = merged.models.len(),
            persisted = outcome.persisted(),
            "analysis state absorbed"
        );

        merged
    }

    /// Cached state for a dataset, hydrating lazily from storage
    ///
    /// A persisted snapshot found on a miss is adopted as the in-memory
    /// value before being returned, so later reads are memory hits.
    pub async fn get(&self, dataset_id: &DatasetId) -> Option<AnalysisState> {
        if let Some(entry) = self.entries.get(dataset_id) {
            return Some(entry.clone());
        }

        let snapshot: AnalysisState = self.guard.load(dataset_id).await?;
        if snapshot.dataset_id != *dataset_id {
            tracing::warn!(
                requested = %dataset_id,
                found = %snapshot.dataset_id,
                "persisted snapshot belongs to another dataset, ignoring"
            );
            return None;
        }

        tracing::debug!(dataset = %dataset_id, "hydrated analysis state from storage");
        self.entries.insert(dataset_id.clone(), snapshot.clone());
        Some(snapshot)
    }

    /// Drop both the in-memory and the persisted entry for a dataset
    pub async fn clear(&self, dataset_id: &DatasetId) {
        self.entries.remove(dataset_id);
        self.guard.remove(dataset_id).await;
        tracing::info!(dataset = %dataset_id, "analysis state cleared");
    }

    /// Whether a dataset is currently held in memory
    #[must_use]
    pub fn is_loaded(&self, dataset_id: &DatasetId) -> bool {
        self.entries.contains_key(dataset_id)
    }

    /// Number of datasets held in memory
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no dataset is held in memory
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The guard this registry persists through
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &StorageGuard {
        &self.guard
    }
}

impl std::fmt::Debug for ResultRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultRegistry")
            .field("datasets", &self.entries.len())
            .finish_non_exhaustive()
    }
}
