//! Reconciliation of analysis states
//!
//! Models are overlaid by name into an order-preserving map, then re-ranked.
//! Everything outside the model list represents "the latest full analysis"
//! and takes the incoming value verbatim.

use indexmap::IndexMap;
use lens_model::{AnalysisState, ModelResult};

/// Merge a newly arrived analysis with the cached one
///
/// Rules:
/// - no cached state, or a cached state for a different dataset: the
///   incoming state is returned unchanged (results never cross datasets)
/// - models are overlaid by `model_name`: new names are added, resubmitted
///   names replace the stale entry, nothing is duplicated
/// - the merged list is stably sorted descending by primary metric, so
///   equal scores keep their relative order
/// - insights, charts, preprocessing and passthrough fields come from
///   `incoming` wholesale
pub fn merge(existing: Option<&AnalysisState>, incoming: AnalysisState) -> AnalysisState {
    let Some(existing) = existing else {
        return incoming;
    };
    if existing.dataset_id != incoming.dataset_id {
        tracing::debug!(
            cached = %existing.dataset_id,
            incoming = %incoming.dataset_id,
            "dataset mismatch, adopting incoming state unmerged"
        );
        return incoming;
    }

    let AnalysisState {
        dataset_id,
        models: incoming_models,
        insights,
        charts,
        preprocessing,
        extra,
    } = incoming;

    let mut by_name: IndexMap<String, ModelResult> =
        IndexMap::with_capacity(existing.models.len() + incoming_models.len());
    for model in &existing.models {
        by_name.insert(model.model_name.clone(), model.clone());
    }
    for model in incoming_models {
        // Overwriting keeps the seeded position; rank is restored below
        by_name.insert(model.model_name.clone(), model);
    }

    let mut models: Vec<ModelResult> = by_name.into_values().collect();
    models.sort_by(|a, b| b.ranking_score().total_cmp(&a.ranking_score()));

    tracing::debug!(dataset = %dataset_id, models = models.len(), "merged analysis state");

    AnalysisState {
        dataset_id,
        models,
        insights,
        charts,
        preprocessing,
        extra,
    }
}
