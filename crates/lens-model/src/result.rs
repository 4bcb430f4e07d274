//! Analysis results
//!
//! The wire shape consumed from the remote analysis service and cached by
//! the registry. Fields the core does not interpret are carried in flattened
//! maps so server additions survive a cache round-trip unmodified.

use crate::ids::DatasetId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One trained model's outcome
///
/// `model_name` is the unique key within a dataset's registry; re-submission
/// of the same name overwrites the earlier entry rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResult {
    /// Unique name within the dataset (e.g. "random_forest")
    pub model_name: String,
    /// Ranking key (R², accuracy, ...); absent on the wire reads as 0
    #[serde(default)]
    pub metric_primary: f64,
    /// Root mean squared error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    /// Mean absolute error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    /// Model family tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    /// Complexity tag (e.g. "low", "high")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    /// Server fields the core passes through unmodified
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelResult {
    /// Create a result with just the ranking key
    #[inline]
    pub fn new(model_name: impl Into<String>, metric_primary: f64) -> Self {
        Self {
            model_name: model_name.into(),
            metric_primary,
            rmse: None,
            mae: None,
            model_type: None,
            complexity: None,
            extra: Map::new(),
        }
    }

    /// With secondary error metrics
    #[inline]
    #[must_use]
    pub fn with_errors(mut self, rmse: f64, mae: f64) -> Self {
        self.rmse = Some(rmse);
        self.mae = Some(mae);
        self
    }

    /// With model family and complexity tags
    #[inline]
    #[must_use]
    pub fn with_tags(mut self, model_type: impl Into<String>, complexity: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self.complexity = Some(complexity.into());
        self
    }

    /// Score used for ranking; non-finite values compare as 0
    #[inline]
    #[must_use]
    pub fn ranking_score(&self) -> f64 {
        if self.metric_primary.is_finite() {
            self.metric_primary
        } else {
            0.0
        }
    }
}

/// Cached, displayable result of one dataset's analysis
///
/// `models` is kept sorted descending by primary metric, ties keeping their
/// relative order. Everything else is "the latest full analysis" and is
/// replaced wholesale on each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    /// Dataset this analysis belongs to
    pub dataset_id: DatasetId,
    /// Ranked model results
    #[serde(default)]
    pub models: Vec<ModelResult>,
    /// Narrative insights text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
    /// Opaque chart payloads, rendered elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts: Option<Value>,
    /// Opaque preprocessing report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<Value>,
    /// Server fields the core passes through unmodified
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisState {
    /// Create an empty state for a dataset
    #[inline]
    pub fn new(dataset_id: impl Into<DatasetId>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            models: Vec::new(),
            insights: None,
            charts: None,
            preprocessing: None,
            extra: Map::new(),
        }
    }

    /// With a model list
    #[inline]
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelResult>) -> Self {
        self.models = models;
        self
    }

    /// With insights text
    #[inline]
    #[must_use]
    pub fn with_insights(mut self, insights: impl Into<String>) -> Self {
        self.insights = Some(insights.into());
        self
    }

    /// Look up a model by name
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelResult> {
        self.models.iter().find(|m| m.model_name == name)
    }

    /// Best-ranked model, if any
    #[inline]
    #[must_use]
    pub fn top_model(&self) -> Option<&ModelResult> {
        self.models.first()
    }

    /// Model names in rank order
    #[must_use]
    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.model_name.as_str()).collect()
    }
}
