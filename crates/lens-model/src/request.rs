//! Analysis requests
//!
//! The outbound contract to the remote analysis service: which dataset to
//! analyze and the optional variable/model selection the user made.

use crate::ids::DatasetId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Dataset to analyze
    pub dataset_id: DatasetId,
    /// Restrict the run to these input variables; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_variables: Vec<String>,
    /// Restrict the run to these model families; empty means the server default
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_models: Vec<String>,
    /// Options forwarded to the service unmodified
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl AnalysisRequest {
    /// Request a default analysis of a dataset
    #[inline]
    pub fn new(dataset_id: impl Into<DatasetId>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            selected_variables: Vec::new(),
            selected_models: Vec::new(),
            options: Map::new(),
        }
    }

    /// With a variable selection
    #[inline]
    #[must_use]
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.selected_variables = variables;
        self
    }

    /// With a model selection
    #[inline]
    #[must_use]
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.selected_models = models;
        self
    }
}
